//! Session Manager - the single authority for "who is logged in"
//!
//! Coordinates the persisted credential store with the remote authority and
//! publishes every state transition through a watch channel. All clones of a
//! manager share the same state.
//!
//! Operations suspend only while the authority is being called and never
//! hold a lock across that await. Overlapping login/register calls are not
//! serialized: whichever settles last wins.

use super::storage::{CredentialStore, TOKEN_KEY, USER_KEY};
use super::{SessionOptions, SessionPhase, SessionSnapshot};
use crate::guard::{authorize, RouteAccess};
use crate::sinks::{Navigator, Notification, Notifier};
use careerlink_auth::RemoteAuthority;
use careerlink_core::{
    log_operation_error, log_operation_start, log_operation_success, AuthResponse,
    CareerlinkResult, RegisterRequest, Role, User, UserPatch, VerifyResponse,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Sign-in flavours sharing one completion path
#[derive(Debug, Clone, Copy)]
enum SignIn {
    Login,
    Register,
}

impl SignIn {
    fn operation(self) -> &'static str {
        match self {
            SignIn::Login => "login",
            SignIn::Register => "register",
        }
    }

    fn fallback_error(self) -> &'static str {
        match self {
            SignIn::Login => "Login failed. Please try again.",
            SignIn::Register => "Registration failed. Please try again.",
        }
    }

    fn success_notification(self, user: &User) -> Notification {
        match self {
            SignIn::Login => Notification::success(
                "Login successful",
                format!("Welcome back, {}!", user.display_name()),
            ),
            SignIn::Register => Notification::success(
                "Registration successful",
                format!("Welcome to careerlink, {}!", user.display_name()),
            ),
        }
    }

    fn failure_title(self) -> &'static str {
        match self {
            SignIn::Login => "Login failed",
            SignIn::Register => "Registration failed",
        }
    }
}

/// What the persisted store held at startup
enum Persisted {
    Complete { token: String, user: User },
    Malformed,
    Missing,
}

/// Resets `loading` when an operation settles, including when its future is dropped
struct LoadingGuard<'a> {
    state: &'a watch::Sender<SessionSnapshot>,
}

impl<'a> LoadingGuard<'a> {
    fn begin(state: &'a watch::Sender<SessionSnapshot>) -> Self {
        state.send_modify(|session| {
            session.loading = true;
            session.error = None;
        });
        Self { state }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|session| session.loading = false);
    }
}

/// Process-wide session manager
#[derive(Clone)]
pub struct SessionManager {
    /// Remote authority issuing and verifying tokens
    authority: Arc<dyn RemoteAuthority>,
    /// Persisted token and user snapshot
    store: Arc<dyn CredentialStore>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    options: SessionOptions,
    /// Current session, observable by subscribers
    state: Arc<watch::Sender<SessionSnapshot>>,
    /// Set once hydration has started
    initialized: Arc<AtomicBool>,
}

impl SessionManager {
    /// Create a new session manager in the signed-out state
    pub fn new(
        authority: Arc<dyn RemoteAuthority>,
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        options: SessionOptions,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());

        Self {
            authority,
            store,
            notifier,
            navigator,
            options,
            state: Arc::new(state),
            initialized: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current state of the session
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver observing every subsequent state transition
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Wait until no session operation is in flight
    pub async fn settled(&self) -> SessionSnapshot {
        let mut receiver = self.subscribe();
        let settled = receiver
            .wait_for(|session| !session.loading)
            .await
            .map(|session| session.clone());
        settled.unwrap_or_else(|_| self.snapshot())
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Route guard decision for the current session
    pub fn authorize(&self, allowed_roles: &[Role]) -> RouteAccess {
        authorize(&self.state.borrow(), allowed_roles, &self.options.routes)
    }

    /// Hydrate from the persisted store and confirm with the authority
    ///
    /// Runs once per manager; later calls return the current snapshot.
    pub async fn initialize(&self) -> SessionSnapshot {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("Session already initialized");
            return self.snapshot();
        }

        log_operation_start!("initialize");
        let guard = LoadingGuard::begin(&self.state);

        match self.read_persisted() {
            Persisted::Complete { token, user } => {
                // Show the stored identity right away, then confirm it
                self.state.send_modify(|session| {
                    session.user = Some(user);
                    session.phase = SessionPhase::Hydrating;
                });

                match self.authority.verify_token(&token).await {
                    Ok(VerifyResponse {
                        valid: true,
                        user: Some(fresh),
                    }) => {
                        self.persist_user(&fresh);
                        self.state.send_modify(|session| {
                            session.user = Some(fresh);
                            session.phase = SessionPhase::Authenticated;
                        });
                        log_operation_success!("initialize", verified = true);
                    }
                    Ok(VerifyResponse { valid: true, user: None }) => {
                        self.state.send_modify(|session| {
                            session.phase = SessionPhase::Authenticated;
                        });
                        log_operation_success!("initialize", verified = true);
                    }
                    Ok(VerifyResponse { valid: false, .. }) => {
                        info!("Stored token was rejected by the authority");
                        self.reset_credentials();
                    }
                    Err(e) => {
                        log_operation_error!("initialize", e);
                        self.reset_credentials();
                    }
                }
            }
            Persisted::Malformed => {
                warn!("Stored credentials are unreadable, clearing them");
                self.clear_persisted();
            }
            Persisted::Missing => {
                debug!("No stored credentials");
            }
        }

        drop(guard);
        self.snapshot()
    }

    /// Sign in with email and password
    pub async fn login(&self, email: &str, password: &str) -> SessionSnapshot {
        log_operation_start!("login", email = %email);
        let guard = LoadingGuard::begin(&self.state);

        let result = self.authority.login(email, password).await;
        self.complete_sign_in(SignIn::Login, result);

        drop(guard);
        self.snapshot()
    }

    /// Create an account and sign it in
    pub async fn register(&self, request: RegisterRequest) -> SessionSnapshot {
        log_operation_start!("register", email = %request.email, role = %request.role);
        let guard = LoadingGuard::begin(&self.state);

        let result = self.authority.register(&request).await;
        self.complete_sign_in(SignIn::Register, result);

        drop(guard);
        self.snapshot()
    }

    /// Sign out locally; the authority is not told
    pub fn logout(&self) {
        self.state.send_replace(SessionSnapshot::default());
        self.clear_persisted();

        self.notifier.notify(Notification::info(
            "Logged out",
            "You have been successfully logged out.",
        ));
        self.navigator.navigate(&self.options.routes.public_home);
        log_operation_success!("logout");
    }

    /// Merge local profile changes into the current user and persist them
    ///
    /// Returns the merged user, or `None` when nobody is signed in.
    pub fn update_user(&self, patch: UserPatch) -> Option<User> {
        let mut merged = None;
        self.state.send_if_modified(|session| match session.user.as_mut() {
            Some(user) => {
                user.apply(patch);
                merged = Some(user.clone());
                true
            }
            None => false,
        });

        match &merged {
            Some(user) => self.persist_user(user),
            None => debug!("update_user ignored: no user signed in"),
        }
        merged
    }

    pub fn clear_error(&self) {
        self.state
            .send_if_modified(|session| session.error.take().is_some());
    }

    fn complete_sign_in(&self, kind: SignIn, result: CareerlinkResult<AuthResponse>) {
        let outcome = match result {
            Ok(response) => {
                let server_message = response.message.clone();
                response
                    .into_credentials()
                    .ok_or_else(|| server_message.unwrap_or_else(|| kind.fallback_error().to_string()))
            }
            Err(e) => {
                log_operation_error!(kind.operation(), e);
                Err(e
                    .server_message()
                    .unwrap_or(kind.fallback_error())
                    .to_string())
            }
        };

        match outcome {
            Ok((token, user)) => {
                self.persist_token(&token);
                self.persist_user(&user);

                let notification = kind.success_notification(&user);
                let home = self.options.routes.home_for(user.role).map(str::to_string);
                log_operation_success!(kind.operation(), user_id = %user.id, role = %user.role);

                self.state.send_modify(|session| {
                    session.user = Some(user);
                    session.phase = SessionPhase::Authenticated;
                    session.error = None;
                });

                self.notifier.notify(notification);
                if let Some(path) = home {
                    self.schedule_navigation(path);
                }
            }
            Err(message) => {
                self.state.send_modify(|session| {
                    session.error = Some(message.clone());
                });
                self.notifier
                    .notify(Notification::error(kind.failure_title(), message));
            }
        }
    }

    /// Navigate after the configured delay so subscribers see the new identity first
    fn schedule_navigation(&self, path: String) {
        let navigator = self.navigator.clone();
        let delay = self.options.navigation_delay;

        if delay.is_zero() {
            navigator.navigate(&path);
            return;
        }

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            navigator.navigate(&path);
        });
    }

    fn read_persisted(&self) -> Persisted {
        let (token, raw_user) = match (self.store.get(TOKEN_KEY), self.store.get(USER_KEY)) {
            (Ok(token), Ok(raw_user)) => (
                token.filter(|v| !v.is_empty()),
                raw_user.filter(|v| !v.is_empty()),
            ),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to read credential store: {}", e);
                return Persisted::Malformed;
            }
        };

        let (Some(token), Some(raw_user)) = (token, raw_user) else {
            return Persisted::Missing;
        };

        match serde_json::from_str::<User>(&raw_user) {
            Ok(user) => Persisted::Complete { token, user },
            Err(e) => {
                debug!("Stored user record failed to parse: {}", e);
                Persisted::Malformed
            }
        }
    }

    fn persist_token(&self, token: &str) {
        if let Err(e) = self.store.set(TOKEN_KEY, token) {
            warn!("Failed to persist token: {}", e);
        }
    }

    fn persist_user(&self, user: &User) {
        let result = serde_json::to_string(user)
            .map_err(Into::into)
            .and_then(|raw| self.store.set(USER_KEY, &raw));
        if let Err(e) = result {
            warn!("Failed to persist user record: {}", e);
        }
    }

    fn clear_persisted(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.store.remove(key) {
                warn!("Failed to remove '{}' from credential store: {}", key, e);
            }
        }
    }

    /// Drop both the persisted credentials and the in-memory user
    fn reset_credentials(&self) {
        self.clear_persisted();
        self.state.send_modify(|session| {
            session.user = None;
            session.phase = SessionPhase::Unauthenticated;
        });
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("options", &self.options)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
