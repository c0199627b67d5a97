//! Session manager behaviour against a scripted authority

use async_trait::async_trait;
use careerlink_auth::RemoteAuthority;
use careerlink_core::{
    AuthResponse, CareerlinkError, CareerlinkResult, ErrorContext, Preferences, RegisterRequest,
    Role, User, UserPatch, VerifyResponse,
};
use careerlink_session::{
    ChannelNavigator, ChannelNotifier, CredentialStore, FileCredentialStore,
    MemoryCredentialStore, Notification, RouteAccess, SessionManager, SessionOptions,
    SessionPhase, Severity, TOKEN_KEY, USER_KEY,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

/// Scripted reply of the fake authority
#[derive(Clone)]
enum Reply {
    Credentials(&'static str, User),
    /// 200 without a token
    Incomplete,
    Rejected(Option<&'static str>),
    Unreachable,
}

impl Reply {
    fn into_result(self) -> CareerlinkResult<AuthResponse> {
        match self {
            Reply::Credentials(token, user) => Ok(AuthResponse {
                user: Some(user),
                token: Some(token.to_string()),
                message: None,
            }),
            Reply::Incomplete => Ok(AuthResponse::default()),
            Reply::Rejected(message) => Err(rejected(message)),
            Reply::Unreachable => Err(unreachable_error()),
        }
    }
}

#[derive(Clone)]
enum VerifyReply {
    Valid(Option<User>),
    Invalid,
    Unreachable,
}

fn rejected(message: Option<&str>) -> CareerlinkError {
    CareerlinkError::Authentication {
        message: "HTTP 401".to_string(),
        server_message: message.map(str::to_string),
        status: Some(401),
        context: ErrorContext::new("fake_authority"),
    }
}

fn unreachable_error() -> CareerlinkError {
    CareerlinkError::Network {
        message: "connection refused".to_string(),
        source: None,
        context: ErrorContext::new("fake_authority"),
    }
}

struct FakeAuthority {
    login: Reply,
    register: Reply,
    verify: VerifyReply,
    calls: AtomicUsize,
    /// When set, each call waits for a permit before replying
    gate: Option<Arc<Semaphore>>,
}

impl FakeAuthority {
    fn new() -> Self {
        Self {
            login: Reply::Rejected(None),
            register: Reply::Rejected(None),
            verify: VerifyReply::Invalid,
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    fn with_login(mut self, reply: Reply) -> Self {
        self.login = reply;
        self
    }

    fn with_register(mut self, reply: Reply) -> Self {
        self.register = reply;
        self
    }

    fn with_verify(mut self, reply: VerifyReply) -> Self {
        self.verify = reply;
        self
    }

    fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    async fn pass_gate(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
    }
}

#[async_trait]
impl RemoteAuthority for FakeAuthority {
    async fn login(&self, _email: &str, _password: &str) -> CareerlinkResult<AuthResponse> {
        self.pass_gate().await;
        self.login.clone().into_result()
    }

    async fn register(&self, _request: &RegisterRequest) -> CareerlinkResult<AuthResponse> {
        self.pass_gate().await;
        self.register.clone().into_result()
    }

    async fn verify_token(&self, _token: &str) -> CareerlinkResult<VerifyResponse> {
        self.pass_gate().await;
        match self.verify.clone() {
            VerifyReply::Valid(user) => Ok(VerifyResponse { valid: true, user }),
            VerifyReply::Invalid => Ok(VerifyResponse {
                valid: false,
                user: None,
            }),
            VerifyReply::Unreachable => Err(unreachable_error()),
        }
    }
}

fn user(value: serde_json::Value) -> User {
    serde_json::from_value(value).unwrap()
}

fn student() -> User {
    user(json!({"id": "1", "email": "a@b.com", "firstName": "A", "role": "student"}))
}

fn recruiter() -> User {
    user(json!({"id": "2", "email": "r@b.com", "firstName": "R", "role": "recruiter"}))
}

struct Harness {
    manager: SessionManager,
    store: Arc<MemoryCredentialStore>,
    authority: Arc<FakeAuthority>,
    notifications: mpsc::UnboundedReceiver<Notification>,
    paths: mpsc::UnboundedReceiver<String>,
}

fn harness(authority: FakeAuthority, store: MemoryCredentialStore) -> Harness {
    let authority = Arc::new(authority);
    let store = Arc::new(store);
    let (notifier, notifications) = ChannelNotifier::new();
    let (navigator, paths) = ChannelNavigator::new();

    let manager = SessionManager::new(
        authority.clone(),
        store.clone(),
        Arc::new(notifier),
        Arc::new(navigator),
        SessionOptions::default().with_navigation_delay(Duration::from_millis(10)),
    );

    Harness {
        manager,
        store,
        authority,
        notifications,
        paths,
    }
}

fn persisted(token: &str, user: &User) -> MemoryCredentialStore {
    MemoryCredentialStore::with_entries([
        (TOKEN_KEY, token.to_string()),
        (USER_KEY, serde_json::to_string(user).unwrap()),
    ])
}

#[tokio::test]
async fn test_initial_state() {
    let h = harness(FakeAuthority::new(), MemoryCredentialStore::new());
    let session = h.manager.snapshot();

    assert!(session.user.is_none());
    assert!(!session.loading);
    assert!(session.error.is_none());
    assert_eq!(session.phase, SessionPhase::Unauthenticated);
}

#[tokio::test]
async fn test_initialize_without_credentials() {
    let h = harness(FakeAuthority::new(), MemoryCredentialStore::new());
    let session = h.manager.initialize().await;

    assert!(session.user.is_none());
    assert!(!session.loading);
    assert_eq!(h.authority.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_initialize_with_only_a_token_leaves_store_alone() {
    let store = MemoryCredentialStore::with_entries([(TOKEN_KEY, "abc")]);
    let h = harness(FakeAuthority::new(), store);
    let session = h.manager.initialize().await;

    assert!(session.user.is_none());
    assert_eq!(h.store.get(TOKEN_KEY).unwrap(), Some("abc".to_string()));
    assert_eq!(h.authority.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_initialize_prefers_verified_user() {
    let stale = user(json!({"id": "1", "role": "student"}));
    let fresh = user(json!({"id": "1", "role": "student", "firstName": "A"}));
    let authority = FakeAuthority::new().with_verify(VerifyReply::Valid(Some(fresh.clone())));
    let h = harness(authority, persisted("abc", &stale));

    let session = h.manager.initialize().await;

    assert_eq!(session.user.as_ref().unwrap().first_name, "A");
    assert_eq!(session.phase, SessionPhase::Authenticated);
    assert!(session.is_authenticated());
    assert!(!session.loading);

    let stored: User = serde_json::from_str(&h.store.get(USER_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(stored, fresh);
}

#[tokio::test]
async fn test_initialize_valid_without_user_keeps_persisted_copy() {
    let h = harness(
        FakeAuthority::new().with_verify(VerifyReply::Valid(None)),
        persisted("abc", &student()),
    );

    let session = h.manager.initialize().await;
    assert_eq!(session.user, Some(student()));
    assert_eq!(session.phase, SessionPhase::Authenticated);
}

#[tokio::test]
async fn test_initialize_invalid_token_clears_everything() {
    let h = harness(
        FakeAuthority::new().with_verify(VerifyReply::Invalid),
        persisted("abc", &student()),
    );

    let session = h.manager.initialize().await;

    assert!(session.user.is_none());
    assert!(!session.loading);
    assert_eq!(session.phase, SessionPhase::Unauthenticated);
    assert_eq!(h.store.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(h.store.get(USER_KEY).unwrap(), None);
}

#[tokio::test]
async fn test_initialize_verify_failure_clears_everything() {
    let h = harness(
        FakeAuthority::new().with_verify(VerifyReply::Unreachable),
        persisted("abc", &student()),
    );

    let session = h.manager.initialize().await;

    assert!(session.user.is_none());
    assert!(!session.loading);
    assert_eq!(h.store.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(h.store.get(USER_KEY).unwrap(), None);
}

#[tokio::test]
async fn test_initialize_malformed_user_is_treated_as_absent() {
    let store = MemoryCredentialStore::with_entries([(TOKEN_KEY, "abc"), (USER_KEY, "{oops")]);
    let h = harness(FakeAuthority::new(), store);

    let session = h.manager.initialize().await;

    assert!(session.user.is_none());
    assert_eq!(h.store.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(h.store.get(USER_KEY).unwrap(), None);
    assert_eq!(h.authority.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_initialize_clears_unreadable_credential_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.json");
    std::fs::write(&path, r#"{"token":"abc","user":"#).unwrap();

    let store = Arc::new(FileCredentialStore::new(&path));
    let authority = Arc::new(FakeAuthority::new());
    let (notifier, _notifications) = ChannelNotifier::new();
    let (navigator, _paths) = ChannelNavigator::new();
    let manager = SessionManager::new(
        authority.clone(),
        store.clone(),
        Arc::new(notifier),
        Arc::new(navigator),
        SessionOptions::default(),
    );

    let session = manager.initialize().await;

    assert!(session.user.is_none());
    assert!(!session.loading);
    assert!(session.error.is_none());
    assert_eq!(authority.calls.load(Ordering::SeqCst), 0);

    assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(store.get(USER_KEY).unwrap(), None);
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&contents).is_ok());
}

#[tokio::test]
async fn test_initialize_shows_persisted_user_while_verifying() {
    let gate = Arc::new(Semaphore::new(0));
    let authority = FakeAuthority::new()
        .with_verify(VerifyReply::Valid(Some(student())))
        .gated(gate.clone());
    let h = harness(authority, persisted("abc", &student()));

    let manager = h.manager.clone();
    let task = tokio::spawn(async move { manager.initialize().await });

    let mut receiver = h.manager.subscribe();
    let hydrating = receiver
        .wait_for(|s| s.phase == SessionPhase::Hydrating)
        .await
        .unwrap()
        .clone();
    assert!(hydrating.loading);
    assert_eq!(hydrating.user, Some(student()));
    assert!(!hydrating.is_authenticated());
    assert_eq!(
        h.manager.authorize(&[Role::Student]),
        RouteAccess::Pending
    );

    gate.add_permits(1);
    let session = task.await.unwrap();
    assert!(!session.loading);
    assert!(session.is_authenticated());
    assert!(h.manager.authorize(&[Role::Student]).is_granted());
}

#[tokio::test]
async fn test_initialize_runs_once() {
    let h = harness(
        FakeAuthority::new().with_verify(VerifyReply::Valid(Some(student()))),
        persisted("abc", &student()),
    );

    h.manager.initialize().await;
    h.manager.logout();
    let session = h.manager.clone().initialize().await;

    assert!(session.user.is_none());
    assert_eq!(h.authority.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_login_success() {
    let mut h = harness(
        FakeAuthority::new().with_login(Reply::Credentials("abc", student())),
        MemoryCredentialStore::new(),
    );

    let session = h.manager.login("a@b.com", "secret").await;

    assert_eq!(session.user, Some(student()));
    assert!(session.error.is_none());
    assert!(!session.loading);
    assert_eq!(session.phase, SessionPhase::Authenticated);

    assert_eq!(h.store.get(TOKEN_KEY).unwrap(), Some("abc".to_string()));
    let stored: User = serde_json::from_str(&h.store.get(USER_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(stored, student());

    let notification = h.notifications.recv().await.unwrap();
    assert_eq!(notification.severity, Severity::Success);
    assert_eq!(notification.description, "Welcome back, A!");

    let path = tokio::time::timeout(Duration::from_secs(1), h.paths.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(path, "/student/dashboard");
}

#[tokio::test]
async fn test_login_rejected_with_server_message() {
    let mut h = harness(
        FakeAuthority::new().with_login(Reply::Rejected(Some("Invalid credentials"))),
        MemoryCredentialStore::new(),
    );

    let session = h.manager.login("a@b.com", "wrong").await;

    assert_eq!(session.error.as_deref(), Some("Invalid credentials"));
    assert!(session.user.is_none());
    assert!(!session.loading);
    assert_eq!(h.store.get(TOKEN_KEY).unwrap(), None);

    let notification = h.notifications.recv().await.unwrap();
    assert_eq!(notification.severity, Severity::Error);
    assert_eq!(notification.title, "Login failed");
    assert_eq!(notification.description, "Invalid credentials");
    assert!(h.paths.try_recv().is_err());
}

#[tokio::test]
async fn test_login_failures_fall_back_to_generic_message() {
    for reply in [Reply::Rejected(None), Reply::Unreachable, Reply::Incomplete] {
        let h = harness(
            FakeAuthority::new().with_login(reply),
            MemoryCredentialStore::new(),
        );
        let session = h.manager.login("a@b.com", "pw").await;

        assert_eq!(
            session.error.as_deref(),
            Some("Login failed. Please try again.")
        );
        assert!(session.user.is_none());
        assert!(!session.loading);
    }
}

#[tokio::test]
async fn test_failed_login_keeps_existing_user() {
    let h = harness(
        FakeAuthority::new()
            .with_verify(VerifyReply::Valid(Some(student())))
            .with_login(Reply::Rejected(Some("Invalid credentials"))),
        persisted("abc", &student()),
    );
    h.manager.initialize().await;

    let session = h.manager.login("a@b.com", "wrong").await;

    assert_eq!(session.user, Some(student()));
    assert_eq!(session.error.as_deref(), Some("Invalid credentials"));
    assert_eq!(h.store.get(TOKEN_KEY).unwrap(), Some("abc".to_string()));
}

#[tokio::test]
async fn test_loading_only_while_in_flight() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(
        FakeAuthority::new()
            .with_login(Reply::Credentials("abc", student()))
            .gated(gate.clone()),
        MemoryCredentialStore::new(),
    );
    assert!(!h.manager.snapshot().loading);

    let manager = h.manager.clone();
    let task = tokio::spawn(async move { manager.login("a@b.com", "secret").await });

    let mut receiver = h.manager.subscribe();
    receiver.wait_for(|s| s.loading).await.unwrap();
    assert!(h.manager.snapshot().user.is_none());

    gate.add_permits(1);
    let session = task.await.unwrap();
    assert!(!session.loading);
    assert!(!h.manager.settled().await.loading);
}

#[tokio::test]
async fn test_settled_waits_for_in_flight_login() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(
        FakeAuthority::new()
            .with_login(Reply::Credentials("abc", student()))
            .gated(gate.clone()),
        MemoryCredentialStore::new(),
    );

    let manager = h.manager.clone();
    let task = tokio::spawn(async move { manager.login("a@b.com", "secret").await });
    h.manager.subscribe().wait_for(|s| s.loading).await.unwrap();

    let waiter = h.manager.clone();
    let settled = tokio::spawn(async move { waiter.settled().await });
    tokio::task::yield_now().await;
    assert!(!settled.is_finished());

    gate.add_permits(1);
    let session = settled.await.unwrap();
    assert!(!session.loading);
    assert_eq!(session.user, Some(student()));
    task.await.unwrap();
}

#[tokio::test]
async fn test_dropped_login_resets_loading() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(
        FakeAuthority::new()
            .with_login(Reply::Credentials("abc", student()))
            .gated(gate),
        MemoryCredentialStore::new(),
    );

    let abandoned =
        tokio::time::timeout(Duration::from_millis(20), h.manager.login("a@b.com", "pw")).await;
    assert!(abandoned.is_err());

    let session = h.manager.snapshot();
    assert!(!session.loading);
    assert!(session.user.is_none());
}

#[tokio::test]
async fn test_error_cleared_on_new_attempt_and_on_success() {
    let gate = Arc::new(Semaphore::new(1));
    let h = harness(
        FakeAuthority::new()
            .with_login(Reply::Rejected(Some("Invalid credentials")))
            .with_register(Reply::Credentials("new", recruiter()))
            .gated(gate.clone()),
        MemoryCredentialStore::new(),
    );

    let failed = h.manager.login("a@b.com", "wrong").await;
    assert!(failed.error.is_some());

    let manager = h.manager.clone();
    let request = RegisterRequest {
        email: "r@b.com".to_string(),
        password: "pw".to_string(),
        first_name: "R".to_string(),
        last_name: String::new(),
        role: Role::Recruiter,
    };
    let task = tokio::spawn(async move { manager.register(request).await });

    let mut receiver = h.manager.subscribe();
    let in_flight = receiver.wait_for(|s| s.loading).await.unwrap().clone();
    assert!(in_flight.error.is_none());

    gate.add_permits(1);
    let session = task.await.unwrap();
    assert!(session.error.is_none());
    assert_eq!(session.role(), Some(Role::Recruiter));
}

#[tokio::test]
async fn test_clear_error() {
    let h = harness(
        FakeAuthority::new().with_login(Reply::Rejected(Some("Invalid credentials"))),
        MemoryCredentialStore::new(),
    );
    h.manager.login("a@b.com", "wrong").await;
    assert!(h.manager.snapshot().error.is_some());

    h.manager.clear_error();
    let session = h.manager.snapshot();
    assert!(session.error.is_none());
    assert!(session.user.is_none());
    assert!(!session.loading);
}

#[tokio::test]
async fn test_register_success_navigates_to_recruiter_home() {
    let mut h = harness(
        FakeAuthority::new().with_register(Reply::Credentials("new", recruiter())),
        MemoryCredentialStore::new(),
    );

    let session = h
        .manager
        .register(RegisterRequest {
            email: "r@b.com".to_string(),
            password: "pw".to_string(),
            first_name: "R".to_string(),
            last_name: String::new(),
            role: Role::Recruiter,
        })
        .await;

    assert_eq!(session.user, Some(recruiter()));
    assert_eq!(h.store.get(TOKEN_KEY).unwrap(), Some("new".to_string()));
    assert_eq!(
        h.notifications.recv().await.unwrap().title,
        "Registration successful"
    );
    assert_eq!(h.paths.recv().await.unwrap(), "/recruiter/dashboard");
}

#[tokio::test]
async fn test_register_failure() {
    let mut h = harness(
        FakeAuthority::new().with_register(Reply::Rejected(Some("Email already registered"))),
        MemoryCredentialStore::new(),
    );

    let session = h
        .manager
        .register(RegisterRequest {
            email: "taken@b.com".to_string(),
            password: "pw".to_string(),
            first_name: "T".to_string(),
            last_name: String::new(),
            role: Role::Student,
        })
        .await;

    assert_eq!(session.error.as_deref(), Some("Email already registered"));
    assert!(session.user.is_none());
    assert_eq!(
        h.notifications.recv().await.unwrap().title,
        "Registration failed"
    );
}

#[tokio::test]
async fn test_admin_login_has_no_landing_page() {
    let admin = user(json!({"id": "9", "role": "admin"}));
    let mut h = harness(
        FakeAuthority::new().with_login(Reply::Credentials("abc", admin)),
        MemoryCredentialStore::new(),
    );

    h.manager.login("admin@b.com", "pw").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.paths.try_recv().is_err());
}

#[tokio::test]
async fn test_login_then_logout() {
    let mut h = harness(
        FakeAuthority::new().with_login(Reply::Credentials("abc", student())),
        MemoryCredentialStore::new(),
    );

    h.manager.login("a@b.com", "secret").await;
    assert_eq!(h.paths.recv().await.unwrap(), "/student/dashboard");
    h.notifications.recv().await.unwrap();

    h.manager.logout();
    let session = h.manager.snapshot();

    assert!(session.user.is_none());
    assert!(!session.loading);
    assert_eq!(session.phase, SessionPhase::Unauthenticated);
    assert_eq!(h.store.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(h.store.get(USER_KEY).unwrap(), None);
    assert_eq!(h.paths.recv().await.unwrap(), "/");
    assert_eq!(h.notifications.recv().await.unwrap().title, "Logged out");
    assert_eq!(
        h.manager.authorize(&[]).redirect(),
        Some("/login")
    );
    // logout never reaches the authority
    assert_eq!(h.authority.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_update_user_merges_and_persists() {
    let h = harness(
        FakeAuthority::new().with_login(Reply::Credentials("abc", student())),
        MemoryCredentialStore::new(),
    );
    h.manager.login("a@b.com", "secret").await;

    let merged = h
        .manager
        .update_user(UserPatch::default().with_field("bio", "hi"))
        .unwrap();
    assert_eq!(merged.extra.get("bio"), Some(&json!("hi")));
    assert_eq!(merged.first_name, "A");

    let session = h.manager.snapshot();
    assert_eq!(session.user.as_ref().unwrap().extra.get("bio"), Some(&json!("hi")));

    let stored: serde_json::Value =
        serde_json::from_str(&h.store.get(USER_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(stored["bio"], "hi");
    assert_eq!(stored["id"], "1");

    let mut preferences = Preferences::default();
    preferences.set("applicationUpdates", true).unwrap();
    let merged = h
        .manager
        .update_user(UserPatch {
            preferences: Some(preferences.clone()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(merged.preferences, Some(preferences));
    assert_eq!(merged.extra.get("bio"), Some(&json!("hi")));
}

#[tokio::test]
async fn test_update_user_without_session_is_a_noop() {
    let h = harness(FakeAuthority::new(), MemoryCredentialStore::new());
    let mut receiver = h.manager.subscribe();

    assert!(h
        .manager
        .update_user(UserPatch::default().with_field("bio", "hi"))
        .is_none());
    assert!(h.manager.snapshot().user.is_none());
    assert_eq!(h.store.get(USER_KEY).unwrap(), None);
    assert!(!receiver.has_changed().unwrap());
}

#[tokio::test]
async fn test_subscribers_see_identity_changes() {
    let h = harness(
        FakeAuthority::new().with_login(Reply::Credentials("abc", student())),
        MemoryCredentialStore::new(),
    );
    let mut receiver = h.manager.subscribe();

    h.manager.login("a@b.com", "secret").await;
    assert!(receiver.has_changed().unwrap());
    assert_eq!(
        receiver.borrow_and_update().display_name().as_deref(),
        Some("A")
    );

    h.manager.logout();
    receiver.changed().await.unwrap();
    assert!(receiver.borrow().user.is_none());
}
