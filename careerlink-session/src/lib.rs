//! Careerlink Session - the client's single authority on "who is logged in"
//!
//! This crate owns the in-memory session and keeps it in step with two
//! external collaborators:
//!
//! - **Persisted credential store** ([`CredentialStore`]): token and user
//!   snapshot surviving process restarts
//! - **Remote authority** ([`careerlink_auth::RemoteAuthority`]): issues and
//!   verifies tokens
//!
//! Consumers (dashboards, route guards, forms) hold a clone of
//! [`SessionManager`], read [`SessionSnapshot`]s from it or subscribe to
//! changes, and invoke its operations. Side effects the UI cares about are
//! delivered through the [`Notifier`] and [`Navigator`] sinks.

pub mod guard;
pub mod session;
pub mod sinks;

pub use guard::{authorize, RouteAccess};
pub use session::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, SessionManager, SessionOptions,
    SessionPhase, SessionSnapshot, TOKEN_KEY, USER_KEY,
};
pub use sinks::{
    ChannelNavigator, ChannelNotifier, Navigator, NoopNavigator, Notification, Notifier, Severity,
    TracingNotifier,
};
