//! Session Types and Structures

use careerlink_core::{CareerlinkConfig, Role, RouteConfig, User};
use serde::Serialize;
use std::time::Duration;

/// Where the session is in its lifecycle
///
/// `Hydrating` marks a user restored from local storage that the authority
/// has not confirmed yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    #[default]
    Unauthenticated,
    Hydrating,
    Authenticated,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Unauthenticated => write!(f, "unauthenticated"),
            SessionPhase::Hydrating => write!(f, "hydrating"),
            SessionPhase::Authenticated => write!(f, "authenticated"),
        }
    }
}

/// Point-in-time view of the session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    /// Current identity, absent when signed out
    pub user: Option<User>,
    /// True while initialization, login or register is in flight
    pub loading: bool,
    /// Message from the most recent failed operation
    pub error: Option<String>,
    pub phase: SessionPhase,
}

impl SessionSnapshot {
    /// Identity confirmed by the authority or a fresh sign-in
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.phase == SessionPhase::Authenticated
    }

    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|user| user.role)
    }

    pub fn display_name(&self) -> Option<String> {
        self.user.as_ref().map(User::display_name)
    }
}

/// Session manager tuning
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Pause between a successful sign-in and the navigation intent, so
    /// subscribers observe the new identity first
    pub navigation_delay: Duration,
    pub routes: RouteConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            navigation_delay: Duration::from_millis(100),
            routes: RouteConfig::default(),
        }
    }
}

impl From<&CareerlinkConfig> for SessionOptions {
    fn from(config: &CareerlinkConfig) -> Self {
        Self {
            navigation_delay: Duration::from_millis(config.session.navigation_delay_ms),
            routes: config.routes.clone(),
        }
    }
}

impl SessionOptions {
    pub fn with_navigation_delay(mut self, delay: Duration) -> Self {
        self.navigation_delay = delay;
        self
    }
}
