//! Route guard
//!
//! Decides what a protected page should do for the current session.

use crate::session::SessionSnapshot;
use careerlink_core::{Role, RouteConfig};
use serde::Serialize;

/// Outcome of a guard check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "access", rename_all = "snake_case")]
pub enum RouteAccess {
    /// A session operation is in flight; render a placeholder
    Pending,
    Granted,
    /// Nobody is signed in
    RequiresLogin { redirect: String },
    /// Signed in, but the role may not open this page
    Forbidden { redirect: String },
}

impl RouteAccess {
    pub fn is_granted(&self) -> bool {
        matches!(self, RouteAccess::Granted)
    }

    /// Path the consumer should navigate to instead, if any
    pub fn redirect(&self) -> Option<&str> {
        match self {
            RouteAccess::RequiresLogin { redirect } | RouteAccess::Forbidden { redirect } => {
                Some(redirect)
            }
            RouteAccess::Pending | RouteAccess::Granted => None,
        }
    }
}

/// Check a snapshot against the roles a page admits
///
/// An empty `allowed_roles` admits any signed-in account. A user restored
/// from storage but not yet verified is still `Pending` while loading.
pub fn authorize(
    session: &SessionSnapshot,
    allowed_roles: &[Role],
    routes: &RouteConfig,
) -> RouteAccess {
    if session.loading {
        return RouteAccess::Pending;
    }

    let Some(user) = &session.user else {
        return RouteAccess::RequiresLogin {
            redirect: routes.login.clone(),
        };
    };

    if allowed_roles.is_empty() || allowed_roles.contains(&user.role) {
        RouteAccess::Granted
    } else {
        RouteAccess::Forbidden {
            redirect: routes.dashboard_for(user.role).to_string(),
        }
    }
}
