//! Core data type definitions

use crate::error::CareerlinkResult;
use crate::validation_error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Account role - a closed set decided by the server at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Recruiter,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Recruiter => write!(f, "recruiter"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "recruiter" => Ok(Role::Recruiter),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Notification preferences attached to a user record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub email_notifications: bool,
    pub push_notifications: bool,
    pub application_updates: bool,
    pub new_opportunities: bool,
    pub mentorship_requests: bool,
    pub marketing_emails: bool,
}

impl Preferences {
    /// Wire names of every notification category
    pub const CATEGORIES: [&'static str; 6] = [
        "emailNotifications",
        "pushNotifications",
        "applicationUpdates",
        "newOpportunities",
        "mentorshipRequests",
        "marketingEmails",
    ];

    fn flag_mut(&mut self, category: &str) -> Option<&mut bool> {
        match category {
            "emailNotifications" => Some(&mut self.email_notifications),
            "pushNotifications" => Some(&mut self.push_notifications),
            "applicationUpdates" => Some(&mut self.application_updates),
            "newOpportunities" => Some(&mut self.new_opportunities),
            "mentorshipRequests" => Some(&mut self.mentorship_requests),
            "marketingEmails" => Some(&mut self.marketing_emails),
            _ => None,
        }
    }

    /// Turn a category on or off by its wire name
    pub fn set(&mut self, category: &str, enabled: bool) -> CareerlinkResult<()> {
        match self.flag_mut(category) {
            Some(flag) => {
                *flag = enabled;
                Ok(())
            }
            None => Err(validation_error!(
                format!(
                    "Unknown notification category '{}'. Expected one of: {}",
                    category,
                    Self::CATEGORIES.join(", ")
                ),
                "preferences",
                "preferences"
            )),
        }
    }

    /// Names of the categories currently enabled
    pub fn enabled_categories(&self) -> Vec<&'static str> {
        let flags = [
            self.email_notifications,
            self.push_notifications,
            self.application_updates,
            self.new_opportunities,
            self.mentorship_requests,
            self.marketing_emails,
        ];

        Self::CATEGORIES
            .iter()
            .zip(flags)
            .filter(|(_, enabled)| *enabled)
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Identity record of the signed-in account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
    /// Profile fields this client does not model (bio, avatar, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// Wire names of the modeled fields; `extra` never shadows them
    pub const FIELDS: [&'static str; 6] =
        ["id", "email", "firstName", "lastName", "role", "preferences"];

    /// "First Last", falling back to the email when no name is on record
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }

    /// Merge a partial record into this one
    pub fn apply(&mut self, patch: UserPatch) {
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(first_name) = patch.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = patch.last_name {
            self.last_name = last_name;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(preferences) = patch.preferences {
            self.preferences = Some(preferences);
        }
        self.extra.extend(
            patch
                .extra
                .into_iter()
                .filter(|(key, _)| !Self::FIELDS.contains(&key.as_str())),
        );
    }
}

/// Partial user record; absent fields leave the current value untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserPatch {
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

/// Body of the login call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of the register call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

/// Response of login and register
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AuthResponse {
    /// Token and user, when the server returned both
    pub fn into_credentials(self) -> Option<(String, User)> {
        match (self.token, self.user) {
            (Some(token), Some(user)) if !token.is_empty() => Some((token, user)),
            _ => None,
        }
    }
}

/// Response of the token verification call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub user: Option<User>,
}
