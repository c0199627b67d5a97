//! Session Management Module
//!
//! The session manager, its observable state, and the persisted credential
//! store it hydrates from.

pub mod manager;
pub mod storage;
pub mod types;

pub use manager::SessionManager;
pub use storage::{CredentialStore, FileCredentialStore, MemoryCredentialStore, TOKEN_KEY, USER_KEY};
pub use types::*;
