//! Careerlink Core - Shared data structures and ambient infrastructure
//!
//! Error model, configuration, logging and the identity types exchanged with
//! the remote authority

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use tracing;
