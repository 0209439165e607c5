//! Brand Connect Core - shared types, collaborator traits, errors and configuration
//!
//! Everything the client layer needs from the hosted backend is expressed here
//! as a trait, so the session and synchronization logic can run against any
//! provider (or an in-memory fake in tests).

pub mod config;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use error::*;
pub use logging::*;
pub use traits::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tokio;
pub use tracing;
