//! Session Lifecycle Module
//!
//! Tracks authentication-session validity on the client: warns before expiry,
//! extends on activity, and forces sign-out on timeout.

pub mod activity;
pub mod manager;
pub mod types;

pub use activity::ActivityThrottle;
pub use manager::SessionManager;
pub use types::*;
