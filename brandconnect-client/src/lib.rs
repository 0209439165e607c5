//! Brand Connect Client
//!
//! Client-side session lifecycle and live table mirrors built on the
//! collaborator traits from `brandconnect-core`:
//!
//! - [`session::SessionManager`] keeps an authentication session alive while
//!   the user is active, warns before expiry and signs out on timeout.
//! - [`realtime::RealtimeSynchronizer`] mirrors a backend table and patches
//!   the mirror from the change feed.
//! - [`context::AppContext`] wires collaborators and configuration together.

pub mod auth;
pub mod context;
pub mod loading;
pub mod realtime;
pub mod session;

pub use auth::{IdentityResolver, UserIdentity, UserRole};
pub use context::AppContext;
pub use loading::{LoadingContext, LoadingGuard, LoadingState};
pub use realtime::{
    ConnectionStatus, RealtimeSynchronizer, Record, SyncHooks, SyncOptions, SyncSnapshot,
    SyncedCollection,
};
pub use session::{SessionEvent, SessionManager, SessionPhase, SessionSnapshot, SessionState};

/// Client error types
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Core error: {0}")]
    Core(#[from] brandconnect_core::BrandConnectError),

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Feature disabled: {feature}")]
    FeatureDisabled { feature: String },
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Whether the caller may keep the current state and retry later
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::Core(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use super::{
        AppContext, ClientError, ClientResult, ConnectionStatus, LoadingContext,
        RealtimeSynchronizer, Record, SessionEvent, SessionManager, SessionPhase, SyncOptions,
        UserIdentity, UserRole,
    };
    pub use brandconnect_core::{BrandConnectConfig, SessionConfig};
}
