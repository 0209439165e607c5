//! Collaborator traits for the hosted backend
//!
//! The client never talks to the backend directly; authentication, table
//! reads and the change feed are reached through these seams.

use crate::error::BrandConnectResult;
use crate::types::*;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Hosted authentication provider
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Return the session persisted by the provider, if any
    async fn get_current_session(&self) -> BrandConnectResult<Option<AuthSession>>;

    /// Extend validity. An error here must never be treated as a sign-out.
    async fn refresh_session(&self) -> BrandConnectResult<AuthSession>;

    /// Invalidate the current session
    async fn sign_out(&self) -> BrandConnectResult<()>;

    /// Subscribe to auth state changes; dropping the receiver unsubscribes
    fn subscribe_auth_events(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Row-level read access
#[async_trait]
pub trait QueryClient: Send + Sync {
    async fn query(&self, query: &TableQuery) -> BrandConnectResult<Vec<serde_json::Value>>;
}

/// One live change-feed channel
#[async_trait]
pub trait FeedChannel: Send {
    /// Next status change or row event; `None` once the channel is closed
    async fn next(&mut self) -> Option<FeedMessage>;

    /// Release the channel on the provider side
    async fn unsubscribe(&mut self);
}

/// Push-based change feed
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, spec: ChannelSpec) -> BrandConnectResult<Box<dyn FeedChannel>>;
}
