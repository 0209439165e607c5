//! Application context
//!
//! Holds the shared collaborators and configuration, and builds session
//! managers and synchronizers from them.

use crate::auth::IdentityResolver;
use crate::loading::LoadingContext;
use crate::realtime::{
    Booking, Message, Notification, RealtimeSynchronizer, Record, SyncDeps, SyncHooks,
    SyncOptions,
};
use crate::session::SessionManager;
use crate::{ClientError, ClientResult};
use brandconnect_core::{AuthProvider, BrandConnectConfig, ChangeFeed, QueryClient, SessionConfig};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppContext {
    auth: Arc<dyn AuthProvider>,
    query: Arc<dyn QueryClient>,
    feed: Arc<dyn ChangeFeed>,
    config: BrandConnectConfig,
    loading: LoadingContext,
}

impl AppContext {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        query: Arc<dyn QueryClient>,
        feed: Arc<dyn ChangeFeed>,
        config: BrandConnectConfig,
    ) -> ClientResult<Self> {
        config.validate()?;
        info!(app = %config.app.name, version = %config.app.version, "Application context ready");

        Ok(Self {
            auth,
            query,
            feed,
            config,
            loading: LoadingContext::new(),
        })
    }

    pub fn config(&self) -> &BrandConnectConfig {
        &self.config
    }

    pub fn loading(&self) -> &LoadingContext {
        &self.loading
    }

    pub fn auth(&self) -> Arc<dyn AuthProvider> {
        Arc::clone(&self.auth)
    }

    /// Session manager using the configured session settings
    pub fn session_manager(&self) -> ClientResult<SessionManager> {
        self.session_manager_with(self.config.session.clone())
    }

    /// Session manager with a per-screen override such as
    /// [`SessionConfig::sensitive`]
    pub fn session_manager_with(&self, config: SessionConfig) -> ClientResult<SessionManager> {
        Ok(SessionManager::new(Arc::clone(&self.auth), config)?
            .with_identity_resolver(IdentityResolver::new(Arc::clone(&self.query)))
            .with_loading(self.loading.clone()))
    }

    pub fn sync_deps(&self) -> SyncDeps {
        SyncDeps {
            query: Arc::clone(&self.query),
            feed: Arc::clone(&self.feed),
            realtime: self.config.realtime.clone(),
        }
    }

    pub async fn synchronize<T: Record>(
        &self,
        options: SyncOptions,
        hooks: SyncHooks<T>,
    ) -> ClientResult<RealtimeSynchronizer<T>> {
        RealtimeSynchronizer::start(self.sync_deps(), options, hooks).await
    }

    pub async fn bookings(
        &self,
        client_id: Option<&str>,
        hooks: SyncHooks<Booking>,
    ) -> ClientResult<RealtimeSynchronizer<Booking>> {
        self.synchronize(SyncOptions::bookings(client_id), hooks).await
    }

    /// Requires `features.chat`
    pub async fn messages(
        &self,
        conversation_id: &str,
        hooks: SyncHooks<Message>,
    ) -> ClientResult<RealtimeSynchronizer<Message>> {
        self.require_feature("chat", self.config.features.chat)?;
        self.synchronize(SyncOptions::messages(conversation_id), hooks).await
    }

    /// Requires `features.notifications`
    pub async fn notifications(
        &self,
        user_id: &str,
        hooks: SyncHooks<Notification>,
    ) -> ClientResult<RealtimeSynchronizer<Notification>> {
        self.require_feature("notifications", self.config.features.notifications)?;
        self.synchronize(SyncOptions::notifications(user_id), hooks).await
    }

    fn require_feature(&self, feature: &str, enabled: bool) -> ClientResult<()> {
        if enabled {
            Ok(())
        } else {
            Err(ClientError::FeatureDisabled {
                feature: feature.to_string(),
            })
        }
    }
}
