//! Session Manager - client-side session lifecycle
//!
//! Owns the warning and expiry timers for one authentication session, extends
//! the session on late activity, and guarantees sign-out on timeout.
//!
//! Every reschedule or deactivation bumps a generation counter. Timer tasks
//! and in-flight refreshes carry the generation they were started under and
//! are discarded when it no longer matches.

use super::activity::ActivityThrottle;
use super::types::{
    format_remaining, ActivityOutcome, SessionEvent, SessionPhase, SessionSnapshot, SessionState,
};
use crate::auth::{IdentityResolver, UserIdentity};
use crate::loading::LoadingContext;
use crate::{ClientError, ClientResult};
use brandconnect_core::{
    config_error, ActivityKind, AuthEvent, AuthProvider, AuthSession, SessionConfig,
};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

const EVENT_BUFFER: usize = 64;

struct Runtime {
    phase: SessionPhase,
    state: SessionState,
    identity: Option<UserIdentity>,
    deadline: Option<Instant>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
    throttle: ActivityThrottle,
    extension_in_flight: bool,
}

impl Runtime {
    /// Cancel timers and return to `Inactive`
    fn clear(&mut self) {
        self.generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.phase = SessionPhase::Inactive;
        self.state = SessionState::inactive();
        self.identity = None;
        self.deadline = None;
        self.throttle.reset();
        self.extension_in_flight = false;
    }

    fn remaining(&self, now: Instant) -> Duration {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }
}

struct Inner {
    auth: Arc<dyn AuthProvider>,
    config: SessionConfig,
    resolver: Option<IdentityResolver>,
    loading: Option<LoadingContext>,
    runtime: Mutex<Runtime>,
    events: broadcast::Sender<SessionEvent>,
}

/// Session lifecycle manager.
///
/// Share it behind an `Arc`; only the manager schedules timers or calls the
/// auth provider.
pub struct SessionManager {
    inner: Arc<Inner>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// Create a manager; fails if `config` is inconsistent
    pub fn new(auth: Arc<dyn AuthProvider>, config: SessionConfig) -> ClientResult<Self> {
        if config.timeout_minutes == 0 || config.warning_minutes >= config.timeout_minutes {
            return Err(config_error!(
                format!(
                    "warning_minutes ({}) must be less than timeout_minutes ({})",
                    config.warning_minutes, config.timeout_minutes
                ),
                "session"
            )
            .into());
        }
        if !(config.extension_threshold > 0.0 && config.extension_threshold <= 1.0) {
            return Err(config_error!("extension_threshold must be in (0, 1]", "session").into());
        }

        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let runtime = Runtime {
            phase: SessionPhase::Inactive,
            state: SessionState::inactive(),
            identity: None,
            deadline: None,
            generation: 0,
            timer: None,
            throttle: ActivityThrottle::new(config.activity_throttle()),
            extension_in_flight: false,
        };

        Ok(Self {
            inner: Arc::new(Inner {
                auth,
                config,
                resolver: None,
                loading: None,
                runtime: Mutex::new(runtime),
                events,
            }),
            listener: Mutex::new(None),
        })
    }

    /// Resolve the user's role from the profile tables on each activation.
    /// Has no effect once the manager is started.
    pub fn with_identity_resolver(mut self, resolver: IdentityResolver) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.resolver = Some(resolver);
        }
        self
    }

    /// Show a loading indicator while the initial session is read.
    /// Has no effect once the manager is started.
    pub fn with_loading(mut self, loading: LoadingContext) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.loading = Some(loading);
        }
        self
    }

    /// Begin tracking: listen for auth changes and adopt an existing session.
    ///
    /// Calling `start` again while running is a no-op.
    pub async fn start(&self) -> ClientResult<()> {
        {
            let mut listener = self.listener.lock();
            if listener.is_some() {
                return Ok(());
            }
            *listener = Some(Inner::spawn_listener(&self.inner));
        }

        let _loading = self
            .inner
            .loading
            .as_ref()
            .map(|loading| loading.start("Initializing authentication..."));

        // A shutdown or logout while the provider answers supersedes the result
        let generation = self.inner.runtime.lock().generation;
        match self.inner.auth.get_current_session().await {
            Ok(Some(session)) => {
                self.inner.activate(session, generation).await;
                Ok(())
            }
            Ok(None) => {
                debug!("No existing session");
                Ok(())
            }
            Err(e) => {
                e.log();
                if e.is_auth_failure() {
                    // Stored credentials are unusable; clear them on the provider
                    if let Err(sign_out_error) = self.inner.auth.sign_out().await {
                        sign_out_error.log();
                    }
                }
                Err(e.into())
            }
        }
    }

    /// Stop listening and cancel timers without signing out
    pub fn shutdown(&self) {
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
        self.inner.runtime.lock().clear();
        info!("Session manager shut down");
    }

    /// Refresh the session now.
    ///
    /// On failure the session keeps its existing timer and an
    /// [`SessionEvent::ExtensionFailed`] is broadcast.
    pub async fn extend_session(&self) -> ClientResult<()> {
        self.inner.extend().await
    }

    /// Sign out immediately. Timers are cancelled before the provider is
    /// called, and the manager ends `Inactive` whatever the outcome.
    pub async fn force_logout(&self) -> ClientResult<()> {
        let generation = {
            let mut runtime = self.inner.runtime.lock();
            runtime.clear();
            runtime.generation
        };

        let result = self.inner.auth.sign_out().await;

        {
            let mut runtime = self.inner.runtime.lock();
            if runtime.generation == generation {
                runtime.clear();
            }
        }

        let clean = result.is_ok();
        if let Err(e) = &result {
            e.log();
        }
        info!(clean, "Logged out");
        let _ = self.inner.events.send(SessionEvent::LoggedOut { clean });

        result.map_err(ClientError::from)
    }

    /// Activity-listener entry point
    pub async fn record_activity(&self, kind: ActivityKind) -> ActivityOutcome {
        let config = &self.inner.config;
        let should_extend = {
            let mut runtime = self.inner.runtime.lock();
            if !config.extend_on_activity
                || !runtime.phase.is_live()
                || !config.activity_events.contains(&kind)
            {
                return ActivityOutcome::Ignored;
            }

            let now = Instant::now();
            if !runtime.throttle.admit(now) {
                return ActivityOutcome::Throttled;
            }
            runtime.state.last_activity = Utc::now();

            runtime.remaining(now) < config.extension_window() && !runtime.extension_in_flight
        };

        if !should_extend {
            return ActivityOutcome::Recorded;
        }

        debug!(?kind, "Activity late in session window, extending");
        match self.inner.extend().await {
            Ok(()) => ActivityOutcome::Extended,
            Err(_) => ActivityOutcome::ExtensionFailed,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let runtime = self.inner.runtime.lock();
        SessionSnapshot {
            phase: runtime.phase,
            state: runtime.state.clone(),
            identity: runtime.identity.clone(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.runtime.lock().state.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.runtime.lock().phase
    }

    pub fn identity(&self) -> Option<UserIdentity> {
        self.inner.runtime.lock().identity.clone()
    }

    /// Zero when no session is live
    pub fn time_until_expiry(&self) -> Duration {
        self.inner.runtime.lock().remaining(Instant::now())
    }

    pub fn formatted_time_until_expiry(&self) -> String {
        format_remaining(self.time_until_expiry())
    }

    /// True inside the warning lead time
    pub fn is_session_expiring_soon(&self) -> bool {
        let remaining = self.time_until_expiry();
        remaining > Duration::ZERO && remaining < self.inner.config.warning_lead()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
        if let Some(timer) = self.inner.runtime.lock().timer.take() {
            timer.abort();
        }
    }
}

impl Inner {
    fn spawn_listener(this: &Arc<Self>) -> JoinHandle<()> {
        // Subscribe before reading the current session so no event is missed
        let mut auth_events = this.auth.subscribe_auth_events();
        let inner = Arc::clone(this);

        tokio::spawn(async move {
            loop {
                match auth_events.recv().await {
                    Ok(AuthEvent::SignedIn(session)) => {
                        let generation = inner.runtime.lock().generation;
                        inner.activate(session, generation).await
                    }
                    Ok(AuthEvent::SignedOut) => inner.deactivate(),
                    Ok(AuthEvent::TokenRefreshed(_)) => debug!("Provider refreshed token"),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auth event listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Auth event stream closed");
                        break;
                    }
                }
            }
        })
    }

    /// `Inactive -> Active` on a new valid session. Discarded if anything
    /// rescheduled or cleared the session since `generation` was read.
    async fn activate(self: &Arc<Self>, session: AuthSession, generation: u64) {
        let identity = match &self.resolver {
            Some(resolver) => resolver.resolve(&session).await,
            None => UserIdentity::from_session(&session),
        };

        let mut runtime = self.runtime.lock();
        if runtime.generation != generation {
            debug!(user_id = %session.user_id, "Session changed during activation, discarding");
            return;
        }

        let expires_at = self.schedule(&mut runtime);
        runtime.phase = SessionPhase::Active;
        runtime.state = SessionState {
            is_active: true,
            expires_at: Some(expires_at),
            last_activity: Utc::now(),
            warning_shown: false,
        };
        runtime.throttle.reset();
        // A refresh started for the previous window can no longer apply
        runtime.extension_in_flight = false;

        info!(
            user_id = %identity.user_id,
            role = %identity.role,
            timeout_minutes = self.config.timeout_minutes,
            "Session active"
        );
        let _ = self.events.send(SessionEvent::Started {
            user_id: identity.user_id.clone(),
            role: identity.role,
            expires_at,
        });
        runtime.identity = Some(identity);
    }

    /// Provider-initiated sign-out
    fn deactivate(&self) {
        let mut runtime = self.runtime.lock();
        let was_live = runtime.phase.is_live();
        runtime.clear();
        if was_live {
            info!("Session signed out by provider");
            let _ = self.events.send(SessionEvent::SignedOut);
        }
    }

    /// Cancel any running timer and start a fresh window. Returns the new
    /// wall-clock expiry.
    fn schedule(self: &Arc<Self>, runtime: &mut Runtime) -> chrono::DateTime<Utc> {
        runtime.generation += 1;
        let generation = runtime.generation;
        if let Some(timer) = runtime.timer.take() {
            timer.abort();
        }

        let timeout = self.config.timeout();
        let deadline = Instant::now() + timeout;
        runtime.deadline = Some(deadline);

        let warning_at = (self.config.show_warnings && self.config.warning_minutes > 0)
            .then(|| deadline - self.config.warning_lead());

        let inner = Arc::clone(self);
        runtime.timer = Some(tokio::spawn(async move {
            if let Some(warning_at) = warning_at {
                sleep_until(warning_at).await;
                inner.on_warning(generation);
            }
            sleep_until(deadline).await;
            inner.on_expiry(generation).await;
        }));

        Utc::now() + chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::zero())
    }

    /// `Active -> Warning`
    fn on_warning(&self, generation: u64) {
        let mut runtime = self.runtime.lock();
        if runtime.generation != generation || runtime.phase != SessionPhase::Active {
            return;
        }
        runtime.phase = SessionPhase::Warning;
        runtime.state.warning_shown = true;

        let remaining = runtime.remaining(Instant::now());
        info!(remaining_secs = remaining.as_secs(), "Session expiring soon");
        let _ = self.events.send(SessionEvent::WarningIssued { remaining });
    }

    /// `Active|Warning -> Inactive` on timeout
    async fn on_expiry(&self, generation: u64) {
        {
            let mut runtime = self.runtime.lock();
            if runtime.generation != generation {
                return;
            }
            // This task is the timer; release its handle instead of aborting it
            runtime.timer.take();
            runtime.clear();
        }

        info!("Session expired, signing out");
        if let Err(e) = self.auth.sign_out().await {
            e.log();
        }

        let _ = self.events.send(SessionEvent::Expired {
            redirect_to: self.config.reauth_path.clone(),
        });
    }

    /// `Warning|Active -> Active` with a fresh window
    async fn extend(self: &Arc<Self>) -> ClientResult<()> {
        let generation = {
            let mut runtime = self.runtime.lock();
            if !runtime.phase.is_live() {
                return Err(ClientError::session("No active session to extend"));
            }
            if runtime.extension_in_flight {
                return Err(ClientError::session("Session extension already in progress"));
            }
            runtime.extension_in_flight = true;
            runtime.generation
        };

        let result = self.auth.refresh_session().await;

        let mut runtime = self.runtime.lock();
        if runtime.generation != generation || !runtime.phase.is_live() {
            debug!("Session changed while refresh was in flight, discarding result");
            return Err(ClientError::session("Session changed during extension"));
        }

        runtime.extension_in_flight = false;

        match result {
            Ok(_) => {
                let expires_at = self.schedule(&mut runtime);
                runtime.phase = SessionPhase::Active;
                runtime.state.expires_at = Some(expires_at);
                runtime.state.last_activity = Utc::now();
                runtime.state.warning_shown = false;

                info!(%expires_at, "Session extended");
                let _ = self.events.send(SessionEvent::Extended { expires_at });
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to extend session");
                let _ = self.events.send(SessionEvent::ExtensionFailed {
                    message: e.to_string(),
                    recoverable: e.is_recoverable(),
                });
                Err(e.into())
            }
        }
    }
}
