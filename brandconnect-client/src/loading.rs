//! Loading Context
//!
//! A constructed, shareable loading indicator. Consumers receive the context
//! explicitly and observe it through a watch channel.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

pub const DEFAULT_LOADING_MESSAGE: &str = "Loading...";

/// Observable loading state
#[derive(Debug, Clone, PartialEq)]
pub struct LoadingState {
    pub is_loading: bool,
    pub message: String,
    /// Percentage in `0.0..=100.0`
    pub progress: Option<f64>,
}

impl Default for LoadingState {
    fn default() -> Self {
        Self {
            is_loading: false,
            message: DEFAULT_LOADING_MESSAGE.to_string(),
            progress: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadingContext {
    state: Arc<watch::Sender<LoadingState>>,
}

impl LoadingContext {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LoadingState::default());
        Self {
            state: Arc::new(state),
        }
    }

    /// Start loading; loading stops when the returned guard is dropped
    #[must_use = "loading stops as soon as the guard is dropped"]
    pub fn start(&self, message: impl Into<String>) -> LoadingGuard {
        let message = message.into();
        self.state.send_modify(|state| {
            state.is_loading = true;
            state.message = message;
            state.progress = None;
        });
        LoadingGuard {
            context: self.clone(),
        }
    }

    pub fn stop(&self) {
        self.state.send_modify(|state| state.is_loading = false);
    }

    pub fn update_message(&self, message: impl Into<String>) {
        let message = message.into();
        self.state.send_modify(|state| state.message = message);
    }

    pub fn update_progress(&self, progress: f64) {
        let progress = progress.clamp(0.0, 100.0);
        self.state.send_modify(|state| state.progress = Some(progress));
    }

    pub fn snapshot(&self) -> LoadingState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadingState> {
        self.state.subscribe()
    }

    /// Run `future` with the indicator shown, stopping it on every exit path
    pub async fn run_with_loading<F, T>(&self, message: impl Into<String>, future: F) -> T
    where
        F: Future<Output = T>,
    {
        let _guard = self.start(message);
        future.await
    }
}

impl Default for LoadingContext {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by [`LoadingContext::start`]
pub struct LoadingGuard {
    context: LoadingContext,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.context.stop();
    }
}
