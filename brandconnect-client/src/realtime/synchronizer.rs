//! Real-Time Synchronizer
//!
//! Pulls a table once, then patches the mirror from change-feed events.
//!
//! Event application and teardown serialize on an async dispatch lock, so once
//! [`RealtimeSynchronizer::teardown`] returns no hook runs and the mirror no
//! longer changes. Loads carry a generation number; a response that is not
//! the latest, or that lands after teardown, is dropped.

use super::collection::SyncedCollection;
use super::types::{
    row_id, ConnectionStatus, Record, SyncDeps, SyncHooks, SyncOptions, SyncSnapshot,
};
use crate::{ClientError, ClientResult};
use brandconnect_core::{
    BrandConnectError, BrandConnectResult, ChangeEvent, ChannelSpec, ChannelStatus, ErrorContext,
    FeedChannel, FeedMessage, QueryClient,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Mirror<T> {
    collection: SyncedCollection<T>,
    loading: bool,
    error: Option<String>,
}

struct Shared<T> {
    options: SyncOptions,
    channel_name: String,
    query: Arc<dyn QueryClient>,
    hooks: SyncHooks<T>,
    mirror: Mutex<Mirror<T>>,
    status: watch::Sender<ConnectionStatus>,
    dispatch: tokio::sync::Mutex<()>,
    alive: AtomicBool,
    load_generation: AtomicU64,
}

struct Handles {
    pump: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

/// Live mirror of one table (or filtered slice of it)
pub struct RealtimeSynchronizer<T: Record> {
    shared: Arc<Shared<T>>,
    handles: Mutex<Handles>,
}

impl<T: Record> RealtimeSynchronizer<T> {
    /// Subscribe and run the initial load.
    ///
    /// Fails only when `options` are invalid. A failed subscription shows up
    /// as [`ConnectionStatus::Disconnected`]; a failed load as
    /// [`SyncSnapshot::error`].
    pub async fn start(
        deps: SyncDeps,
        options: SyncOptions,
        hooks: SyncHooks<T>,
    ) -> ClientResult<Self> {
        Self::start_seeded(deps, options, hooks, Vec::new()).await
    }

    /// Like [`start`](Self::start), showing `initial` until the first load lands
    pub async fn start_seeded(
        deps: SyncDeps,
        options: SyncOptions,
        hooks: SyncHooks<T>,
        initial: Vec<T>,
    ) -> ClientResult<Self> {
        options.validate()?;

        let channel_name = format!(
            "{}:{}:{}",
            deps.realtime.channel_prefix,
            options.table,
            uuid::Uuid::new_v4()
        );
        let (status, _) = watch::channel(ConnectionStatus::Connecting);

        let shared = Arc::new(Shared {
            options,
            channel_name,
            query: deps.query,
            hooks,
            mirror: Mutex::new(Mirror {
                collection: SyncedCollection::from_records(initial),
                loading: true,
                error: None,
            }),
            status,
            dispatch: tokio::sync::Mutex::new(()),
            alive: AtomicBool::new(true),
            load_generation: AtomicU64::new(0),
        });

        let spec = ChannelSpec {
            name: shared.channel_name.clone(),
            schema: deps.realtime.schema.clone(),
            table: shared.options.table.clone(),
            filter: shared.options.filter.clone(),
        };

        let handles = match deps.feed.subscribe(spec).await {
            Ok(channel) => {
                let (shutdown_tx, shutdown_rx) = oneshot::channel();
                let pump = tokio::spawn(Shared::pump(Arc::clone(&shared), channel, shutdown_rx));
                debug!(channel = %shared.channel_name, "Subscribed to change feed");
                Handles {
                    pump: Some(pump),
                    shutdown: Some(shutdown_tx),
                }
            }
            Err(e) => {
                shared.status.send_replace(ConnectionStatus::Disconnected);
                shared.report(&e);
                Handles {
                    pump: None,
                    shutdown: None,
                }
            }
        };

        let synchronizer = Self {
            shared,
            handles: Mutex::new(handles),
        };

        // Recorded in the snapshot and reported through `on_error`
        let _ = synchronizer.shared.load().await;

        Ok(synchronizer)
    }

    /// Re-run the query without touching the subscription. The result fully
    /// replaces the mirror, discarding unconfirmed optimistic edits.
    pub async fn refresh(&self) -> ClientResult<()> {
        self.shared.load().await
    }

    /// Unsubscribe. Must be called once when the consumer deactivates; later
    /// calls are no-ops.
    pub async fn teardown(&self) {
        {
            let _dispatch = self.shared.dispatch.lock().await;
            if !self.shared.alive.swap(false, Ordering::SeqCst) {
                return;
            }
            // Any load still in flight is discarded once it lands
            self.shared.mirror.lock().loading = false;
        }

        self.shared
            .status
            .send_replace(ConnectionStatus::Disconnected);

        let (pump, shutdown) = {
            let mut handles = self.handles.lock();
            (handles.pump.take(), handles.shutdown.take())
        };
        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(());
        }
        if let Some(pump) = pump {
            if let Err(e) = pump.await {
                warn!(channel = %self.shared.channel_name, error = %e, "Change feed task failed");
            }
        }

        info!(channel = %self.shared.channel_name, "Synchronizer torn down");
    }

    pub fn is_active(&self) -> bool {
        self.shared.alive.load(Ordering::SeqCst)
    }

    pub fn add_optimistic(&self, record: T) -> bool {
        self.with_live_mirror(|collection| {
            collection.add_optimistic(record);
            true
        })
    }

    pub fn update_optimistic<F>(&self, id: &str, patch: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        self.with_live_mirror(|collection| collection.update_optimistic(id, patch))
    }

    pub fn remove_optimistic(&self, id: &str) -> Option<T> {
        if !self.is_active() {
            return None;
        }
        self.shared.mirror.lock().collection.remove_optimistic(id)
    }

    fn with_live_mirror<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut SyncedCollection<T>) -> bool,
    {
        if !self.is_active() {
            return false;
        }
        f(&mut self.shared.mirror.lock().collection)
    }

    pub fn data(&self) -> Vec<T> {
        self.shared.mirror.lock().collection.to_vec()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.shared.mirror.lock().collection.get(id).cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.mirror.lock().loading
    }

    pub fn error(&self) -> Option<String> {
        self.shared.mirror.lock().error.clone()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    pub fn snapshot(&self) -> SyncSnapshot<T> {
        let mirror = self.shared.mirror.lock();
        SyncSnapshot {
            data: mirror.collection.to_vec(),
            loading: mirror.loading,
            error: mirror.error.clone(),
            connection_status: *self.shared.status.borrow(),
        }
    }

    pub fn channel_name(&self) -> &str {
        &self.shared.channel_name
    }

    pub fn options(&self) -> &SyncOptions {
        &self.shared.options
    }
}

impl<T: Record> Drop for RealtimeSynchronizer<T> {
    fn drop(&mut self) {
        if self.shared.alive.swap(false, Ordering::SeqCst) {
            warn!(
                channel = %self.shared.channel_name,
                "Synchronizer dropped without teardown, releasing channel"
            );
            if let Some(shutdown) = self.handles.get_mut().shutdown.take() {
                let _ = shutdown.send(());
            }
        }
    }
}

impl<T: Record> Shared<T> {
    async fn pump(
        self: Arc<Self>,
        mut channel: Box<dyn FeedChannel>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                message = channel.next() => match message {
                    Some(FeedMessage::Status(status)) => self.apply_status(status).await,
                    Some(FeedMessage::Change(event)) => self.apply_change(event).await,
                    None => {
                        debug!(channel = %self.channel_name, "Change feed closed");
                        if self.alive.load(Ordering::SeqCst) {
                            self.status.send_replace(ConnectionStatus::Disconnected);
                        }
                        break;
                    }
                },
            }
        }

        channel.unsubscribe().await;
        debug!(channel = %self.channel_name, "Unsubscribed from change feed");
    }

    async fn load(&self) -> ClientResult<()> {
        if !self.alive.load(Ordering::SeqCst) {
            return Ok(());
        }
        let generation = self.load_generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut mirror = self.mirror.lock();
            mirror.loading = true;
            mirror.error = None;
        }

        let result = self
            .query
            .query(&self.options.to_query())
            .await
            .map(|rows| self.decode_rows(rows));

        let _dispatch = self.dispatch.lock().await;
        if !self.alive.load(Ordering::SeqCst)
            || self.load_generation.load(Ordering::SeqCst) != generation
        {
            debug!(table = %self.options.table, generation, "Discarding stale load");
            return Ok(());
        }

        match result {
            Ok(records) => {
                let count = records.len();
                {
                    let mut mirror = self.mirror.lock();
                    mirror.collection.replace_all(records);
                    mirror.loading = false;
                }
                debug!(table = %self.options.table, count, "Mirror loaded");
                Ok(())
            }
            Err(e) => {
                {
                    let mut mirror = self.mirror.lock();
                    mirror.loading = false;
                    mirror.error = Some(format!("Failed to load {}: {}", self.options.table, e));
                }
                self.report(&e);
                Err(ClientError::from(e))
            }
        }
    }

    fn decode_rows(&self, rows: Vec<serde_json::Value>) -> Vec<T> {
        rows.into_iter()
            .filter_map(|row| match self.decode(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    e.log();
                    None
                }
            })
            .collect()
    }

    fn decode(&self, row: serde_json::Value) -> BrandConnectResult<T> {
        serde_json::from_value(row).map_err(|e| BrandConnectError::Decode {
            table: self.options.table.clone(),
            message: e.to_string(),
            context: ErrorContext::new("realtime").with_operation("decode"),
        })
    }

    async fn apply_status(&self, status: ChannelStatus) {
        let _dispatch = self.dispatch.lock().await;
        if !self.alive.load(Ordering::SeqCst) {
            return;
        }

        let connection = ConnectionStatus::from(status);
        self.status.send_replace(connection);
        info!(channel = %self.channel_name, %connection, "Change feed status");

        if status == ChannelStatus::ChannelError {
            self.report(&BrandConnectError::Subscription {
                channel: self.channel_name.clone(),
                message: "channel error".to_string(),
                context: ErrorContext::new("realtime").with_operation("subscribe"),
            });
        }
    }

    async fn apply_change(&self, event: ChangeEvent) {
        let _dispatch = self.dispatch.lock().await;
        if !self.alive.load(Ordering::SeqCst) {
            return;
        }
        let kind = event.kind();

        match event {
            ChangeEvent::Insert { new } => {
                let Some(record) = self.decode_event(new) else {
                    return;
                };
                let applied = self.mirror.lock().collection.apply_insert(record.clone());
                if !applied {
                    debug!(
                        table = %self.options.table,
                        id = record.id(),
                        "Duplicate insert ignored"
                    );
                    return;
                }
                if let Some(hook) = &self.hooks.on_insert {
                    hook(&record);
                }
            }
            ChangeEvent::Update { new } => {
                let Some(record) = self.decode_event(new) else {
                    return;
                };
                let applied = self.mirror.lock().collection.apply_update(record.clone());
                if !applied {
                    debug!(
                        table = %self.options.table,
                        id = record.id(),
                        "Update for unknown record dropped"
                    );
                    return;
                }
                if let Some(hook) = &self.hooks.on_update {
                    hook(&record);
                }
            }
            ChangeEvent::Delete { old } => {
                let Some(id) = row_id(&old) else {
                    warn!(table = %self.options.table, kind, "Change event without id");
                    return;
                };
                let removed = self.mirror.lock().collection.apply_delete(&id);
                match (removed, &self.hooks.on_delete) {
                    (Some(record), Some(hook)) => hook(&record),
                    (None, _) => {
                        debug!(table = %self.options.table, %id, "Delete for unknown record")
                    }
                    _ => {}
                }
            }
        }
    }

    fn decode_event(&self, row: serde_json::Value) -> Option<T> {
        match self.decode(row) {
            Ok(record) => Some(record),
            Err(e) => {
                e.log();
                None
            }
        }
    }

    fn report(&self, error: &BrandConnectError) {
        error.log();
        if let Some(hook) = &self.hooks.on_error {
            hook(error);
        }
    }
}
