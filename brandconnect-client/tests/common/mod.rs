//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use brandconnect_core::{
    auth_error, network_error, AuthEvent, AuthProvider, AuthSession, BrandConnectError,
    BrandConnectResult, ChangeEvent, ChangeFeed, ChannelSpec, ChannelStatus, ErrorContext,
    FeedChannel, FeedMessage, QueryClient, TableQuery,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};

/// Let spawned tasks run until they block. Relies on a paused clock.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Holds async calls of a fake until released. Open by default.
pub struct Gate {
    open: watch::Sender<bool>,
}

impl Default for Gate {
    fn default() -> Self {
        let (open, _) = watch::channel(true);
        Self { open }
    }
}

impl Gate {
    pub fn hold(&self) {
        self.open.send_replace(false);
    }

    pub fn release(&self) {
        self.open.send_replace(true);
    }

    pub async fn pass(&self) {
        let mut open = self.open.subscribe();
        let _ = open.wait_for(|open| *open).await;
    }
}

pub fn session(user_id: &str, metadata: Value) -> AuthSession {
    let user_metadata = match metadata {
        Value::Object(map) => map.into_iter().collect(),
        _ => HashMap::new(),
    };
    AuthSession {
        access_token: format!("token-{user_id}"),
        user_id: user_id.to_string(),
        email: Some(format!("{user_id}@example.com")),
        expires_at: None,
        user_metadata,
        email_confirmed: true,
    }
}

pub struct FakeAuth {
    events: broadcast::Sender<AuthEvent>,
    current: Mutex<Option<AuthSession>>,
    pub fail_refresh: AtomicBool,
    pub fail_current_session: AtomicBool,
    pub refresh_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
    pub session_gate: Gate,
    pub refresh_gate: Gate,
}

impl FakeAuth {
    pub fn new(current: Option<AuthSession>) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            events,
            current: Mutex::new(current),
            fail_refresh: AtomicBool::new(false),
            fail_current_session: AtomicBool::new(false),
            refresh_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            session_gate: Gate::default(),
            refresh_gate: Gate::default(),
        })
    }

    pub fn sign_in(&self, session: AuthSession) {
        *self.current.lock().unwrap() = Some(session.clone());
        let _ = self.events.send(AuthEvent::SignedIn(session));
    }

    pub fn has_session(&self) -> bool {
        self.current.lock().unwrap().is_some()
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn sign_outs(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn get_current_session(&self) -> BrandConnectResult<Option<AuthSession>> {
        self.session_gate.pass().await;
        if self.fail_current_session.load(Ordering::SeqCst) {
            return Err(auth_error!("stored refresh token is invalid", "fake-auth"));
        }
        Ok(self.current.lock().unwrap().clone())
    }

    async fn refresh_session(&self) -> BrandConnectResult<AuthSession> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_gate.pass().await;
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(network_error!("refresh endpoint unreachable", "fake-auth"));
        }
        let current = self.current.lock().unwrap().clone();
        let session = current.ok_or_else(|| auth_error!("no session", "fake-auth"))?;
        let _ = self.events.send(AuthEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> BrandConnectResult<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        let had_session = self.current.lock().unwrap().take().is_some();
        if had_session {
            let _ = self.events.send(AuthEvent::SignedOut);
        }
        Ok(())
    }

    fn subscribe_auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[derive(Default)]
pub struct FakeQuery {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    failing: Mutex<HashSet<String>>,
    log: Mutex<Vec<TableQuery>>,
    pub gate: Gate,
}

impl FakeQuery {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_rows(&self, table: &str, rows: Vec<Value>) {
        self.tables.lock().unwrap().insert(table.to_string(), rows);
    }

    pub fn fail_table(&self, table: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(table.to_string());
        } else {
            set.remove(table);
        }
    }

    pub fn queries(&self) -> Vec<TableQuery> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryClient for FakeQuery {
    async fn query(&self, query: &TableQuery) -> BrandConnectResult<Vec<Value>> {
        self.log.lock().unwrap().push(query.clone());
        if self.failing.lock().unwrap().contains(&query.table) {
            return Err(BrandConnectError::Query {
                table: query.table.clone(),
                message: "service unavailable".to_string(),
                context: ErrorContext::new("fake-query"),
            });
        }

        // Rows are read on entry so a held call answers with what was current then
        let rows = {
            let tables = self.tables.lock().unwrap();
            tables.get(&query.table).cloned().unwrap_or_default()
        };
        self.gate.pass().await;

        Ok(rows
            .into_iter()
            .filter(|row| query.filter.as_ref().map_or(true, |f| f.matches(row)))
            .collect())
    }
}

#[derive(Default)]
pub struct FakeFeed {
    channels: Mutex<Vec<(ChannelSpec, mpsc::UnboundedSender<FeedMessage>)>>,
    unsubscribed: Arc<Mutex<Vec<String>>>,
    pub fail_subscribe: AtomicBool,
}

impl FakeFeed {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn specs(&self) -> Vec<ChannelSpec> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .map(|(spec, _)| spec.clone())
            .collect()
    }

    pub fn unsubscribed(&self) -> Vec<String> {
        self.unsubscribed.lock().unwrap().clone()
    }

    /// Deliver to the named channel; false once it is gone
    pub fn push(&self, channel: &str, message: FeedMessage) -> bool {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .find(|(spec, _)| spec.name == channel)
            .map_or(false, |(_, tx)| tx.send(message).is_ok())
    }

    pub fn status(&self, channel: &str, status: ChannelStatus) -> bool {
        self.push(channel, FeedMessage::Status(status))
    }

    pub fn insert(&self, channel: &str, row: Value) -> bool {
        self.push(channel, FeedMessage::Change(ChangeEvent::Insert { new: row }))
    }

    pub fn update(&self, channel: &str, row: Value) -> bool {
        self.push(channel, FeedMessage::Change(ChangeEvent::Update { new: row }))
    }

    pub fn delete(&self, channel: &str, id: &str) -> bool {
        self.push(
            channel,
            FeedMessage::Change(ChangeEvent::Delete { old: json!({ "id": id }) }),
        )
    }

    /// Drop the provider side of a channel
    pub fn close(&self, channel: &str) {
        self.channels
            .lock()
            .unwrap()
            .retain(|(spec, _)| spec.name != channel);
    }
}

#[async_trait]
impl ChangeFeed for FakeFeed {
    async fn subscribe(&self, spec: ChannelSpec) -> BrandConnectResult<Box<dyn FeedChannel>> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(BrandConnectError::Subscription {
                channel: spec.name,
                message: "handshake rejected".to_string(),
                context: ErrorContext::new("fake-feed"),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let name = spec.name.clone();
        self.channels.lock().unwrap().push((spec, tx));
        Ok(Box::new(FakeChannel {
            name,
            rx,
            unsubscribed: Arc::clone(&self.unsubscribed),
        }))
    }
}

struct FakeChannel {
    name: String,
    rx: mpsc::UnboundedReceiver<FeedMessage>,
    unsubscribed: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl FeedChannel for FakeChannel {
    async fn next(&mut self) -> Option<FeedMessage> {
        self.rx.recv().await
    }

    async fn unsubscribe(&mut self) {
        self.rx.close();
        self.unsubscribed.lock().unwrap().push(self.name.clone());
    }
}

pub fn booking(id: &str, status: &str, client_id: &str) -> Value {
    json!({
        "id": id,
        "status": status,
        "client_id": client_id,
        "creative_id": "c-1",
    })
}
