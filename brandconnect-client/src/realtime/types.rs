//! Real-time synchronization types

use brandconnect_core::{
    validation_error, BrandConnectError, ChangeFeed, ChannelStatus, QueryClient, RealtimeConfig,
    TableFilter, TableQuery,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A row uniquely keyed by `id`
pub trait Record: DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
}

/// Extract the `id` of a raw row; numeric keys are stringified
pub fn row_id(row: &serde_json::Value) -> Option<String> {
    id_string(row.get("id")?)
}

fn id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(id) => Some(id.clone()),
        serde_json::Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// `deserialize_with` helper accepting the same id forms as [`row_id`]
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    id_string(&value).ok_or_else(|| {
        serde::de::Error::custom(format!("expected a string or numeric id, got {value}"))
    })
}

/// Observational connectivity of the change-feed channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl From<ChannelStatus> for ConnectionStatus {
    fn from(status: ChannelStatus) -> Self {
        match status {
            ChannelStatus::Subscribed => ConnectionStatus::Connected,
            ChannelStatus::ChannelError => ConnectionStatus::Disconnected,
            ChannelStatus::TimedOut | ChannelStatus::Closed => ConnectionStatus::Connecting,
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Which slice of which table to mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub table: String,
    pub filter: Option<TableFilter>,
    pub projection: Option<String>,
}

impl SyncOptions {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
            projection: None,
        }
    }

    pub fn with_filter(mut self, filter: TableFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = Some(projection.into());
        self
    }

    pub fn validate(&self) -> Result<(), BrandConnectError> {
        if self.table.trim().is_empty() {
            return Err(validation_error!("table name is empty", "table", "realtime"));
        }
        Ok(())
    }

    pub fn to_query(&self) -> TableQuery {
        TableQuery {
            table: self.table.clone(),
            filter: self.filter.clone(),
            projection: self.projection.clone(),
        }
    }
}

pub type RecordHook<T> = Arc<dyn Fn(&T) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&BrandConnectError) + Send + Sync>;

/// Caller callbacks, invoked after the mirror changed
pub struct SyncHooks<T> {
    pub on_insert: Option<RecordHook<T>>,
    pub on_update: Option<RecordHook<T>>,
    pub on_delete: Option<RecordHook<T>>,
    pub on_error: Option<ErrorHook>,
}

impl<T> SyncHooks<T> {
    pub fn new() -> Self {
        Self {
            on_insert: None,
            on_update: None,
            on_delete: None,
            on_error: None,
        }
    }

    pub fn on_insert(mut self, hook: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_insert = Some(Arc::new(hook));
        self
    }

    pub fn on_update(mut self, hook: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Arc::new(hook));
        self
    }

    pub fn on_delete(mut self, hook: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_delete = Some(Arc::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&BrandConnectError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }
}

impl<T> Default for SyncHooks<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SyncHooks<T> {
    fn clone(&self) -> Self {
        Self {
            on_insert: self.on_insert.clone(),
            on_update: self.on_update.clone(),
            on_delete: self.on_delete.clone(),
            on_error: self.on_error.clone(),
        }
    }
}

/// Collaborators a synchronizer needs
#[derive(Clone)]
pub struct SyncDeps {
    pub query: Arc<dyn QueryClient>,
    pub feed: Arc<dyn ChangeFeed>,
    pub realtime: RealtimeConfig,
}

/// Point-in-time view of a synchronizer
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSnapshot<T> {
    pub data: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub connection_status: ConnectionStatus,
}
