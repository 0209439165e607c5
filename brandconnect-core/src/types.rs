//! Core data type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::logging::LoggingConfig;

/// An authentication grant issued by the hosted auth provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    pub user_id: String,
    pub email: Option<String>,
    /// Provider-side expiry. The lifecycle manager runs its own window and
    /// only reports this value.
    pub expires_at: Option<DateTime<Utc>>,
    /// Free-form metadata supplied at sign-up (`role`, `user_type`, `full_name`, ...)
    #[serde(default)]
    pub user_metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub email_confirmed: bool,
}

impl AuthSession {
    /// Look up a string-valued metadata entry
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Auth state transitions pushed by the provider
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    SignedOut,
    TokenRefreshed(AuthSession),
}

/// Filter operators understood by the hosted query layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOp::Eq => write!(f, "eq"),
        }
    }
}

/// A single-column row filter, rendered as `column=op.value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFilter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

impl TableFilter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    /// Whether a JSON row satisfies this filter
    pub fn matches(&self, row: &serde_json::Value) -> bool {
        match (self.op, row.get(&self.column)) {
            (FilterOp::Eq, Some(serde_json::Value::String(s))) => *s == self.value,
            (FilterOp::Eq, Some(other)) if !other.is_null() => other.to_string() == self.value,
            _ => false,
        }
    }
}

impl fmt::Display for TableFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}.{}", self.column, self.op, self.value)
    }
}

/// A one-shot read against a backend table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableQuery {
    pub table: String,
    pub filter: Option<TableFilter>,
    /// Column projection; `None` selects every column
    pub projection: Option<String>,
}

impl TableQuery {
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

    /// The projection string sent to the backend
    pub fn select(&self) -> &str {
        self.projection.as_deref().unwrap_or("*")
    }
}

/// Scope of one change-feed channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub name: String,
    pub schema: String,
    pub table: String,
    pub filter: Option<TableFilter>,
}

/// A row-level change delivered by the change feed
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Insert { new: serde_json::Value },
    Update { new: serde_json::Value },
    Delete { old: serde_json::Value },
}

impl ChangeEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::Insert { .. } => "INSERT",
            ChangeEvent::Update { .. } => "UPDATE",
            ChangeEvent::Delete { .. } => "DELETE",
        }
    }
}

/// Handshake outcome reported by a change-feed channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelStatus {
    Subscribed,
    ChannelError,
    TimedOut,
    Closed,
}

/// Everything a channel can deliver, in delivery order
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Status(ChannelStatus),
    Change(ChangeEvent),
}

/// Activity signals that count as the user being present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    PointerDown,
    PointerMove,
    KeyPress,
    Scroll,
    TouchStart,
    Click,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 6] = [
        ActivityKind::PointerDown,
        ActivityKind::PointerMove,
        ActivityKind::KeyPress,
        ActivityKind::Scroll,
        ActivityKind::TouchStart,
        ActivityKind::Click,
    ];
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Session validity window
    pub timeout_minutes: u32,
    /// Lead time before expiry at which the warning fires
    pub warning_minutes: u32,
    /// Extend automatically when activity is observed late in the window
    pub extend_on_activity: bool,
    pub show_warnings: bool,
    /// Fraction of `timeout_minutes`; activity extends once the remaining
    /// time drops below it
    pub extension_threshold: f64,
    pub activity_throttle_ms: u64,
    pub activity_events: Vec<ActivityKind>,
    /// Where the UI should send the user after a timeout
    pub reauth_path: String,
}

impl SessionConfig {
    /// General-purpose session: one hour, warned five minutes ahead
    pub fn standard() -> Self {
        Self {
            timeout_minutes: 60,
            warning_minutes: 5,
            extend_on_activity: true,
            show_warnings: true,
            extension_threshold: 0.5,
            activity_throttle_ms: 1000,
            activity_events: ActivityKind::ALL.to_vec(),
            reauth_path: "/login?reason=session_expired".to_string(),
        }
    }

    /// Sensitive operations: fifteen minutes and explicit re-confirmation only
    pub fn sensitive() -> Self {
        Self {
            timeout_minutes: 15,
            warning_minutes: 2,
            extend_on_activity: false,
            ..Self::standard()
        }
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.timeout_minutes) * 60)
    }

    pub fn warning_lead(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.warning_minutes) * 60)
    }

    /// Remaining time below which activity triggers an extension
    pub fn extension_window(&self) -> std::time::Duration {
        self.timeout().mul_f64(self.extension_threshold)
    }

    pub fn activity_throttle(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.activity_throttle_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Change-feed channel configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RealtimeConfig {
    pub schema: String,
    pub channel_prefix: String,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            channel_prefix: "realtime".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub site_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FeatureFlags {
    pub chat: bool,
    pub payments: bool,
    pub notifications: bool,
}

/// Hosted backend endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
}

/// Top-level client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrandConnectConfig {
    pub app: AppInfo,
    pub features: FeatureFlags,
    pub backend: BackendConfig,
    pub session: SessionConfig,
    pub realtime: RealtimeConfig,
    pub logging: LoggingConfig,
}
