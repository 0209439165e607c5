//! Session Types and Structures

use crate::auth::{UserIdentity, UserRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle phase of the client session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// No valid session
    Inactive,
    /// Timer running, no warning shown
    Active,
    /// Warning fired, timer still running
    Warning,
}

impl SessionPhase {
    /// `Active` or `Warning`
    pub fn is_live(&self) -> bool {
        !matches!(self, SessionPhase::Inactive)
    }
}

/// Session validity as seen by the UI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    pub warning_shown: bool,
}

impl SessionState {
    pub fn inactive() -> Self {
        Self {
            is_active: false,
            expires_at: None,
            last_activity: Utc::now(),
            warning_shown: false,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::inactive()
    }
}

/// Read-only view handed to consumers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub state: SessionState,
    pub identity: Option<UserIdentity>,
}

/// Notifications broadcast to UI observers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A valid session was detected and the timers started
    Started {
        user_id: String,
        role: UserRole,
        expires_at: DateTime<Utc>,
    },
    /// The warning lead time was reached; the UI should offer an extension
    WarningIssued { remaining: Duration },
    Extended { expires_at: DateTime<Utc> },
    /// Refreshing failed; the session continues on its existing timer
    ExtensionFailed { message: String, recoverable: bool },
    /// The session timed out and was signed out
    Expired { redirect_to: String },
    /// The provider reported a sign-out this manager did not initiate
    SignedOut,
    /// `force_logout` finished; `clean` is false if the provider call failed
    LoggedOut { clean: bool },
}

/// What happened to one activity signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// Not tracked (no live session, tracking disabled, or kind not listed)
    Ignored,
    /// Dropped by the throttle window
    Throttled,
    /// Recorded; no extension was needed
    Recorded,
    Extended,
    ExtensionFailed,
}

/// Render a remaining duration as `"4m 59s"` or `"59s"`
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    let minutes = secs / 60;
    let seconds = secs % 60;
    if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
