//! Unified error handling system
//!
//! Provides structured error types with context, a severity classification that
//! drives recovery behaviour, and proper error chaining

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

pub type BrandConnectResult<T> = Result<T, BrandConnectError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// How a failure should be treated by the component that observed it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Recovered locally; current state is preserved and the caller is told
    Transient,
    /// The change feed is unavailable; surfaced as a disconnected status
    Connectivity,
    /// Cannot be recovered locally
    Fatal,
}

/// Main error type for the Brand Connect client core
#[derive(Error, Debug)]
pub enum BrandConnectError {
    #[error("Authentication error: {message}")]
    Authentication {
        message: String,
        context: ErrorContext,
    },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Query error on {table}: {message}")]
    Query {
        table: String,
        message: String,
        context: ErrorContext,
    },

    #[error("Subscription error on {channel}: {message}")]
    Subscription {
        channel: String,
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("Failed to decode record from {table}: {message}")]
    Decode {
        table: String,
        message: String,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BrandConnectError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            BrandConnectError::Authentication { context, .. } => Some(context),
            BrandConnectError::Network { context, .. } => Some(context),
            BrandConnectError::Query { context, .. } => Some(context),
            BrandConnectError::Subscription { context, .. } => Some(context),
            BrandConnectError::Config { context, .. } => Some(context),
            BrandConnectError::Validation { context, .. } => Some(context),
            BrandConnectError::Decode { context, .. } => Some(context),
            BrandConnectError::Io(_) | BrandConnectError::Serialization(_) => None,
        }
    }

    /// Classify the error for recovery decisions
    pub fn severity(&self) -> Severity {
        match self {
            BrandConnectError::Network { .. } | BrandConnectError::Query { .. } => {
                Severity::Transient
            }
            BrandConnectError::Subscription { .. } => Severity::Connectivity,
            _ => Severity::Fatal,
        }
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        self.severity() == Severity::Transient
    }

    /// Whether this error means the credentials are no longer usable
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, BrandConnectError::Authentication { .. })
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        let error_id = self.context().map(|c| c.error_id.as_str());
        match self.severity() {
            Severity::Transient => {
                warn!(
                    error_id = ?error_id,
                    error = %self,
                    "Transient error (state preserved)"
                );
            }
            Severity::Connectivity => {
                warn!(
                    error_id = ?error_id,
                    error = %self,
                    "Change feed connectivity error"
                );
            }
            Severity::Fatal => {
                error!(
                    error_id = ?error_id,
                    error = %self,
                    "Error occurred"
                );
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! auth_error {
    ($msg:expr, $component:expr) => {
        $crate::BrandConnectError::Authentication {
            message: $msg.to_string(),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Sign in again to obtain a fresh session"),
        }
    };
}

#[macro_export]
macro_rules! network_error {
    ($msg:expr, $component:expr) => {
        $crate::BrandConnectError::Network {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::BrandConnectError::Network {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::BrandConnectError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file"),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::BrandConnectError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the field value and format"),
        }
    };
}
