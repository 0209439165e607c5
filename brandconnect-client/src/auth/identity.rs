//! User Identity and Roles
//!
//! The closed set of marketplace roles, resolved once per session.

use brandconnect_core::AuthSession;
use serde::{Deserialize, Serialize};

/// Marketplace role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Platform administrator
    Admin,
    /// Creative professional offering services
    Creative,
    /// Client booking services
    Client,
}

impl UserRole {
    /// Landing route for this role
    pub fn home_path(&self) -> &'static str {
        match self {
            UserRole::Admin => "/admin",
            UserRole::Creative => "/dashboard/creative",
            UserRole::Client => "/dashboard",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Creative => write!(f, "creative"),
            UserRole::Client => write!(f, "client"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "creative" => Ok(UserRole::Creative),
            "client" => Ok(UserRole::Client),
            _ => Err(format!("Unknown user role: {}", s)),
        }
    }
}

/// Resolved identity of the signed-in user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserIdentity {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    /// Creatives stay unapproved until an admin reviews their profile
    pub approved: bool,
    pub verified: bool,
}

impl UserIdentity {
    /// Identity derived from auth metadata alone
    pub fn from_session(session: &AuthSession) -> Self {
        let role = session
            .metadata_str("role")
            .filter(|r| *r == "admin")
            .or_else(|| session.metadata_str("user_type"))
            .and_then(|r| r.parse().ok())
            .unwrap_or(UserRole::Client);

        let display_name = session
            .metadata_str("full_name")
            .or_else(|| session.metadata_str("name"))
            .unwrap_or(if role.is_admin() { "Admin" } else { "User" })
            .to_string();

        Self {
            user_id: session.user_id.clone(),
            email: session.email.clone().unwrap_or_default(),
            display_name,
            role,
            approved: true,
            verified: role.is_admin() || session.email_confirmed,
        }
    }

    /// Get user display string
    pub fn display_string(&self) -> String {
        format!("{} ({})", self.display_name, self.role)
    }
}
