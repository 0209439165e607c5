//! Identity Resolver
//!
//! Looks up the profile tables once per activation to decide the user's role.

use super::{UserIdentity, UserRole};
use brandconnect_core::{AuthSession, BrandConnectResult, QueryClient, TableFilter, TableQuery};
use std::sync::Arc;
use tracing::{debug, warn};

pub const CLIENT_PROFILES: &str = "client_profiles";
pub const CREATIVE_PROFILES: &str = "creative_profiles";

/// Resolves a [`UserIdentity`] from an auth session and the profile tables
#[derive(Clone)]
pub struct IdentityResolver {
    query: Arc<dyn QueryClient>,
}

impl IdentityResolver {
    pub fn new(query: Arc<dyn QueryClient>) -> Self {
        Self { query }
    }

    /// Resolve the identity behind `session`.
    ///
    /// Never fails: if the profile lookups error, the identity is built from
    /// the session metadata.
    pub async fn resolve(&self, session: &AuthSession) -> UserIdentity {
        match self.lookup(session).await {
            Ok(identity) => identity,
            Err(e) => {
                warn!(
                    user_id = %session.user_id,
                    error = %e,
                    "Profile lookup failed, using session metadata"
                );
                UserIdentity::from_session(session)
            }
        }
    }

    async fn lookup(&self, session: &AuthSession) -> BrandConnectResult<UserIdentity> {
        let base = UserIdentity::from_session(session);
        if session.metadata_str("role") == Some("admin") {
            return Ok(base);
        }

        let client_query = TableQuery::new(CLIENT_PROFILES)
            .with_filter(TableFilter::eq("id", session.user_id.as_str()));
        if let Some(profile) = self.query.query(&client_query).await?.into_iter().next() {
            debug!(user_id = %session.user_id, "Found client profile");
            return Ok(UserIdentity {
                email: str_field(&profile, "email").unwrap_or(base.email),
                display_name: str_field(&profile, "full_name")
                    .unwrap_or_else(|| "User".to_string()),
                role: UserRole::Client,
                approved: true,
                verified: true,
                ..base
            });
        }

        let creative_query = TableQuery::new(CREATIVE_PROFILES)
            .with_filter(TableFilter::eq("user_id", session.user_id.as_str()));
        if let Some(profile) = self.query.query(&creative_query).await?.into_iter().next() {
            debug!(user_id = %session.user_id, "Found creative profile");
            return Ok(UserIdentity {
                display_name: str_field(&profile, "title")
                    .unwrap_or_else(|| "Creative".to_string()),
                role: UserRole::Creative,
                approved: profile.get("approval_status").and_then(|v| v.as_str())
                    == Some("approved"),
                verified: true,
                ..base
            });
        }

        debug!(user_id = %session.user_id, "No profile found, using session metadata");
        Ok(base)
    }
}

fn str_field(row: &serde_json::Value, key: &str) -> Option<String> {
    row.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
