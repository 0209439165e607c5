//! Marketplace record types and their synchronization presets

use super::types::{deserialize_id, Record, SyncOptions};
use brandconnect_core::TableFilter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const BOOKINGS: &str = "bookings";
pub const MESSAGES: &str = "messages";
pub const NOTIFICATIONS: &str = "notifications";

const BOOKING_PROJECTION: &str =
    "*, client:client_profiles(*), creative:creative_profiles(*), service:services(*)";
const MESSAGE_PROJECTION: &str = "*, sender:users(*)";

/// A booking between a client and a creative. Joined profiles and any other
/// columns land in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub creative_id: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub read: bool,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Record for Booking {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Message {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Notification {
    fn id(&self) -> &str {
        &self.id
    }
}

impl SyncOptions {
    /// Bookings with joined parties and service. Scoped to one client when
    /// `client_id` is given.
    pub fn bookings(client_id: Option<&str>) -> Self {
        let options = Self::new(BOOKINGS).with_projection(BOOKING_PROJECTION);
        match client_id {
            Some(id) => options.with_filter(TableFilter::eq("client_id", id)),
            None => options,
        }
    }

    pub fn messages(conversation_id: &str) -> Self {
        Self::new(MESSAGES)
            .with_filter(TableFilter::eq("conversation_id", conversation_id))
            .with_projection(MESSAGE_PROJECTION)
    }

    pub fn notifications(user_id: &str) -> Self {
        Self::new(NOTIFICATIONS).with_filter(TableFilter::eq("user_id", user_id))
    }
}
