use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::{GuildId, RoleId, UserId};
use std::collections::HashMap;
use std::sync::Arc;

use super::persist::{now_timestamp, StateFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    General,
    /// One account per user, optional Town Hall floor
    Tournament,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub guild_id: GuildId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: EventKind,

    pub registration_opens: DateTime<Utc>,
    pub registration_closes: DateTime<Utc>,
    pub starts_at: DateTime<Utc>,

    /// Maximum entries, unlimited when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prize_pool: Option<String>,

    /// Role given to everyone with at least one entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleId>,

    pub tags_per_user: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_town_hall: Option<u8>,

    /// Closed by staff; no more sign-ups or withdrawals
    #[serde(default)]
    pub closed: bool,

    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn registration_open(&self, now: DateTime<Utc>) -> bool {
        !self.closed && now >= self.registration_opens && now < self.registration_closes
    }
}

/// One account entered into an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub event_id: String,
    pub discord_user: UserId,
    pub tag: String,
    pub town_hall: u8,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn participant_key(event_id: &str, user: UserId, tag: &str) -> String {
    format!("{}|{}|{}", event_id, user, tag)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStore {
    pub version: u32,
    pub last_updated: i64,

    /// Event ID -> event
    pub events: HashMap<String, Event>,

    /// "event|user|tag" -> participant
    pub participants: HashMap<String, Participant>,
}

impl Default for EventStore {
    fn default() -> Self {
        Self {
            version: 1,
            last_updated: now_timestamp(),
            events: HashMap::new(),
            participants: HashMap::new(),
        }
    }
}

impl StateFile for EventStore {
    const FILE_NAME: &'static str = "events.json";

    fn touch(&mut self) {
        self.last_updated = now_timestamp();
    }
}

impl EventStore {
    /// Entries of an event, oldest first
    pub fn participants_of(&self, event_id: &str) -> Vec<&Participant> {
        let mut entries: Vec<&Participant> = self
            .participants
            .values()
            .filter(|p| p.event_id == event_id)
            .collect();
        entries.sort_by(|a, b| a.registered_at.cmp(&b.registered_at).then_with(|| a.tag.cmp(&b.tag)));
        entries
    }

    pub fn entries_of_user(&self, event_id: &str, user: UserId) -> usize {
        self.participants
            .values()
            .filter(|p| p.event_id == event_id && p.discord_user == user)
            .count()
    }
}

pub type SharedEventStore = Arc<tokio::sync::RwLock<EventStore>>;

pub fn create_shared_event_store(store: EventStore) -> SharedEventStore {
    Arc::new(tokio::sync::RwLock::new(store))
}
