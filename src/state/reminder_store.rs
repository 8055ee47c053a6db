use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::collections::HashMap;
use std::sync::Arc;

use super::persist::{now_timestamp, StateFile};

/// A recruiting announcement re-posted on an interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecruitingReminder {
    pub id: String,
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub clan_tag: String,
    pub clan_name: String,
    pub body: String,
    pub interval_minutes: i64,

    /// The message currently representing this reminder in the channel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_message: Option<MessageId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_posted_at: Option<DateTime<Utc>>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl RecruitingReminder {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        match self.last_posted_at {
            None => true,
            Some(last) => now >= last + Duration::minutes(self.interval_minutes),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderStore {
    pub version: u32,
    pub last_updated: i64,

    /// Reminder ID -> reminder
    pub reminders: HashMap<String, RecruitingReminder>,
}

impl Default for ReminderStore {
    fn default() -> Self {
        Self {
            version: 1,
            last_updated: now_timestamp(),
            reminders: HashMap::new(),
        }
    }
}

impl StateFile for ReminderStore {
    const FILE_NAME: &'static str = "reminders.json";

    fn touch(&mut self) {
        self.last_updated = now_timestamp();
    }
}

pub type SharedReminderStore = Arc<tokio::sync::RwLock<ReminderStore>>;

pub fn create_shared_reminder_store(store: ReminderStore) -> SharedReminderStore {
    Arc::new(tokio::sync::RwLock::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_after_interval() {
        let now = Utc::now();
        let mut reminder = RecruitingReminder {
            id: "r1".to_string(),
            guild_id: GuildId::new(1),
            channel_id: ChannelId::new(2),
            clan_tag: "#2PP".to_string(),
            clan_name: "Owls".to_string(),
            body: "Recruiting".to_string(),
            interval_minutes: 60,
            active_message: None,
            last_posted_at: None,
            enabled: true,
        };
        assert!(reminder.is_due(now));

        reminder.last_posted_at = Some(now - Duration::minutes(59));
        assert!(!reminder.is_due(now));
        assert!(reminder.is_due(now + Duration::minutes(1)));

        reminder.enabled = false;
        assert!(!reminder.is_due(now + Duration::days(1)));
    }
}
