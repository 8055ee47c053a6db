use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::collections::HashMap;
use std::sync::Arc;

use super::persist::{now_timestamp, StateFile};

/// A question and the applicant's answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationAnswer {
    pub question: String,
    pub answer: String,
}

/// A submitted clan application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClanApplication {
    pub id: String,
    pub guild_id: GuildId,
    pub applicant: UserId,

    /// Accounts the applicant wants to bring, normalized
    pub tags: Vec<String>,

    pub answers: Vec<ApplicationAnswer>,

    /// Ticket channel opened for this application, set once
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_channel: Option<ChannelId>,

    pub created_at: DateTime<Utc>,
}

/// All clan applications, never deleted automatically
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationStore {
    pub version: u32,
    pub last_updated: i64,

    /// Application ID -> application
    pub applications: HashMap<String, ClanApplication>,
}

impl Default for ApplicationStore {
    fn default() -> Self {
        Self {
            version: 1,
            last_updated: now_timestamp(),
            applications: HashMap::new(),
        }
    }
}

impl StateFile for ApplicationStore {
    const FILE_NAME: &'static str = "applications.json";

    fn touch(&mut self) {
        self.last_updated = now_timestamp();
    }
}

impl ApplicationStore {
    pub fn find_by_ticket(&self, guild_id: GuildId, channel_id: ChannelId) -> Option<&ClanApplication> {
        self.applications
            .values()
            .find(|a| a.guild_id == guild_id && a.ticket_channel == Some(channel_id))
    }

    /// Applications by `applicant` in a guild, oldest first
    pub fn for_applicant(&self, guild_id: GuildId, applicant: UserId) -> Vec<&ClanApplication> {
        let mut apps: Vec<&ClanApplication> = self
            .applications
            .values()
            .filter(|a| a.guild_id == guild_id && a.applicant == applicant)
            .collect();
        apps.sort_by_key(|a| a.created_at);
        apps
    }
}

pub type SharedApplicationStore = Arc<tokio::sync::RwLock<ApplicationStore>>;

pub fn create_shared_application_store(store: ApplicationStore) -> SharedApplicationStore {
    Arc::new(tokio::sync::RwLock::new(store))
}
