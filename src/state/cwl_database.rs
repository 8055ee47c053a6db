use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;
use std::collections::HashMap;
use std::sync::Arc;

use super::persist::{now_timestamp, StateFile};
use crate::cwl::{registration_key, CwlSeasonRecord, LeagueClan, PlayerRegistration, SeasonId};
use crate::error::{BotError, Result};

/// Registrations, league clans and seasons for CWL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CwlDatabase {
    /// Schema version for migrations
    pub version: u32,

    /// Last update timestamp
    pub last_updated: i64,

    /// Season ID -> season record
    pub seasons: HashMap<String, CwlSeasonRecord>,

    /// "season|tag" -> registration
    pub registrations: HashMap<String, PlayerRegistration>,

    /// "season|clan tag" -> league clan
    pub clans: HashMap<String, LeagueClan>,
}

impl Default for CwlDatabase {
    fn default() -> Self {
        Self {
            version: 1,
            last_updated: now_timestamp(),
            seasons: HashMap::new(),
            registrations: HashMap::new(),
            clans: HashMap::new(),
        }
    }
}

impl StateFile for CwlDatabase {
    const FILE_NAME: &'static str = "cwl.json";

    fn touch(&mut self) {
        self.last_updated = now_timestamp();
    }
}

impl CwlDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn season(&self, season: SeasonId) -> Result<&CwlSeasonRecord> {
        self.seasons
            .get(&season.to_string())
            .ok_or_else(|| BotError::NotFound {
                kind: "CWL season",
                id: season.to_string(),
            })
    }

    pub fn season_mut(&mut self, season: SeasonId) -> Result<&mut CwlSeasonRecord> {
        self.seasons
            .get_mut(&season.to_string())
            .ok_or_else(|| BotError::NotFound {
                kind: "CWL season",
                id: season.to_string(),
            })
    }

    pub fn registration(&self, season: SeasonId, tag: &str) -> Option<&PlayerRegistration> {
        self.registrations.get(&registration_key(season, tag))
    }

    pub fn registration_mut(&mut self, season: SeasonId, tag: &str) -> Option<&mut PlayerRegistration> {
        self.registrations.get_mut(&registration_key(season, tag))
    }

    /// Active registrations of a season
    pub fn registrations_for(&self, season: SeasonId) -> Vec<&PlayerRegistration> {
        let mut regs: Vec<&PlayerRegistration> = self
            .registrations
            .values()
            .filter(|r| r.season == season && r.is_active())
            .collect();
        regs.sort_by(|a, b| a.tag.cmp(&b.tag));
        regs
    }

    /// Active registrations of one Discord user in a season
    pub fn registrations_of(&self, season: SeasonId, user: UserId) -> Vec<&PlayerRegistration> {
        self.registrations_for(season)
            .into_iter()
            .filter(|r| r.discord_user == user)
            .collect()
    }

    pub fn clan(&self, season: SeasonId, tag: &str) -> Result<&LeagueClan> {
        self.clans
            .get(&registration_key(season, tag))
            .ok_or_else(|| BotError::NotFound {
                kind: "League clan",
                id: format!("{} in {}", tag, season),
            })
    }

    pub fn clan_mut(&mut self, season: SeasonId, tag: &str) -> Result<&mut LeagueClan> {
        self.clans
            .get_mut(&registration_key(season, tag))
            .ok_or_else(|| BotError::NotFound {
                kind: "League clan",
                id: format!("{} in {}", tag, season),
            })
    }

    pub fn clans_for(&self, season: SeasonId) -> Vec<&LeagueClan> {
        let mut clans: Vec<&LeagueClan> = self.clans.values().filter(|c| c.season == season).collect();
        clans.sort_by(|a, b| a.tag.cmp(&b.tag));
        clans
    }

    /// Whether `user` has an account in any finalized roster of the season other than `except_clan`
    pub fn user_in_other_finalized_roster(&self, season: SeasonId, user: UserId, except_clan: &str) -> bool {
        self.clans_for(season)
            .iter()
            .filter(|c| c.tag != except_clan)
            .any(|c| c.roster.is_finalized() && c.roster.has_user(user))
    }
}

/// Shared CWL database type
pub type SharedCwlDatabase = Arc<tokio::sync::RwLock<CwlDatabase>>;

pub fn create_shared_cwl_database(db: CwlDatabase) -> SharedCwlDatabase {
    Arc::new(tokio::sync::RwLock::new(db))
}
