use serde::{Deserialize, Serialize};
use serenity::model::id::{GuildId, RoleId};

use super::rank_requirements::RankRequirements;
use crate::error::{BotError, Result};

/// Bot configuration, loaded from data/config.json
///
/// Every section falls back to its defaults when omitted.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BotConfig {
    /// Guild the bot manages
    pub guild_id: Option<GuildId>,

    pub roster: RosterLimits,
    pub cwl: CwlConfig,
    pub applications: ApplicationConfig,
    pub events: EventConfig,
    pub reminders: ReminderConfig,
    pub ranks: RankRequirements,
    pub shop: ShopConfig,
}

/// Bounds on the number of accounts in a CWL roster
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RosterLimits {
    pub min: usize,
    pub max: usize,
}

impl Default for RosterLimits {
    fn default() -> Self {
        Self { min: 15, max: 35 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CwlConfig {
    /// Day of the previous month on which registration opens (00:00 UTC)
    pub registration_open_day: u32,

    /// Registration closes this many hours before the season month starts
    pub registration_close_lead_hours: i64,

    /// Role given to every account in a finalized roster
    pub cwl_role: Option<RoleId>,
}

impl Default for CwlConfig {
    fn default() -> Self {
        Self {
            registration_open_day: 11,
            registration_close_lead_hours: 24,
            cwl_role: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Maximum accounts a single application may list
    pub max_tags: usize,

    /// Questions asked in the application form
    pub questions: Vec<String>,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            max_tags: 5,
            questions: vec![
                "Why do you want to join?".to_string(),
                "Which timezone are you in?".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Accounts per user for general events unless the event overrides it
    pub default_tags_per_user: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            default_tags_per_user: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// How often the scheduler checks for due reminders
    pub tick_seconds: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self { tick_seconds: 60 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ShopConfig {
    /// Balance credited when a user first touches the vault
    pub starting_balance: u64,
}

impl BotConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config at {}, using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(BotError::ConfigLoad {
                    path: path.to_string(),
                    source: e,
                })
            }
        };

        let config: Self = serde_json::from_str(&content).map_err(|e| BotError::ConfigParse {
            path: path.to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the bot misbehave
    pub fn validate(&self) -> Result<()> {
        if self.roster.min == 0 || self.roster.min > self.roster.max {
            return Err(BotError::ConfigValidation {
                message: format!(
                    "roster.min ({}) must be between 1 and roster.max ({})",
                    self.roster.min, self.roster.max
                ),
            });
        }

        if !(1..=28).contains(&self.cwl.registration_open_day) {
            return Err(BotError::ConfigValidation {
                message: format!(
                    "cwl.registration_open_day must be 1..=28, got {}",
                    self.cwl.registration_open_day
                ),
            });
        }

        if self.cwl.registration_close_lead_hours < 0 {
            return Err(BotError::ConfigValidation {
                message: "cwl.registration_close_lead_hours cannot be negative".to_string(),
            });
        }

        if self.applications.max_tags == 0 {
            return Err(BotError::ConfigValidation {
                message: "applications.max_tags must be at least 1".to_string(),
            });
        }

        if self.events.default_tags_per_user == 0 {
            return Err(BotError::ConfigValidation {
                message: "events.default_tags_per_user must be at least 1".to_string(),
            });
        }

        if self.reminders.tick_seconds == 0 {
            return Err(BotError::ConfigValidation {
                message: "reminders.tick_seconds must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: BotConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.roster, RosterLimits { min: 15, max: 35 });
        assert_eq!(config.cwl.registration_open_day, 11);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section() {
        let json = r#"{
            "guild_id": "123456789012345678",
            "roster": { "max": 30 },
            "cwl": { "cwl_role": "223456789012345678" }
        }"#;

        let config: BotConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.roster.min, 15);
        assert_eq!(config.roster.max, 30);
        assert!(config.cwl.cwl_role.is_some());
        assert_eq!(config.guild_id, Some(GuildId::new(123456789012345678)));
    }

    #[test]
    fn test_validate_rejects_inverted_roster_limits() {
        let mut config = BotConfig::default();
        config.roster = RosterLimits { min: 20, max: 10 };
        assert!(matches!(
            config.validate(),
            Err(BotError::ConfigValidation { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = BotConfig::load_from_file("/nonexistent/steward/config.json").unwrap();
        assert_eq!(config.applications.max_tags, 5);
    }
}
