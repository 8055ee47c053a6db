use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::RoleId;

use super::group::CwlGroup;
use super::league_group::LeagueGroup;
use super::roster::Roster;
use super::season::{SeasonId, SeasonPhase};
use crate::error::{BotError, Result};

/// War sizes the game offers for CWL
pub const WAR_SIZES: [usize; 2] = [15, 30];

/// A clan taking part in a CWL season with its roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeagueClan {
    pub season: SeasonId,
    pub tag: String,
    pub name: String,
    pub league_group: LeagueGroup,
    pub war_size: usize,

    /// Overrides the configured CWL role for this clan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleId>,

    pub roster: Roster,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<CwlGroup>,
}

impl LeagueClan {
    pub fn new(
        season: SeasonId,
        tag: &str,
        name: &str,
        league_group: LeagueGroup,
        war_size: usize,
        role: Option<RoleId>,
    ) -> Result<Self> {
        if !WAR_SIZES.contains(&war_size) {
            return Err(BotError::InvalidGroup {
                message: format!("war size must be 15 or 30, got {}", war_size),
            });
        }
        Ok(Self {
            season,
            tag: tag.to_string(),
            name: name.to_string(),
            league_group,
            war_size,
            role,
            roster: Roster::new(tag),
            group: None,
        })
    }
}

/// Season-level bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CwlSeasonRecord {
    pub season: SeasonId,
    pub phase: SeasonPhase,
    pub opened_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl CwlSeasonRecord {
    pub fn new(season: SeasonId, now: DateTime<Utc>) -> Self {
        Self {
            season,
            phase: SeasonPhase::Registration,
            opened_at: now,
            ended_at: None,
        }
    }

    /// Fail unless the season is in one of `allowed`
    pub fn require_phase(&self, allowed: &[SeasonPhase]) -> Result<()> {
        if allowed.contains(&self.phase) {
            return Ok(());
        }
        Err(BotError::WrongPhase {
            season: self.season.to_string(),
            phase: self.phase.to_string(),
            expected: allowed
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(" or "),
        })
    }

    /// Move to the next phase
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<SeasonPhase> {
        let next = self.phase.next().ok_or_else(|| BotError::WrongPhase {
            season: self.season.to_string(),
            phase: self.phase.to_string(),
            expected: "a phase before ended".to_string(),
        })?;
        self.phase = next;
        if next == SeasonPhase::Ended {
            self.ended_at = Some(now);
        }
        Ok(next)
    }
}
