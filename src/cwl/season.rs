use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::CwlConfig;
use crate::error::{BotError, Result};

/// A CWL season, identified by its month (e.g. "2024-05")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeasonId {
    year: i32,
    month: u32,
}

impl SeasonId {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(2012..=9999).contains(&year) {
            return Err(BotError::InvalidSeason {
                season: format!("{}-{:02}", year, month),
            });
        }
        Ok(Self { year, month })
    }

    /// The season running in the month of `now`
    pub fn current(now: DateTime<Utc>) -> Self {
        Self {
            year: now.year(),
            month: now.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Midnight UTC on `day` of this season's month
    fn at_day(&self, day: u32) -> Result<DateTime<Utc>> {
        Utc.with_ymd_and_hms(self.year, self.month, day, 0, 0, 0)
            .single()
            .ok_or_else(|| BotError::Internal {
                message: format!("no such date: {}-{:02}-{:02}", self.year, self.month, day),
            })
    }
}

impl fmt::Display for SeasonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

impl FromStr for SeasonId {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || BotError::InvalidSeason {
            season: s.to_string(),
        };

        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for SeasonId {
    type Error = BotError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SeasonId> for String {
    fn from(value: SeasonId) -> Self {
        value.to_string()
    }
}

/// When players may sign up for a season
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationWindow {
    pub opens: DateTime<Utc>,
    pub closes: DateTime<Utc>,
}

impl RegistrationWindow {
    /// Opens on the configured day of the previous month, closes the
    /// configured number of hours before the season month begins.
    pub fn for_season(season: SeasonId, config: &CwlConfig) -> Result<Self> {
        let opens = season.previous().at_day(config.registration_open_day)?;
        let closes = season.at_day(1)? - Duration::hours(config.registration_close_lead_hours);

        if closes <= opens {
            return Err(BotError::ConfigValidation {
                message: format!("registration window for {} is empty", season),
            });
        }

        Ok(Self { opens, closes })
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        now >= self.opens && now < self.closes
    }
}

/// Lifecycle of a CWL season. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonPhase {
    /// Players sign up and rosters are built
    Registration,
    /// Registration closed, rosters being finalized
    Preparation,
    /// League groups formed, wars running
    InProgress,
    /// Season summarized and roles cleaned up
    Ended,
}

impl SeasonPhase {
    pub fn next(self) -> Option<Self> {
        match self {
            SeasonPhase::Registration => Some(SeasonPhase::Preparation),
            SeasonPhase::Preparation => Some(SeasonPhase::InProgress),
            SeasonPhase::InProgress => Some(SeasonPhase::Ended),
            SeasonPhase::Ended => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeasonPhase::Registration => "registration",
            SeasonPhase::Preparation => "preparation",
            SeasonPhase::InProgress => "in_progress",
            SeasonPhase::Ended => "ended",
        }
    }
}

impl fmt::Display for SeasonPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
