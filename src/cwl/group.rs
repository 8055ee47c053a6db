use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::league_group::LeagueGroup;
use super::registration::{registration_key, PlayerRegistration};
use super::roster::Roster;
use super::season::SeasonId;
use crate::error::{BotError, Result};
use crate::stats::{WarRecord, WarState};

/// Clans in a CWL league group
pub const GROUP_SIZE: usize = 8;

/// Pairings for a single round-robin over `n` participants (circle method).
///
/// Returns `n - 1` rounds of `n / 2` pairs. `n` must be even.
pub fn round_robin(n: usize) -> Result<Vec<Vec<(usize, usize)>>> {
    if n < 2 || n % 2 != 0 {
        return Err(BotError::InvalidGroup {
            message: format!("round robin needs an even number of clans, got {}", n),
        });
    }

    // Position 0 stays put, the rest rotate one step per round
    let mut ring: Vec<usize> = (0..n).collect();
    let mut rounds = Vec::with_capacity(n - 1);

    for _ in 0..n - 1 {
        let pairs = (0..n / 2).map(|i| (ring[i], ring[n - 1 - i])).collect();
        rounds.push(pairs);
        let last = ring.remove(n - 1);
        ring.insert(1, last);
    }

    Ok(rounds)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupClan {
    pub tag: String,
    pub name: String,
}

/// The home clan's war in one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CwlWar {
    /// 1-based round number
    pub round: u32,
    pub opponent_tag: String,
    pub state: WarState,
    pub lineup: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<WarRecord>,
}

/// A formed league group, tracked from one home clan's point of view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CwlGroup {
    pub season: SeasonId,
    pub home_clan: String,
    pub clans: Vec<GroupClan>,
    pub wars: Vec<CwlWar>,
    pub formed_at: DateTime<Utc>,
}

impl CwlGroup {
    /// Form a group of exactly eight distinct clans including the home clan
    pub fn form(
        season: SeasonId,
        home_clan: &str,
        clans: Vec<GroupClan>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if clans.len() != GROUP_SIZE {
            return Err(BotError::InvalidGroup {
                message: format!("a league group has {} clans, got {}", GROUP_SIZE, clans.len()),
            });
        }

        let distinct: HashSet<&str> = clans.iter().map(|c| c.tag.as_str()).collect();
        if distinct.len() != clans.len() {
            return Err(BotError::InvalidGroup {
                message: "a clan appears twice in the group".to_string(),
            });
        }

        let home_index = clans
            .iter()
            .position(|c| c.tag == home_clan)
            .ok_or_else(|| BotError::InvalidGroup {
                message: format!("{} is not part of the group", home_clan),
            })?;

        let mut wars = Vec::with_capacity(GROUP_SIZE - 1);
        for (i, pairs) in round_robin(clans.len())?.into_iter().enumerate() {
            let opponent = pairs.iter().find_map(|&(a, b)| {
                if a == home_index {
                    Some(b)
                } else if b == home_index {
                    Some(a)
                } else {
                    None
                }
            });
            if let Some(opponent) = opponent {
                wars.push(CwlWar {
                    round: i as u32 + 1,
                    opponent_tag: clans[opponent].tag.clone(),
                    state: WarState::Preparation,
                    lineup: Vec::new(),
                    record: None,
                });
            }
        }

        Ok(Self {
            season,
            home_clan: home_clan.to_string(),
            clans,
            wars,
            formed_at: now,
        })
    }

    pub fn war(&self, round: u32) -> Result<&CwlWar> {
        self.wars
            .iter()
            .find(|w| w.round == round)
            .ok_or_else(|| BotError::NotFound {
                kind: "CWL round",
                id: round.to_string(),
            })
    }

    pub fn war_mut(&mut self, round: u32) -> Result<&mut CwlWar> {
        self.wars
            .iter_mut()
            .find(|w| w.round == round)
            .ok_or_else(|| BotError::NotFound {
                kind: "CWL round",
                id: round.to_string(),
            })
    }

    /// Store the fetched result of a round's war
    pub fn record_war(&mut self, round: u32, record: WarRecord) -> Result<()> {
        let home = self.home_clan.clone();
        let war = self.war_mut(round)?;

        let record = record
            .from_perspective(&home)
            .ok_or_else(|| BotError::InvalidGroup {
                message: format!("war in round {} does not involve {}", round, home),
            })?;
        if record.opponent.tag != war.opponent_tag {
            return Err(BotError::InvalidGroup {
                message: format!(
                    "round {} is against {}, not {}",
                    round, war.opponent_tag, record.opponent.tag
                ),
            });
        }

        war.state = record.state;
        war.record = Some(record);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.wars.iter().all(|w| w.state == WarState::Ended)
    }

    /// Results recorded so far
    pub fn records(&self) -> Vec<WarRecord> {
        self.wars.iter().filter_map(|w| w.record.clone()).collect()
    }
}

/// Check a war lineup against the roster and registrations.
///
/// Every account must be rostered in this clan, actively registered for the
/// season, and registered for `clan_group` or a stricter group.
pub fn validate_lineup(
    lineup: &[String],
    war_size: usize,
    roster: &Roster,
    registrations: &HashMap<String, PlayerRegistration>,
    season: SeasonId,
    clan_group: LeagueGroup,
) -> Result<()> {
    if lineup.is_empty() {
        return Err(BotError::InvalidLineup {
            message: "lineup is empty".to_string(),
        });
    }
    if lineup.len() > war_size {
        return Err(BotError::InvalidLineup {
            message: format!("{} accounts exceed the war size of {}", lineup.len(), war_size),
        });
    }

    let mut seen = HashSet::new();
    for tag in lineup {
        if !seen.insert(tag.as_str()) {
            return Err(BotError::InvalidLineup {
                message: format!("{} appears twice", tag),
            });
        }
        if !roster.contains(tag) {
            return Err(BotError::InvalidLineup {
                message: format!("{} is not on the {} roster", tag, roster.clan_tag),
            });
        }

        let registration = registrations
            .get(&registration_key(season, tag))
            .filter(|r| r.is_active())
            .ok_or_else(|| BotError::NotRegistered {
                season: season.to_string(),
                tag: tag.clone(),
            })?;

        if !registration.league_group.can_play_in(clan_group) {
            return Err(BotError::IneligibleGroup {
                tag: tag.clone(),
                player_group: registration.league_group.to_string(),
                clan_group: clan_group.to_string(),
            });
        }
    }

    Ok(())
}
