//! Capital raid weekend totals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaidState {
    Ongoing,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaidMember {
    pub tag: String,
    pub name: String,
    pub attacks: u32,
    pub attack_limit: u32,
    pub bonus_attack_limit: u32,
    pub capital_resources_looted: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaidWeekend {
    pub state: RaidState,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capital_total_loot: u64,
    pub raids_completed: u32,
    pub total_attacks: u32,
    pub enemy_districts_destroyed: u32,
    pub offensive_reward: u32,
    pub defensive_reward: u32,
    pub members: Vec<RaidMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerRaidSummary {
    pub tag: String,
    pub name: String,
    pub weekends: u32,
    pub attacks: u32,
    pub attack_limit: u32,
    pub capital_gold_looted: u64,
}

impl PlayerRaidSummary {
    pub fn loot_per_attack(&self) -> f64 {
        if self.attacks == 0 {
            0.0
        } else {
            self.capital_gold_looted as f64 / self.attacks as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaidSummary {
    pub weekends: u32,
    pub raids_completed: u32,
    pub total_attacks: u32,
    pub districts_destroyed: u32,
    pub capital_gold_looted: u64,
    pub offensive_reward: u64,
    pub defensive_reward: u64,
    /// Sorted by capital gold looted, descending
    pub players: Vec<PlayerRaidSummary>,
}

impl RaidSummary {
    /// Rewards are only final once a weekend has ended, so ongoing weekends
    /// contribute loot and attacks but no medals.
    pub fn from_weekends(weekends: &[RaidWeekend]) -> Self {
        let mut summary = RaidSummary {
            weekends: weekends.len() as u32,
            raids_completed: 0,
            total_attacks: 0,
            districts_destroyed: 0,
            capital_gold_looted: 0,
            offensive_reward: 0,
            defensive_reward: 0,
            players: Vec::new(),
        };
        let mut players: HashMap<String, PlayerRaidSummary> = HashMap::new();

        for weekend in weekends {
            summary.raids_completed += weekend.raids_completed;
            summary.total_attacks += weekend.total_attacks;
            summary.districts_destroyed += weekend.enemy_districts_destroyed;
            summary.capital_gold_looted += weekend.capital_total_loot;

            if weekend.state == RaidState::Ended {
                summary.offensive_reward += weekend.offensive_reward as u64;
                summary.defensive_reward += weekend.defensive_reward as u64;
            }

            for member in &weekend.members {
                let player = players
                    .entry(member.tag.clone())
                    .or_insert_with(|| PlayerRaidSummary {
                        tag: member.tag.clone(),
                        name: member.name.clone(),
                        weekends: 0,
                        attacks: 0,
                        attack_limit: 0,
                        capital_gold_looted: 0,
                    });
                player.name = member.name.clone();
                player.weekends += 1;
                player.attacks += member.attacks;
                player.attack_limit += member.attack_limit + member.bonus_attack_limit;
                player.capital_gold_looted += member.capital_resources_looted;
            }
        }

        summary.players = players.into_values().collect();
        summary.players.sort_by(|a, b| {
            b.capital_gold_looted
                .cmp(&a.capital_gold_looted)
                .then_with(|| a.tag.cmp(&b.tag))
        });
        summary
    }

    pub fn average_loot_per_weekend(&self) -> f64 {
        if self.weekends == 0 {
            0.0
        } else {
            self.capital_gold_looted as f64 / self.weekends as f64
        }
    }
}
