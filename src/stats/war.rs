use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarState {
    Preparation,
    InWar,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarType {
    Regular,
    Friendly,
    Cwl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarResult {
    Win,
    Loss,
    Tie,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarAttack {
    pub attacker_tag: String,
    pub defender_tag: String,
    pub attacker_town_hall: u8,
    pub defender_town_hall: u8,
    pub stars: u8,
    pub destruction: f64,
    /// Position of this attack in the war, starting at 1
    pub order: u32,
}

impl WarAttack {
    pub fn is_triple(&self) -> bool {
        self.stars == 3
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarMember {
    pub tag: String,
    pub name: String,
    pub town_hall: u8,
    pub map_position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarSide {
    pub tag: String,
    pub name: String,
    pub stars: u32,
    pub destruction: f64,
    pub members: Vec<WarMember>,
    /// Attacks made by this side
    pub attacks: Vec<WarAttack>,
}

/// A war as fetched from the game, already decoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarRecord {
    pub war_type: WarType,
    pub state: WarState,
    pub team_size: u32,
    pub attacks_per_member: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub clan: WarSide,
    pub opponent: WarSide,
}

impl WarRecord {
    /// Outcome for `clan`. Stars decide, destruction breaks ties.
    pub fn result(&self) -> Option<WarResult> {
        if self.state != WarState::Ended {
            return None;
        }
        let result = match self.clan.stars.cmp(&self.opponent.stars) {
            std::cmp::Ordering::Greater => WarResult::Win,
            std::cmp::Ordering::Less => WarResult::Loss,
            std::cmp::Ordering::Equal => {
                if self.clan.destruction > self.opponent.destruction {
                    WarResult::Win
                } else if self.clan.destruction < self.opponent.destruction {
                    WarResult::Loss
                } else {
                    WarResult::Tie
                }
            }
        };
        Some(result)
    }

    /// The same war seen from `clan_tag`, or None if that clan did not fight in it
    pub fn from_perspective(&self, clan_tag: &str) -> Option<WarRecord> {
        if self.clan.tag == clan_tag {
            Some(self.clone())
        } else if self.opponent.tag == clan_tag {
            let mut flipped = self.clone();
            std::mem::swap(&mut flipped.clan, &mut flipped.opponent);
            Some(flipped)
        } else {
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn member(tag: &str, town_hall: u8, position: u32) -> WarMember {
        WarMember {
            tag: tag.to_string(),
            name: format!("Player {}", tag),
            town_hall,
            map_position: position,
        }
    }

    pub fn attack(attacker: &str, defender: &str, stars: u8, destruction: f64, order: u32) -> WarAttack {
        WarAttack {
            attacker_tag: attacker.to_string(),
            defender_tag: defender.to_string(),
            attacker_town_hall: 14,
            defender_town_hall: 14,
            stars,
            destruction,
            order,
        }
    }

    pub fn side(tag: &str, stars: u32, destruction: f64, members: Vec<WarMember>, attacks: Vec<WarAttack>) -> WarSide {
        WarSide {
            tag: tag.to_string(),
            name: format!("Clan {}", tag),
            stars,
            destruction,
            members,
            attacks,
        }
    }

    pub fn war(state: WarState, clan: WarSide, opponent: WarSide) -> WarRecord {
        let start = Utc::now();
        WarRecord {
            war_type: WarType::Cwl,
            state,
            team_size: clan.members.len() as u32,
            attacks_per_member: 1,
            start_time: start,
            end_time: start + chrono::Duration::hours(24),
            clan,
            opponent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_result_by_stars_then_destruction() {
        let w = war(WarState::Ended, side("#A", 30, 90.0, vec![], vec![]), side("#B", 28, 95.0, vec![], vec![]));
        assert_eq!(w.result(), Some(WarResult::Win));

        let w = war(WarState::Ended, side("#A", 30, 90.0, vec![], vec![]), side("#B", 30, 95.0, vec![], vec![]));
        assert_eq!(w.result(), Some(WarResult::Loss));

        let w = war(WarState::Ended, side("#A", 30, 95.0, vec![], vec![]), side("#B", 30, 95.0, vec![], vec![]));
        assert_eq!(w.result(), Some(WarResult::Tie));

        let w = war(WarState::InWar, side("#A", 30, 95.0, vec![], vec![]), side("#B", 3, 5.0, vec![], vec![]));
        assert_eq!(w.result(), None);
    }

    #[test]
    fn test_from_perspective_swaps_sides() {
        let w = war(WarState::Ended, side("#A", 30, 90.0, vec![], vec![]), side("#B", 28, 95.0, vec![], vec![]));
        let flipped = w.from_perspective("#B").unwrap();
        assert_eq!(flipped.clan.tag, "#B");
        assert_eq!(flipped.result(), Some(WarResult::Loss));
        assert!(w.from_perspective("#C").is_none());
    }
}
