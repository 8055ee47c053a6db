use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BotError;

/// Registration tier a player signs up for, and the tier a league clan plays in.
///
/// `A` is the strictest tier (highest leagues, full commitment), `D` the
/// loosest. A player may be placed in their own tier or any looser one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LeagueGroup {
    A,
    B,
    C,
    D,
}

impl LeagueGroup {
    pub const ALL: [LeagueGroup; 4] = [LeagueGroup::A, LeagueGroup::B, LeagueGroup::C, LeagueGroup::D];

    /// 1 is strictest
    pub fn strictness(self) -> u8 {
        match self {
            LeagueGroup::A => 1,
            LeagueGroup::B => 2,
            LeagueGroup::C => 3,
            LeagueGroup::D => 4,
        }
    }

    /// Whether a player registered for `self` may appear in a lineup of `lineup_group`
    pub fn can_play_in(self, lineup_group: LeagueGroup) -> bool {
        lineup_group.strictness() >= self.strictness()
    }

    pub fn description(self) -> &'static str {
        match self {
            LeagueGroup::A => "Master League and above, every attack used",
            LeagueGroup::B => "Crystal League and above, every attack used",
            LeagueGroup::C => "Gold League and above",
            LeagueGroup::D => "Casual, any league",
        }
    }
}

impl fmt::Display for LeagueGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LeagueGroup::A => "A",
            LeagueGroup::B => "B",
            LeagueGroup::C => "C",
            LeagueGroup::D => "D",
        };
        f.write_str(label)
    }
}

impl FromStr for LeagueGroup {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().trim_start_matches("Group ").trim();
        match label.to_ascii_uppercase().as_str() {
            "A" => Ok(LeagueGroup::A),
            "B" => Ok(LeagueGroup::B),
            "C" => Ok(LeagueGroup::C),
            "D" => Ok(LeagueGroup::D),
            _ => Err(BotError::InvalidGroup {
                message: format!("unknown league group '{}'", s),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_b_player_eligibility() {
        let player = LeagueGroup::B;
        assert!(!player.can_play_in(LeagueGroup::A));
        assert!(player.can_play_in(LeagueGroup::B));
        assert!(player.can_play_in(LeagueGroup::C));
        assert!(player.can_play_in(LeagueGroup::D));
    }

    #[test]
    fn test_group_a_player_plays_anywhere() {
        for group in LeagueGroup::ALL {
            assert!(LeagueGroup::A.can_play_in(group));
        }
        assert!(!LeagueGroup::D.can_play_in(LeagueGroup::C));
    }

    #[test]
    fn test_parse() {
        assert_eq!("b".parse::<LeagueGroup>().unwrap(), LeagueGroup::B);
        assert_eq!("Group C".parse::<LeagueGroup>().unwrap(), LeagueGroup::C);
        assert!("E".parse::<LeagueGroup>().is_err());
    }
}
