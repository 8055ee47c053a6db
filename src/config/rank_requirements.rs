use serde::{Deserialize, Serialize};

/// What a member must reach before being suggested for the next rank
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankRequirement {
    /// Days since joining the clan
    pub min_tenure_days: i64,

    /// War stars earned while a member
    pub min_war_stars: u32,

    /// Troops donated this season
    pub min_donations: u32,
}

/// Requirements for the ranks that can be reached automatically
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RankRequirements {
    pub elder: RankRequirement,
    pub co_leader: RankRequirement,
}

impl Default for RankRequirements {
    fn default() -> Self {
        Self {
            elder: RankRequirement {
                min_tenure_days: 14,
                min_war_stars: 20,
                min_donations: 500,
            },
            co_leader: RankRequirement {
                min_tenure_days: 90,
                min_war_stars: 150,
                min_donations: 2000,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rank_requirements() {
        let json = r#"{
            "elder": { "min_tenure_days": 7, "min_war_stars": 10, "min_donations": 100 }
        }"#;

        let ranks: RankRequirements = serde_json::from_str(json).unwrap();
        assert_eq!(ranks.elder.min_tenure_days, 7);
        assert_eq!(ranks.co_leader, RankRequirements::default().co_leader);
    }
}
