//! Aggregate statistics over a clan's wars.

use serde::Serialize;
use std::collections::HashMap;

use super::war::{WarRecord, WarResult, WarState};

/// One player's totals across the summarized wars
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerWarSummary {
    pub tag: String,
    pub name: String,
    /// Town Hall in the most recent war the player took part in
    pub town_hall: u8,
    pub wars: u32,
    pub attacks: u32,
    pub stars: u32,
    pub triples: u32,
    pub missed_attacks: u32,
    total_destruction: f64,
}

impl PlayerWarSummary {
    pub fn average_destruction(&self) -> f64 {
        if self.attacks == 0 {
            0.0
        } else {
            self.total_destruction / self.attacks as f64
        }
    }

    pub fn average_stars(&self) -> f64 {
        if self.attacks == 0 {
            0.0
        } else {
            self.stars as f64 / self.attacks as f64
        }
    }
}

/// Triple rate for attacks of one Town Hall level against another
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitRate {
    pub attacker_town_hall: u8,
    pub defender_town_hall: u8,
    pub attacks: u32,
    pub triples: u32,
}

impl HitRate {
    pub fn label(&self) -> String {
        format!("{}v{}", self.attacker_town_hall, self.defender_town_hall)
    }

    pub fn rate(&self) -> f64 {
        if self.attacks == 0 {
            0.0
        } else {
            self.triples as f64 / self.attacks as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClanWarSummary {
    pub clan_tag: String,
    /// Wars the clan has started fighting (preparation day excluded)
    pub wars: u32,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub stars: u32,
    pub attacks_used: u32,
    pub attacks_available: u32,
    pub triples: u32,
    pub missed_attacks: u32,
    pub average_destruction: f64,
    /// Sorted by stars, then average destruction, descending
    pub players: Vec<PlayerWarSummary>,
    /// Sorted by attacker then defender Town Hall, descending
    pub hit_rates: Vec<HitRate>,
}

impl ClanWarSummary {
    /// Summarize `wars` from the point of view of `clan_tag`.
    ///
    /// Wars the clan did not take part in and wars still in preparation are
    /// skipped. Missed attacks are only counted once a war has ended.
    pub fn from_wars(clan_tag: &str, wars: &[WarRecord]) -> Self {
        let mut summary = ClanWarSummary {
            clan_tag: clan_tag.to_string(),
            wars: 0,
            wins: 0,
            losses: 0,
            ties: 0,
            stars: 0,
            attacks_used: 0,
            attacks_available: 0,
            triples: 0,
            missed_attacks: 0,
            average_destruction: 0.0,
            players: Vec::new(),
            hit_rates: Vec::new(),
        };

        let mut players: HashMap<String, PlayerWarSummary> = HashMap::new();
        let mut hit_rates: HashMap<(u8, u8), HitRate> = HashMap::new();
        let mut destruction_total = 0.0;

        let mut relevant: Vec<WarRecord> = wars
            .iter()
            .filter_map(|w| w.from_perspective(clan_tag))
            .filter(|w| w.state != WarState::Preparation)
            .collect();
        relevant.sort_by_key(|w| w.start_time);

        for war in &relevant {
            summary.wars += 1;
            summary.stars += war.clan.stars;
            destruction_total += war.clan.destruction;

            match war.result() {
                Some(WarResult::Win) => summary.wins += 1,
                Some(WarResult::Loss) => summary.losses += 1,
                Some(WarResult::Tie) => summary.ties += 1,
                None => {}
            }

            let available = war.clan.members.len() as u32 * war.attacks_per_member;
            summary.attacks_used += war.clan.attacks.len() as u32;
            summary.attacks_available += available;

            for member in &war.clan.members {
                let player = players
                    .entry(member.tag.clone())
                    .or_insert_with(|| PlayerWarSummary {
                        tag: member.tag.clone(),
                        name: member.name.clone(),
                        town_hall: member.town_hall,
                        wars: 0,
                        attacks: 0,
                        stars: 0,
                        triples: 0,
                        missed_attacks: 0,
                        total_destruction: 0.0,
                    });
                player.wars += 1;
                player.name = member.name.clone();
                player.town_hall = member.town_hall;

                let made = war
                    .clan
                    .attacks
                    .iter()
                    .filter(|a| a.attacker_tag == member.tag)
                    .count() as u32;
                if war.state == WarState::Ended {
                    let missed = war.attacks_per_member.saturating_sub(made);
                    player.missed_attacks += missed;
                    summary.missed_attacks += missed;
                }
            }

            for attack in &war.clan.attacks {
                if attack.is_triple() {
                    summary.triples += 1;
                }

                if let Some(player) = players.get_mut(&attack.attacker_tag) {
                    player.attacks += 1;
                    player.stars += attack.stars as u32;
                    player.total_destruction += attack.destruction;
                    if attack.is_triple() {
                        player.triples += 1;
                    }
                }

                let rate = hit_rates
                    .entry((attack.attacker_town_hall, attack.defender_town_hall))
                    .or_insert_with(|| HitRate {
                        attacker_town_hall: attack.attacker_town_hall,
                        defender_town_hall: attack.defender_town_hall,
                        attacks: 0,
                        triples: 0,
                    });
                rate.attacks += 1;
                if attack.is_triple() {
                    rate.triples += 1;
                }
            }
        }

        if summary.wars > 0 {
            summary.average_destruction = destruction_total / summary.wars as f64;
        }

        summary.players = players.into_values().collect();
        summary.players.sort_by(|a, b| {
            b.stars
                .cmp(&a.stars)
                .then_with(|| b.average_destruction().total_cmp(&a.average_destruction()))
                .then_with(|| a.tag.cmp(&b.tag))
        });

        summary.hit_rates = hit_rates.into_values().collect();
        summary.hit_rates.sort_by(|a, b| {
            b.attacker_town_hall
                .cmp(&a.attacker_town_hall)
                .then_with(|| b.defender_town_hall.cmp(&a.defender_town_hall))
        });

        summary
    }

    pub fn player(&self, tag: &str) -> Option<&PlayerWarSummary> {
        self.players.iter().find(|p| p.tag == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::super::war::fixtures::*;
    use super::*;

    fn two_wars() -> Vec<WarRecord> {
        let members = vec![member("#P1", 14, 1), member("#P2", 13, 2)];

        let won = war(
            WarState::Ended,
            side(
                "#HOME",
                5,
                83.0,
                members.clone(),
                vec![attack("#P1", "#E1", 3, 100.0, 1), attack("#P2", "#E2", 2, 66.0, 2)],
            ),
            side("#AWAY", 3, 70.0, vec![], vec![]),
        );

        // Home clan recorded as the opponent side here
        let mut lost = war(
            WarState::Ended,
            side("#OTHER", 6, 100.0, vec![], vec![]),
            side(
                "#HOME",
                2,
                45.0,
                members,
                vec![attack("#P1", "#E1", 2, 90.0, 1)],
            ),
        );
        lost.start_time += chrono::Duration::days(1);

        vec![won, lost]
    }

    #[test]
    fn test_counts_results_and_totals() {
        let summary = ClanWarSummary::from_wars("#HOME", &two_wars());
        assert_eq!(summary.wars, 2);
        assert_eq!((summary.wins, summary.losses, summary.ties), (1, 1, 0));
        assert_eq!(summary.stars, 7);
        assert_eq!(summary.attacks_used, 3);
        assert_eq!(summary.attacks_available, 4);
        assert_eq!(summary.missed_attacks, 1);
        assert_eq!(summary.triples, 1);
        assert!((summary.average_destruction - 64.0).abs() < 1e-9);
    }

    #[test]
    fn test_player_summaries() {
        let summary = ClanWarSummary::from_wars("#HOME", &two_wars());
        let p1 = summary.player("#P1").unwrap();
        assert_eq!(p1.wars, 2);
        assert_eq!(p1.attacks, 2);
        assert_eq!(p1.stars, 5);
        assert_eq!(p1.triples, 1);
        assert!((p1.average_destruction() - 95.0).abs() < 1e-9);

        let p2 = summary.player("#P2").unwrap();
        assert_eq!(p2.missed_attacks, 1);
        assert_eq!(summary.players[0].tag, "#P1");
    }

    #[test]
    fn test_hit_rates_grouped_by_matchup() {
        let summary = ClanWarSummary::from_wars("#HOME", &two_wars());
        assert_eq!(summary.hit_rates.len(), 1);
        let rate = &summary.hit_rates[0];
        assert_eq!(rate.label(), "14v14");
        assert_eq!(rate.attacks, 3);
        assert!((rate.rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_skips_preparation_and_foreign_wars() {
        let mut wars = two_wars();
        wars.push(war(
            WarState::Preparation,
            side("#HOME", 0, 0.0, vec![member("#P1", 14, 1)], vec![]),
            side("#X", 0, 0.0, vec![], vec![]),
        ));
        wars.push(war(
            WarState::Ended,
            side("#Y", 10, 50.0, vec![], vec![]),
            side("#Z", 9, 40.0, vec![], vec![]),
        ));

        let summary = ClanWarSummary::from_wars("#HOME", &wars);
        assert_eq!(summary.wars, 2);
    }

    #[test]
    fn test_empty_summary() {
        let summary = ClanWarSummary::from_wars("#HOME", &[]);
        assert_eq!(summary.wars, 0);
        assert_eq!(summary.average_destruction, 0.0);
        assert!(summary.players.is_empty());
    }
}
