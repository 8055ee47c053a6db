use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;
use std::collections::HashMap;

use super::league_group::LeagueGroup;
use super::season::SeasonId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Registered,
    Cancelled,
}

/// One player account signed up for one CWL season
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerRegistration {
    pub season: SeasonId,
    pub tag: String,
    pub discord_user: UserId,
    pub town_hall: u8,
    pub league_group: LeagueGroup,
    pub status: RegistrationStatus,

    /// Home clan of the roster this account was placed in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roster_clan: Option<String>,

    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlayerRegistration {
    pub fn is_active(&self) -> bool {
        self.status == RegistrationStatus::Registered
    }
}

/// Details a player submits when signing up
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub tag: String,
    pub discord_user: UserId,
    pub town_hall: u8,
    pub league_group: LeagueGroup,
}

/// Key for the registration map: one document per (season, tag)
pub fn registration_key(season: SeasonId, tag: &str) -> String {
    format!("{}|{}", season, tag)
}

/// Whether an upsert created a record or updated an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created,
    Updated,
}

/// Insert or update the registration for (season, tag).
///
/// Updating keeps the original sign-up time and the roster placement, and
/// revives a cancelled registration.
pub fn upsert_registration(
    registrations: &mut HashMap<String, PlayerRegistration>,
    season: SeasonId,
    request: RegistrationRequest,
    now: DateTime<Utc>,
) -> Upserted {
    let key = registration_key(season, &request.tag);

    if let Some(existing) = registrations.get_mut(&key) {
        existing.discord_user = request.discord_user;
        existing.town_hall = request.town_hall;
        existing.league_group = request.league_group;
        existing.status = RegistrationStatus::Registered;
        existing.updated_at = now;
        return Upserted::Updated;
    }

    registrations.insert(
        key,
        PlayerRegistration {
            season,
            tag: request.tag,
            discord_user: request.discord_user,
            town_hall: request.town_hall,
            league_group: request.league_group,
            status: RegistrationStatus::Registered,
            roster_clan: None,
            registered_at: now,
            updated_at: now,
        },
    );
    Upserted::Created
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(group: LeagueGroup, town_hall: u8) -> RegistrationRequest {
        RegistrationRequest {
            tag: "#2PP".to_string(),
            discord_user: UserId::new(42),
            town_hall,
            league_group: group,
        }
    }

    #[test]
    fn test_register_twice_updates_instead_of_duplicating() {
        let season = SeasonId::new(2024, 5).unwrap();
        let mut map = HashMap::new();
        let t0 = Utc::now();

        assert_eq!(
            upsert_registration(&mut map, season, request(LeagueGroup::C, 13), t0),
            Upserted::Created
        );
        let t1 = t0 + chrono::Duration::minutes(5);
        assert_eq!(
            upsert_registration(&mut map, season, request(LeagueGroup::A, 14), t1),
            Upserted::Updated
        );

        assert_eq!(map.len(), 1);
        let reg = &map[&registration_key(season, "#2PP")];
        assert_eq!(reg.league_group, LeagueGroup::A);
        assert_eq!(reg.town_hall, 14);
        assert_eq!(reg.registered_at, t0);
        assert_eq!(reg.updated_at, t1);
    }

    #[test]
    fn test_same_tag_in_other_season_is_separate() {
        let may = SeasonId::new(2024, 5).unwrap();
        let mut map = HashMap::new();
        let now = Utc::now();

        upsert_registration(&mut map, may, request(LeagueGroup::B, 13), now);
        upsert_registration(&mut map, may.next(), request(LeagueGroup::B, 13), now);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_upsert_revives_cancelled() {
        let season = SeasonId::new(2024, 5).unwrap();
        let mut map = HashMap::new();
        let now = Utc::now();

        upsert_registration(&mut map, season, request(LeagueGroup::B, 13), now);
        map.get_mut(&registration_key(season, "#2PP")).unwrap().status =
            RegistrationStatus::Cancelled;

        upsert_registration(&mut map, season, request(LeagueGroup::B, 13), now);
        assert!(map[&registration_key(season, "#2PP")].is_active());
    }
}
