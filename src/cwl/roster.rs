use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;

use crate::config::RosterLimits;
use crate::error::{BotError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RosterState {
    #[default]
    Open,
    Finalized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub tag: String,
    pub discord_user: UserId,
}

/// Role changes the caller must apply after a roster edit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterChange {
    pub grant: Vec<UserId>,
    pub revoke: Vec<UserId>,
    /// The edit dropped a finalized roster below the minimum
    pub reopened: bool,
    /// Users whose role change failed, filled in once the change is applied
    pub failed: Vec<UserId>,
}

/// Accounts assigned to one league clan for one season
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    pub clan_tag: String,
    pub state: RosterState,
    pub members: Vec<RosterEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Roster {
    pub fn new(clan_tag: &str) -> Self {
        Self {
            clan_tag: clan_tag.to_string(),
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_finalized(&self) -> bool {
        self.state == RosterState::Finalized
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.members.iter().any(|m| m.tag == tag)
    }

    pub fn has_user(&self, user: UserId) -> bool {
        self.members.iter().any(|m| m.discord_user == user)
    }

    /// Distinct Discord users, in roster order
    pub fn users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = Vec::new();
        for member in &self.members {
            if !users.contains(&member.discord_user) {
                users.push(member.discord_user);
            }
        }
        users
    }

    /// Add an account. Adding to a finalized roster grants the role right away.
    pub fn add(&mut self, entry: RosterEntry, limits: RosterLimits) -> Result<RosterChange> {
        if self.contains(&entry.tag) {
            return Err(BotError::AlreadyRostered {
                tag: entry.tag,
                clan: self.clan_tag.clone(),
            });
        }
        if self.members.len() >= limits.max {
            return Err(BotError::RosterTooLarge {
                clan: self.clan_tag.clone(),
                max: limits.max,
            });
        }

        let mut change = RosterChange::default();
        if self.is_finalized() && !self.has_user(entry.discord_user) {
            change.grant.push(entry.discord_user);
        }
        self.members.push(entry);
        Ok(change)
    }

    /// Remove an account.
    ///
    /// On a finalized roster the user loses the role once they have no
    /// account left in it, and dropping below `limits.min` reopens the
    /// roster and revokes the role from everyone.
    pub fn remove(&mut self, tag: &str, limits: RosterLimits) -> Result<(RosterEntry, RosterChange)> {
        let index = self
            .members
            .iter()
            .position(|m| m.tag == tag)
            .ok_or_else(|| BotError::NotFound {
                kind: "Roster entry",
                id: tag.to_string(),
            })?;
        let removed = self.members.remove(index);

        let mut change = RosterChange::default();
        if !self.is_finalized() {
            return Ok((removed, change));
        }

        if !self.has_user(removed.discord_user) {
            change.revoke.push(removed.discord_user);
        }

        if self.members.len() < limits.min {
            self.state = RosterState::Open;
            self.finalized_at = None;
            change.reopened = true;
            for user in self.users() {
                if !change.revoke.contains(&user) {
                    change.revoke.push(user);
                }
            }
        }

        Ok((removed, change))
    }

    /// Lock the roster. Only allowed with `limits.min..=limits.max` accounts.
    pub fn finalize(&mut self, limits: RosterLimits, now: DateTime<Utc>) -> Result<RosterChange> {
        if self.is_finalized() {
            return Err(BotError::RosterFinalized {
                clan: self.clan_tag.clone(),
            });
        }

        let count = self.members.len();
        if count < limits.min {
            return Err(BotError::RosterTooSmall {
                clan: self.clan_tag.clone(),
                count,
                min: limits.min,
            });
        }
        if count > limits.max {
            return Err(BotError::RosterTooLarge {
                clan: self.clan_tag.clone(),
                max: limits.max,
            });
        }

        self.state = RosterState::Finalized;
        self.finalized_at = Some(now);
        Ok(RosterChange {
            grant: self.users(),
            ..Default::default()
        })
    }

    /// Unlock a finalized roster by hand
    pub fn reopen(&mut self) -> RosterChange {
        if !self.is_finalized() {
            return RosterChange::default();
        }
        self.state = RosterState::Open;
        self.finalized_at = None;
        RosterChange {
            revoke: self.users(),
            reopened: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: RosterLimits = RosterLimits { min: 15, max: 35 };

    fn entry(i: u64) -> RosterEntry {
        RosterEntry {
            tag: format!("#P{}", i),
            discord_user: UserId::new(1000 + i),
        }
    }

    fn roster_with(n: u64) -> Roster {
        let mut roster = Roster::new("#CLAN");
        for i in 0..n {
            roster.add(entry(i), LIMITS).unwrap();
        }
        roster
    }

    #[test]
    fn test_finalize_rejects_too_few() {
        let mut roster = roster_with(14);
        let err = roster.finalize(LIMITS, Utc::now()).unwrap_err();
        assert!(matches!(err, BotError::RosterTooSmall { count: 14, min: 15, .. }));
        assert_eq!(roster.state, RosterState::Open);
    }

    #[test]
    fn test_finalize_rejects_too_many() {
        // Build past the max with looser limits, then finalize with the real ones
        let loose = RosterLimits { min: 1, max: 50 };
        let mut roster = Roster::new("#CLAN");
        for i in 0..36 {
            roster.add(entry(i), loose).unwrap();
        }
        let err = roster.finalize(LIMITS, Utc::now()).unwrap_err();
        assert!(matches!(err, BotError::RosterTooLarge { max: 35, .. }));
        assert!(!roster.is_finalized());
    }

    #[test]
    fn test_finalize_at_bounds_grants_roles() {
        let mut roster = roster_with(15);
        let change = roster.finalize(LIMITS, Utc::now()).unwrap();
        assert!(roster.is_finalized());
        assert_eq!(change.grant.len(), 15);

        let mut roster = roster_with(35);
        assert!(roster.finalize(LIMITS, Utc::now()).is_ok());
    }

    #[test]
    fn test_add_beyond_max_rejected() {
        let mut roster = roster_with(35);
        assert!(matches!(
            roster.add(entry(99), LIMITS),
            Err(BotError::RosterTooLarge { .. })
        ));
    }

    #[test]
    fn test_remove_below_min_reopens() {
        let mut roster = roster_with(15);
        roster.finalize(LIMITS, Utc::now()).unwrap();

        let (removed, change) = roster.remove("#P3", LIMITS).unwrap();
        assert_eq!(removed.tag, "#P3");
        assert!(change.reopened);
        assert_eq!(roster.state, RosterState::Open);
        assert!(roster.finalized_at.is_none());
        // Removed user plus the 14 remaining lose the role
        assert_eq!(change.revoke.len(), 15);
    }

    #[test]
    fn test_remove_above_min_stays_finalized() {
        let mut roster = roster_with(16);
        roster.finalize(LIMITS, Utc::now()).unwrap();

        let (_, change) = roster.remove("#P0", LIMITS).unwrap();
        assert!(!change.reopened);
        assert!(roster.is_finalized());
        assert_eq!(change.revoke, vec![UserId::new(1000)]);
    }

    #[test]
    fn test_user_with_second_account_keeps_role() {
        let mut roster = roster_with(16);
        roster
            .add(
                RosterEntry {
                    tag: "#ALT".to_string(),
                    discord_user: UserId::new(1000),
                },
                LIMITS,
            )
            .unwrap();
        roster.finalize(LIMITS, Utc::now()).unwrap();

        let (_, change) = roster.remove("#P0", LIMITS).unwrap();
        assert!(change.revoke.is_empty());
    }

    #[test]
    fn test_add_to_finalized_grants_role() {
        let mut roster = roster_with(15);
        roster.finalize(LIMITS, Utc::now()).unwrap();
        let change = roster.add(entry(50), LIMITS).unwrap();
        assert_eq!(change.grant, vec![UserId::new(1050)]);
    }

    #[test]
    fn test_finalize_twice_rejected() {
        let mut roster = roster_with(15);
        roster.finalize(LIMITS, Utc::now()).unwrap();
        assert!(matches!(
            roster.finalize(LIMITS, Utc::now()),
            Err(BotError::RosterFinalized { .. })
        ));
    }
}
