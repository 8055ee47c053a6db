//! Clan rank suggestions from tenure and activity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;
use std::fmt;

use crate::config::{RankRequirement, RankRequirements};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRank {
    Member,
    Elder,
    CoLeader,
    Leader,
}

impl MemberRank {
    /// The rank a member could be promoted to automatically
    pub fn next(self) -> Option<MemberRank> {
        match self {
            MemberRank::Member => Some(MemberRank::Elder),
            MemberRank::Elder => Some(MemberRank::CoLeader),
            MemberRank::CoLeader | MemberRank::Leader => None,
        }
    }
}

impl fmt::Display for MemberRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemberRank::Member => "Member",
            MemberRank::Elder => "Elder",
            MemberRank::CoLeader => "Co-Leader",
            MemberRank::Leader => "Leader",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClanMember {
    pub tag: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord_user: Option<UserId>,
    pub rank: MemberRank,
    pub joined_at: DateTime<Utc>,
    pub war_stars: u32,
    pub donations: u32,
}

impl ClanMember {
    pub fn tenure_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.joined_at).num_days().max(0)
    }

    /// Ten points per war star plus one per hundred troops donated
    pub fn activity_score(&self) -> u64 {
        u64::from(self.war_stars) * 10 + u64::from(self.donations) / 100
    }
}

/// Why a member is not yet ready for the next rank
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Shortfall {
    Tenure { days: i64, required: i64 },
    WarStars { stars: u32, required: u32 },
    Donations { donated: u32, required: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Eligibility {
    /// Ready to be promoted to this rank
    Eligible(MemberRank),
    /// The next rank and what is still missing
    NotYet(MemberRank, Vec<Shortfall>),
    /// Co-Leaders and Leaders are never promoted automatically
    Manual,
}

fn shortfalls(member: &ClanMember, requirement: &RankRequirement, now: DateTime<Utc>) -> Vec<Shortfall> {
    let mut missing = Vec::new();
    let days = member.tenure_days(now);
    if days < requirement.min_tenure_days {
        missing.push(Shortfall::Tenure {
            days,
            required: requirement.min_tenure_days,
        });
    }
    if member.war_stars < requirement.min_war_stars {
        missing.push(Shortfall::WarStars {
            stars: member.war_stars,
            required: requirement.min_war_stars,
        });
    }
    if member.donations < requirement.min_donations {
        missing.push(Shortfall::Donations {
            donated: member.donations,
            required: requirement.min_donations,
        });
    }
    missing
}

pub fn promotion_eligibility(member: &ClanMember, requirements: &RankRequirements, now: DateTime<Utc>) -> Eligibility {
    let (next, requirement) = match member.rank.next() {
        Some(MemberRank::Elder) => (MemberRank::Elder, &requirements.elder),
        Some(MemberRank::CoLeader) => (MemberRank::CoLeader, &requirements.co_leader),
        _ => return Eligibility::Manual,
    };

    let missing = shortfalls(member, requirement, now);
    if missing.is_empty() {
        Eligibility::Eligible(next)
    } else {
        Eligibility::NotYet(next, missing)
    }
}

/// Members eligible for promotion right now
pub fn promotion_candidates<'a>(
    members: &'a [ClanMember],
    requirements: &RankRequirements,
    now: DateTime<Utc>,
) -> Vec<(&'a ClanMember, MemberRank)> {
    members
        .iter()
        .filter_map(|m| match promotion_eligibility(m, requirements, now) {
            Eligibility::Eligible(rank) => Some((m, rank)),
            _ => None,
        })
        .collect()
}

/// Most active first; ties go to the longer-serving member, then by tag
pub fn leaderboard(members: &[ClanMember]) -> Vec<&ClanMember> {
    let mut ranked: Vec<&ClanMember> = members.iter().collect();
    ranked.sort_by(|a, b| {
        b.activity_score()
            .cmp(&a.activity_score())
            .then_with(|| a.joined_at.cmp(&b.joined_at))
            .then_with(|| a.tag.cmp(&b.tag))
    });
    ranked
}
