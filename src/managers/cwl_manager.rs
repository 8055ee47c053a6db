use chrono::{DateTime, Utc};
use serde::Serialize;
use serenity::model::id::{RoleId, UserId};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::role_manager::{apply_role_changes, RoleSyncReport, SharedRoleSync};
use crate::config::BotConfig;
use crate::cwl::{
    registration_key, upsert_registration, validate_lineup, CwlGroup, CwlSeasonRecord, GroupClan,
    LeagueClan, LeagueGroup, RegistrationRequest, RegistrationStatus, RegistrationWindow,
    RosterChange, RosterEntry, RosterState, SeasonId, SeasonPhase, Upserted,
};
use crate::error::{BotError, Result};
use crate::locks::KeyedLocks;
use crate::state::{save_state, CwlDatabase, SharedCwlDatabase, StateFile};
use crate::stats::{ClanWarSummary, WarRecord, WarState};
use crate::tag::{normalize_tag, normalize_tags};

/// Who is performing an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// A member acting on their own accounts
    Member(UserId),
    /// Staff override, bypasses windows and ownership
    Admin,
}

impl Actor {
    fn owns(&self, user: UserId) -> bool {
        match self {
            Actor::Member(id) => *id == user,
            Actor::Admin => true,
        }
    }

    fn is_admin(&self) -> bool {
        matches!(self, Actor::Admin)
    }
}

/// One row of the roster export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterExportRow {
    pub clan_tag: String,
    pub clan_name: String,
    pub clan_group: LeagueGroup,
    pub roster_state: RosterState,
    pub player_tag: String,
    pub discord_user: UserId,
    pub town_hall: u8,
    pub player_group: LeagueGroup,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClanStatus {
    pub tag: String,
    pub name: String,
    pub league_group: LeagueGroup,
    pub group_description: &'static str,
    pub roster_state: RosterState,
    pub roster_size: usize,
    pub group_formed: bool,
}

/// What `finalize_season` hands back
#[derive(Debug, Clone, Serialize)]
pub struct SeasonWrapUp {
    pub season: SeasonId,
    pub summaries: Vec<ClanWarSummary>,
    /// Users who could not be stripped of the CWL role
    pub role_failures: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonStatus {
    pub season: SeasonId,
    pub phase: SeasonPhase,
    pub registrations: usize,
    pub unrostered: usize,
    pub clans: Vec<ClanStatus>,
}

/// Drives the CWL season: registration, rosters, league groups and wrap-up.
///
/// Every change to a registration or roster holds the keyed lock for
/// `(season, tag)` across the whole read-modify-write, including the role
/// sync. Player locks are always taken before clan locks.
pub struct CwlManager {
    db: SharedCwlDatabase,
    locks: KeyedLocks<(SeasonId, String)>,
    roles: SharedRoleSync,
    config: Arc<BotConfig>,
    state_path: Option<String>,
}

impl CwlManager {
    pub fn new(
        db: SharedCwlDatabase,
        roles: SharedRoleSync,
        config: Arc<BotConfig>,
        state_path: Option<String>,
    ) -> Self {
        Self {
            db,
            locks: KeyedLocks::new(),
            roles,
            config,
            state_path,
        }
    }

    pub fn db(&self) -> &SharedCwlDatabase {
        &self.db
    }

    async fn persist(&self) -> Result<()> {
        if let Some(path) = &self.state_path {
            let mut db: tokio::sync::RwLockWriteGuard<'_, CwlDatabase> = self.db.write().await;
            db.touch();
            save_state(&*db, path).await?;
        }
        self.locks.prune();
        Ok(())
    }

    /// Members edit rosters during Registration, staff until the season ends
    fn require_roster_edit_phase(season: SeasonId, phase: SeasonPhase, actor: Actor) -> Result<()> {
        if phase == SeasonPhase::Ended || (!actor.is_admin() && phase != SeasonPhase::Registration) {
            return Err(BotError::WrongPhase {
                season: season.to_string(),
                phase: phase.to_string(),
                expected: SeasonPhase::Registration.to_string(),
            });
        }
        Ok(())
    }

    fn cwl_role(&self, clan: &LeagueClan) -> Option<RoleId> {
        clan.role.or(self.config.cwl.cwl_role)
    }

    /// Apply a roster change's roles and note the users that failed on it
    async fn sync_change(&self, role: Option<RoleId>, change: &mut RosterChange, reason: &str) {
        let report = self.sync_roles(role, change, reason).await;
        change.failed = report.failed;
    }

    async fn sync_roles(&self, role: Option<RoleId>, change: &RosterChange, reason: &str) -> RoleSyncReport {
        let (Some(guild_id), Some(role_id)) = (self.config.guild_id, role) else {
            debug!("No guild or CWL role configured, skipping role sync ({})", reason);
            return RoleSyncReport::default();
        };
        apply_role_changes(
            self.roles.as_ref(),
            guild_id,
            role_id,
            &change.grant,
            &change.revoke,
            reason,
        )
        .await
    }

    /// Create the season record. Opening an existing season returns it unchanged.
    pub async fn open_season(&self, season: SeasonId) -> Result<CwlSeasonRecord> {
        let record = {
            let mut db = self.db.write().await;
            if let Some(existing) = db.seasons.get(&season.to_string()) {
                debug!("Season {} already open", season);
                return Ok(existing.clone());
            }
            let record = CwlSeasonRecord::new(season, Utc::now());
            db.seasons.insert(season.to_string(), record.clone());
            record
        };

        info!("Opened CWL season {}", season);
        self.persist().await?;
        Ok(record)
    }

    pub async fn advance_phase(&self, season: SeasonId) -> Result<SeasonPhase> {
        let phase = {
            let mut db = self.db.write().await;
            db.season_mut(season)?.advance(Utc::now())?
        };

        info!("CWL season {} moved to {}", season, phase);
        self.persist().await?;
        Ok(phase)
    }

    /// Sign an account up for the season, or update its existing sign-up.
    ///
    /// Members must register inside the registration window and can only
    /// update accounts they registered themselves.
    pub async fn register_player(
        &self,
        season: SeasonId,
        mut request: RegistrationRequest,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Upserted> {
        request.tag = normalize_tag(&request.tag)?;
        let _guard = self.locks.lock((season, request.tag.clone())).await;

        let upserted = {
            let mut db = self.db.write().await;

            let record = db.season(season)?;
            if actor.is_admin() {
                // Late sign-ups refill a roster that reopened mid-season
                record.require_phase(&[
                    SeasonPhase::Registration,
                    SeasonPhase::Preparation,
                    SeasonPhase::InProgress,
                ])?;
            } else {
                record.require_phase(&[SeasonPhase::Registration])?;
                let window = RegistrationWindow::for_season(season, &self.config.cwl)?;
                if !window.is_open(now) {
                    return Err(BotError::RegistrationClosed {
                        season: season.to_string(),
                    });
                }
            }

            if let Some(existing) = db.registration(season, &request.tag) {
                if existing.is_active() && !actor.owns(existing.discord_user) {
                    return Err(BotError::PermissionDenied {
                        message: format!("{} is registered by another user", request.tag),
                    });
                }

                // A rostered account may not move to a group its clan cannot field
                if let Some(clan_tag) = &existing.roster_clan {
                    let clan = db.clan(season, clan_tag)?;
                    if !request.league_group.can_play_in(clan.league_group) {
                        return Err(BotError::IneligibleGroup {
                            tag: request.tag.clone(),
                            player_group: request.league_group.to_string(),
                            clan_group: clan.league_group.to_string(),
                        });
                    }
                }
            }

            let tag = request.tag.clone();
            let group = request.league_group;
            let upserted = upsert_registration(&mut db.registrations, season, request, now);
            info!("{:?} CWL registration {} for {} (group {})", upserted, tag, season, group);
            upserted
        };

        self.persist().await?;
        Ok(upserted)
    }

    /// Withdraw an account. A rostered account is removed from its roster,
    /// which may reopen a finalized roster.
    pub async fn cancel_registration(&self, season: SeasonId, tag: &str, actor: Actor) -> Result<RosterChange> {
        let tag = normalize_tag(tag)?;
        let _guard = self.locks.lock((season, tag.clone())).await;

        let roster_clan = {
            let db = self.db.read().await;
            Self::require_roster_edit_phase(season, db.season(season)?.phase, actor)?;
            let registration = db
                .registration(season, &tag)
                .filter(|r| r.is_active())
                .ok_or_else(|| BotError::NotRegistered {
                    season: season.to_string(),
                    tag: tag.clone(),
                })?;
            if !actor.owns(registration.discord_user) {
                return Err(BotError::PermissionDenied {
                    message: format!("{} is registered by another user", tag),
                });
            }
            registration.roster_clan.clone()
        };

        let change = match roster_clan {
            Some(clan_tag) => self.remove_locked(season, &clan_tag, &tag, actor).await?,
            None => RosterChange::default(),
        };

        {
            let mut db = self.db.write().await;
            if let Some(registration) = db.registration_mut(season, &tag) {
                registration.status = RegistrationStatus::Cancelled;
                registration.updated_at = Utc::now();
            }
        }

        info!("Cancelled CWL registration {} for {}", tag, season);
        self.persist().await?;
        Ok(change)
    }

    /// Enter a clan into the season, or update its settings while its roster is open
    pub async fn enroll_clan(
        &self,
        season: SeasonId,
        tag: &str,
        name: &str,
        league_group: LeagueGroup,
        war_size: usize,
        role: Option<RoleId>,
    ) -> Result<()> {
        let tag = normalize_tag(tag)?;
        let _guard = self.locks.lock((season, tag.clone())).await;

        {
            let mut db = self.db.write().await;
            db.season(season)?
                .require_phase(&[SeasonPhase::Registration, SeasonPhase::Preparation])?;

            let key = registration_key(season, &tag);
            if let Some(existing) = db.clans.get(&key) {
                if existing.roster.is_finalized() {
                    return Err(BotError::RosterFinalized { clan: tag });
                }
                let rostered_conflict = existing.roster.members.iter().find(|m| {
                    db.registration(season, &m.tag)
                        .map(|r| !r.league_group.can_play_in(league_group))
                        .unwrap_or(false)
                });
                if let Some(member) = rostered_conflict {
                    let player_group = db
                        .registration(season, &member.tag)
                        .map(|r| r.league_group.to_string())
                        .unwrap_or_default();
                    return Err(BotError::IneligibleGroup {
                        tag: member.tag.clone(),
                        player_group,
                        clan_group: league_group.to_string(),
                    });
                }
            }

            let mut clan = LeagueClan::new(season, &tag, name, league_group, war_size, role)?;
            if let Some(existing) = db.clans.remove(&key) {
                clan.roster = existing.roster;
            }
            db.clans.insert(key, clan);
        }

        info!("Enrolled {} ({}) in CWL {} as group {}", name, tag, season, league_group);
        self.persist().await
    }

    /// Put an account on a clan's roster
    pub async fn roster_add(&self, season: SeasonId, clan_tag: &str, tag: &str, actor: Actor) -> Result<RosterChange> {
        let tag = normalize_tag(tag)?;
        let clan_tag = normalize_tag(clan_tag)?;
        let _player = self.locks.lock((season, tag.clone())).await;
        let _clan = self.locks.lock((season, clan_tag.clone())).await;

        let (mut change, role) = {
            let mut db = self.db.write().await;
            Self::require_roster_edit_phase(season, db.season(season)?.phase, actor)?;

            let registration = db
                .registration(season, &tag)
                .filter(|r| r.is_active())
                .cloned()
                .ok_or_else(|| BotError::NotRegistered {
                    season: season.to_string(),
                    tag: tag.clone(),
                })?;
            if !actor.owns(registration.discord_user) {
                return Err(BotError::PermissionDenied {
                    message: format!("{} is registered by another user", tag),
                });
            }
            if let Some(current) = &registration.roster_clan {
                return Err(BotError::AlreadyRostered {
                    tag,
                    clan: current.clone(),
                });
            }

            let limits = self.config.roster;
            let clan = db.clan_mut(season, &clan_tag)?;
            if clan.roster.is_finalized() && !actor.is_admin() {
                return Err(BotError::RosterFinalized { clan: clan_tag });
            }
            if !registration.league_group.can_play_in(clan.league_group) {
                return Err(BotError::IneligibleGroup {
                    tag,
                    player_group: registration.league_group.to_string(),
                    clan_group: clan.league_group.to_string(),
                });
            }

            let change = clan.roster.add(
                RosterEntry {
                    tag: tag.clone(),
                    discord_user: registration.discord_user,
                },
                limits,
            )?;
            let role = clan.role;

            if let Some(reg) = db.registration_mut(season, &tag) {
                reg.roster_clan = Some(clan_tag.clone());
                reg.updated_at = Utc::now();
            }
            (change, role.or(self.config.cwl.cwl_role))
        };

        info!("Rostered {} in {} for {}", tag, clan_tag, season);
        self.sync_change(role, &mut change, "CWL roster addition").await;
        self.persist().await?;
        Ok(change)
    }

    /// Take an account off a clan's roster
    pub async fn roster_remove(&self, season: SeasonId, clan_tag: &str, tag: &str, actor: Actor) -> Result<RosterChange> {
        let tag = normalize_tag(tag)?;
        let clan_tag = normalize_tag(clan_tag)?;
        let _player = self.locks.lock((season, tag.clone())).await;

        let change = self.remove_locked(season, &clan_tag, &tag, actor).await?;
        self.persist().await?;
        Ok(change)
    }

    /// Removal with the player lock already held by the caller
    async fn remove_locked(&self, season: SeasonId, clan_tag: &str, tag: &str, actor: Actor) -> Result<RosterChange> {
        let _clan = self.locks.lock((season, clan_tag.to_string())).await;

        let (mut change, role) = {
            let mut db = self.db.write().await;
            Self::require_roster_edit_phase(season, db.season(season)?.phase, actor)?;
            let owner = db
                .registration(season, tag)
                .map(|r| r.discord_user)
                .ok_or_else(|| BotError::NotRegistered {
                    season: season.to_string(),
                    tag: tag.to_string(),
                })?;
            if !actor.owns(owner) {
                return Err(BotError::PermissionDenied {
                    message: format!("{} is registered by another user", tag),
                });
            }

            let limits = self.config.roster;
            let clan = db.clan_mut(season, clan_tag)?;
            if clan.roster.is_finalized() && !actor.is_admin() {
                return Err(BotError::RosterFinalized {
                    clan: clan_tag.to_string(),
                });
            }
            let (_, mut change) = clan.roster.remove(tag, limits)?;
            let role = clan.role;

            if change.reopened {
                warn!(
                    "Roster of {} dropped below {} players and was reopened",
                    clan_tag, limits.min
                );
            }

            if let Some(reg) = db.registration_mut(season, tag) {
                reg.roster_clan = None;
                reg.updated_at = Utc::now();
            }

            // Users still rostered in another finalized clan keep the shared role
            let db_view: &CwlDatabase = &db;
            change
                .revoke
                .retain(|user| !db_view.user_in_other_finalized_roster(season, *user, clan_tag));
            (change, role.or(self.config.cwl.cwl_role))
        };

        info!("Removed {} from the {} roster for {}", tag, clan_tag, season);
        self.sync_change(role, &mut change, "CWL roster removal").await;
        Ok(change)
    }

    /// Lock a clan's roster and hand out the CWL role
    pub async fn finalize_roster(&self, season: SeasonId, clan_tag: &str) -> Result<RosterChange> {
        let clan_tag = normalize_tag(clan_tag)?;
        let _clan = self.locks.lock((season, clan_tag.clone())).await;

        let (mut change, role) = {
            let mut db = self.db.write().await;
            // InProgress covers a roster that reopened after the group formed
            db.season(season)?.require_phase(&[
                SeasonPhase::Registration,
                SeasonPhase::Preparation,
                SeasonPhase::InProgress,
            ])?;
            let limits = self.config.roster;
            let clan = db.clan_mut(season, &clan_tag)?;
            let change = clan.roster.finalize(limits, Utc::now())?;
            let role = self.cwl_role(clan);
            (change, role)
        };

        info!(
            "Finalized the {} roster for {} with {} users",
            clan_tag,
            season,
            change.grant.len()
        );
        self.sync_change(role, &mut change, "CWL roster finalized").await;
        self.persist().await?;
        Ok(change)
    }

    /// Unlock a finalized roster by hand
    pub async fn reopen_roster(&self, season: SeasonId, clan_tag: &str) -> Result<RosterChange> {
        let clan_tag = normalize_tag(clan_tag)?;
        let _clan = self.locks.lock((season, clan_tag.clone())).await;

        let (mut change, role) = {
            let mut db = self.db.write().await;
            let clan = db.clan_mut(season, &clan_tag)?;
            if clan.group.is_some() {
                return Err(BotError::InvalidGroup {
                    message: format!("{} is already in a league group", clan_tag),
                });
            }
            let mut change = clan.roster.reopen();
            let role = self.cwl_role(clan);
            let db_view: &CwlDatabase = &db;
            change
                .revoke
                .retain(|user| !db_view.user_in_other_finalized_roster(season, *user, &clan_tag));
            (change, role)
        };

        info!("Reopened the {} roster for {}", clan_tag, season);
        self.sync_change(role, &mut change, "CWL roster reopened").await;
        self.persist().await?;
        Ok(change)
    }

    /// Record the league group a finalized clan was placed in
    pub async fn form_group(&self, season: SeasonId, clan_tag: &str, clans: Vec<GroupClan>) -> Result<CwlGroup> {
        let clan_tag = normalize_tag(clan_tag)?;
        let _clan = self.locks.lock((season, clan_tag.clone())).await;

        let mut clans = clans;
        for clan in clans.iter_mut() {
            clan.tag = normalize_tag(&clan.tag)?;
        }

        let group = {
            let mut db = self.db.write().await;
            db.season(season)?.require_phase(&[SeasonPhase::InProgress])?;
            let clan = db.clan_mut(season, &clan_tag)?;
            if !clan.roster.is_finalized() {
                return Err(BotError::InvalidGroup {
                    message: format!("the {} roster must be finalized first", clan_tag),
                });
            }
            if clan.group.is_some() {
                return Err(BotError::InvalidGroup {
                    message: format!("{} already has a league group", clan_tag),
                });
            }
            let group = CwlGroup::form(season, &clan_tag, clans, Utc::now())?;
            clan.group = Some(group.clone());
            group
        };

        info!("League group formed for {} in {}: {} rounds", clan_tag, season, group.wars.len());
        self.persist().await?;
        Ok(group)
    }

    /// Set the accounts fighting in one round
    pub async fn set_lineup(&self, season: SeasonId, clan_tag: &str, round: u32, lineup: &[String]) -> Result<()> {
        let clan_tag = normalize_tag(clan_tag)?;
        let lineup = normalize_tags(lineup)?;
        let _clan = self.locks.lock((season, clan_tag.clone())).await;

        {
            let mut db = self.db.write().await;
            let clan = db.clan(season, &clan_tag)?;
            validate_lineup(
                &lineup,
                clan.war_size,
                &clan.roster,
                &db.registrations,
                season,
                clan.league_group,
            )?;

            let group = db
                .clan_mut(season, &clan_tag)?
                .group
                .as_mut()
                .ok_or_else(|| BotError::NotFound {
                    kind: "League group",
                    id: clan_tag.clone(),
                })?;
            let war = group.war_mut(round)?;
            if war.state != WarState::Preparation {
                return Err(BotError::InvalidLineup {
                    message: format!("round {} has already started", round),
                });
            }
            war.lineup = lineup;
        }

        info!("Lineup set for {} round {} in {}", clan_tag, round, season);
        self.persist().await
    }

    /// Store a fetched war result for a round
    pub async fn record_war(&self, season: SeasonId, clan_tag: &str, round: u32, record: WarRecord) -> Result<()> {
        let clan_tag = normalize_tag(clan_tag)?;
        let _clan = self.locks.lock((season, clan_tag.clone())).await;

        let complete = {
            let mut db = self.db.write().await;
            let group = db
                .clan_mut(season, &clan_tag)?
                .group
                .as_mut()
                .ok_or_else(|| BotError::NotFound {
                    kind: "League group",
                    id: clan_tag.clone(),
                })?;
            group.record_war(round, record)?;
            group.is_complete()
        };

        info!("Recorded round {} for {} in {}", round, clan_tag, season);
        if complete {
            info!("All rounds for {} in {} have ended", clan_tag, season);
        }
        self.persist().await
    }

    /// Summarize every clan's wars, take the CWL roles back and end the season
    pub async fn finalize_season(&self, season: SeasonId) -> Result<SeasonWrapUp> {
        let clan_tags: Vec<String> = {
            let db = self.db.read().await;
            db.season(season)?.require_phase(&[SeasonPhase::InProgress])?;
            db.clans_for(season).iter().map(|c| c.tag.clone()).collect()
        };

        let mut summaries = Vec::with_capacity(clan_tags.len());
        let mut role_failures = Vec::new();
        for clan_tag in &clan_tags {
            let _clan = self.locks.lock((season, clan_tag.clone())).await;

            let (summary, role, users) = {
                let db = self.db.read().await;
                let clan = db.clan(season, clan_tag)?;
                let records = clan.group.as_ref().map(|g| g.records()).unwrap_or_default();
                let users = if clan.roster.is_finalized() {
                    clan.roster.users()
                } else {
                    Vec::new()
                };
                (
                    ClanWarSummary::from_wars(clan_tag, &records),
                    self.cwl_role(clan),
                    users,
                )
            };

            let change = RosterChange {
                revoke: users,
                ..Default::default()
            };
            let report = self.sync_roles(role, &change, "CWL season ended").await;
            role_failures.extend(report.failed);
            summaries.push(summary);
        }

        {
            let mut db = self.db.write().await;
            db.season_mut(season)?.advance(Utc::now())?;
        }

        info!("CWL season {} finalized with {} clans", season, summaries.len());
        if !role_failures.is_empty() {
            warn!("{} CWL role removal(s) failed for {}", role_failures.len(), season);
        }
        self.persist().await?;
        Ok(SeasonWrapUp {
            season,
            summaries,
            role_failures,
        })
    }

    /// Flat list of every rostered account, replacing the spreadsheet export
    pub async fn roster_export(&self, season: SeasonId) -> Result<Vec<RosterExportRow>> {
        let db = self.db.read().await;
        db.season(season)?;

        let mut rows = Vec::new();
        for clan in db.clans_for(season) {
            for member in &clan.roster.members {
                let Some(registration) = db.registration(season, &member.tag) else {
                    warn!("Rostered account {} has no registration in {}", member.tag, season);
                    continue;
                };
                rows.push(RosterExportRow {
                    clan_tag: clan.tag.clone(),
                    clan_name: clan.name.clone(),
                    clan_group: clan.league_group,
                    roster_state: clan.roster.state,
                    player_tag: member.tag.clone(),
                    discord_user: member.discord_user,
                    town_hall: registration.town_hall,
                    player_group: registration.league_group,
                });
            }
        }
        Ok(rows)
    }

    pub async fn season_status(&self, season: SeasonId) -> Result<SeasonStatus> {
        let db = self.db.read().await;
        let record = db.season(season)?;
        let registrations = db.registrations_for(season);

        Ok(SeasonStatus {
            season,
            phase: record.phase,
            registrations: registrations.len(),
            unrostered: registrations.iter().filter(|r| r.roster_clan.is_none()).count(),
            clans: db
                .clans_for(season)
                .into_iter()
                .map(|c| ClanStatus {
                    tag: c.tag.clone(),
                    name: c.name.clone(),
                    league_group: c.league_group,
                    group_description: c.league_group.description(),
                    roster_state: c.roster.state,
                    roster_size: c.roster.len(),
                    group_formed: c.group.is_some(),
                })
                .collect(),
        })
    }
}

/// Shared CWL manager type
pub type SharedCwlManager = Arc<CwlManager>;

pub fn create_shared_cwl_manager(
    db: SharedCwlDatabase,
    roles: SharedRoleSync,
    config: Arc<BotConfig>,
    state_path: Option<String>,
) -> SharedCwlManager {
    Arc::new(CwlManager::new(db, roles, config, state_path))
}
