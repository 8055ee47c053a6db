use async_trait::async_trait;
use futures::future::join_all;
use serenity::http::Http;
use serenity::model::id::{GuildId, RoleId, UserId};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::Result;

/// Adds and removes Discord roles on behalf of the managers
#[async_trait]
pub trait RoleSync: Send + Sync {
    async fn add_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId, reason: &str) -> Result<()>;

    async fn remove_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId, reason: &str) -> Result<()>;
}

pub type SharedRoleSync = Arc<dyn RoleSync>;

/// Role sync over the Discord REST API
pub struct DiscordRoleSync {
    http: Arc<Http>,
}

impl DiscordRoleSync {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl RoleSync for DiscordRoleSync {
    async fn add_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId, reason: &str) -> Result<()> {
        self.http
            .add_member_role(guild_id, user_id, role_id, Some(reason))
            .await?;
        debug!("Added role {} to {} in {}", role_id, user_id, guild_id);
        Ok(())
    }

    async fn remove_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId, reason: &str) -> Result<()> {
        self.http
            .remove_member_role(guild_id, user_id, role_id, Some(reason))
            .await?;
        debug!("Removed role {} from {} in {}", role_id, user_id, guild_id);
        Ok(())
    }
}

/// Used when no Discord token is configured: logs what would have happened
pub struct LoggingRoleSync;

#[async_trait]
impl RoleSync for LoggingRoleSync {
    async fn add_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId, reason: &str) -> Result<()> {
        info!("[dry run] add role {} to {} in {} ({})", role_id, user_id, guild_id, reason);
        Ok(())
    }

    async fn remove_role(&self, guild_id: GuildId, user_id: UserId, role_id: RoleId, reason: &str) -> Result<()> {
        info!("[dry run] remove role {} from {} in {} ({})", role_id, user_id, guild_id, reason);
        Ok(())
    }
}

/// Outcome of applying a batch of role changes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSyncReport {
    pub granted: usize,
    pub revoked: usize,
    pub failed: Vec<UserId>,
}

/// Grant and revoke `role_id` concurrently.
///
/// Individual failures are logged and reported, never propagated: the
/// data change that triggered the sync has already been committed.
pub async fn apply_role_changes(
    sync: &dyn RoleSync,
    guild_id: GuildId,
    role_id: RoleId,
    grant: &[UserId],
    revoke: &[UserId],
    reason: &str,
) -> RoleSyncReport {
    let mut report = RoleSyncReport::default();

    let grants = join_all(grant.iter().map(|&user| async move {
        (user, sync.add_role(guild_id, user, role_id, reason).await)
    }))
    .await;
    for (user, result) in grants {
        match result {
            Ok(()) => report.granted += 1,
            Err(e) => {
                error!("Failed to add role {} to {}: {}", role_id, user, e);
                report.failed.push(user);
            }
        }
    }

    let revokes = join_all(revoke.iter().map(|&user| async move {
        (user, sync.remove_role(guild_id, user, role_id, reason).await)
    }))
    .await;
    for (user, result) in revokes {
        match result {
            Ok(()) => report.revoked += 1,
            Err(e) => {
                error!("Failed to remove role {} from {}: {}", role_id, user, e);
                report.failed.push(user);
            }
        }
    }

    if report.granted + report.revoked > 0 {
        info!(
            "Role {} sync: {} granted, {} revoked, {} failed ({})",
            role_id,
            report.granted,
            report.revoked,
            report.failed.len(),
            reason
        );
    }
    report
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::BotError;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum RoleCall {
        Add(UserId, RoleId),
        Remove(UserId, RoleId),
    }

    /// Records every call; fails for users listed in `failing`
    #[derive(Default)]
    pub struct RecordingRoleSync {
        pub calls: parking_lot::Mutex<Vec<RoleCall>>,
        pub failing: Vec<UserId>,
    }

    impl RecordingRoleSync {
        pub fn calls(&self) -> Vec<RoleCall> {
            self.calls.lock().clone()
        }

        pub fn added(&self) -> Vec<UserId> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    RoleCall::Add(u, _) => Some(u),
                    RoleCall::Remove(..) => None,
                })
                .collect()
        }

        pub fn removed(&self) -> Vec<UserId> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    RoleCall::Remove(u, _) => Some(u),
                    RoleCall::Add(..) => None,
                })
                .collect()
        }

        fn check(&self, user: UserId) -> Result<()> {
            if self.failing.contains(&user) {
                return Err(BotError::Discord {
                    message: "Missing Permissions".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RoleSync for RecordingRoleSync {
        async fn add_role(&self, _guild_id: GuildId, user_id: UserId, role_id: RoleId, _reason: &str) -> Result<()> {
            self.check(user_id)?;
            self.calls.lock().push(RoleCall::Add(user_id, role_id));
            Ok(())
        }

        async fn remove_role(&self, _guild_id: GuildId, user_id: UserId, role_id: RoleId, _reason: &str) -> Result<()> {
            self.check(user_id)?;
            self.calls.lock().push(RoleCall::Remove(user_id, role_id));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_apply_role_changes_reports_failures() {
        let sync = RecordingRoleSync {
            failing: vec![UserId::new(3)],
            ..Default::default()
        };
        let role = RoleId::new(99);

        let report = apply_role_changes(
            &sync,
            GuildId::new(1),
            role,
            &[UserId::new(2), UserId::new(3)],
            &[UserId::new(4)],
            "test",
        )
        .await;

        assert_eq!(report.granted, 1);
        assert_eq!(report.revoked, 1);
        assert_eq!(report.failed, vec![UserId::new(3)]);
        assert_eq!(sync.added(), vec![UserId::new(2)]);
        assert_eq!(sync.removed(), vec![UserId::new(4)]);
    }
}
