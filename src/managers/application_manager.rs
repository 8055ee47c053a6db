use chrono::Utc;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use tracing::info;

use crate::config::ApplicationConfig;
use crate::error::{BotError, Result};
use crate::locks::KeyedLocks;
use crate::state::{
    save_state, ApplicationAnswer, ApplicationStore, ClanApplication, SharedApplicationStore,
    StateFile,
};
use crate::tag::normalize_tags;

/// Handles clan applications and their ticket channels
pub struct ApplicationManager {
    store: SharedApplicationStore,
    /// Keyed by (guild, ticket channel)
    locks: KeyedLocks<(GuildId, ChannelId)>,
    config: ApplicationConfig,
    state_path: Option<String>,
}

impl ApplicationManager {
    pub fn new(store: SharedApplicationStore, config: ApplicationConfig, state_path: Option<String>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            config,
            state_path,
        }
    }

    async fn persist(&self) -> Result<()> {
        if let Some(path) = &self.state_path {
            let mut store: tokio::sync::RwLockWriteGuard<'_, ApplicationStore> = self.store.write().await;
            store.touch();
            save_state(&*store, path).await?;
        }
        Ok(())
    }

    /// Record a submitted application form
    pub async fn submit(
        &self,
        guild_id: GuildId,
        applicant: UserId,
        tags: &[String],
        answers: Vec<ApplicationAnswer>,
    ) -> Result<ClanApplication> {
        let tags = normalize_tags(tags)?;
        if tags.is_empty() {
            return Err(BotError::InvalidApplication {
                message: "at least one account tag is required".to_string(),
            });
        }
        if tags.len() > self.config.max_tags {
            return Err(BotError::InvalidApplication {
                message: format!("at most {} accounts per application", self.config.max_tags),
            });
        }

        let answers: Vec<ApplicationAnswer> = answers
            .into_iter()
            .map(|a| ApplicationAnswer {
                question: a.question,
                answer: a.answer.trim().to_string(),
            })
            .collect();
        if let Some(blank) = answers.iter().find(|a| a.answer.is_empty()) {
            return Err(BotError::InvalidApplication {
                message: format!("'{}' needs an answer", blank.question),
            });
        }

        let application = ClanApplication {
            id: uuid::Uuid::new_v4().to_string(),
            guild_id,
            applicant,
            tags,
            answers,
            ticket_channel: None,
            created_at: Utc::now(),
        };

        {
            let mut store = self.store.write().await;
            store
                .applications
                .insert(application.id.clone(), application.clone());
        }

        info!(
            "Application {} submitted by {} with {} account(s)",
            application.id,
            applicant,
            application.tags.len()
        );
        self.persist().await?;
        Ok(application)
    }

    /// Link the ticket channel created for an application. Only allowed once.
    pub async fn attach_ticket(&self, application_id: &str, channel_id: ChannelId) -> Result<ClanApplication> {
        let guild_id = {
            let store = self.store.read().await;
            store
                .applications
                .get(application_id)
                .map(|a| a.guild_id)
                .ok_or_else(|| BotError::NotFound {
                    kind: "Application",
                    id: application_id.to_string(),
                })?
        };
        let _guard = self.locks.lock((guild_id, channel_id)).await;

        let application = {
            let mut store = self.store.write().await;
            if let Some(other) = store.find_by_ticket(guild_id, channel_id) {
                if other.id != application_id {
                    return Err(BotError::TicketAlreadyLinked { id: other.id.clone() });
                }
            }

            let application = store
                .applications
                .get_mut(application_id)
                .ok_or_else(|| BotError::NotFound {
                    kind: "Application",
                    id: application_id.to_string(),
                })?;
            if application.ticket_channel.is_some() {
                return Err(BotError::TicketAlreadyLinked {
                    id: application_id.to_string(),
                });
            }
            application.ticket_channel = Some(channel_id);
            application.clone()
        };

        info!("Application {} linked to ticket {}", application_id, channel_id);
        self.persist().await?;
        Ok(application)
    }

    pub async fn by_ticket(&self, guild_id: GuildId, channel_id: ChannelId) -> Option<ClanApplication> {
        let store = self.store.read().await;
        store.find_by_ticket(guild_id, channel_id).cloned()
    }

    pub async fn for_applicant(&self, guild_id: GuildId, applicant: UserId) -> Vec<ClanApplication> {
        let store = self.store.read().await;
        store
            .for_applicant(guild_id, applicant)
            .into_iter()
            .cloned()
            .collect()
    }

    /// The configured questions paired with empty answers
    pub fn blank_form(&self) -> Vec<ApplicationAnswer> {
        self.config
            .questions
            .iter()
            .map(|q| ApplicationAnswer {
                question: q.clone(),
                answer: String::new(),
            })
            .collect()
    }
}

pub type SharedApplicationManager = Arc<ApplicationManager>;

pub fn create_shared_application_manager(
    store: SharedApplicationStore,
    config: ApplicationConfig,
    state_path: Option<String>,
) -> SharedApplicationManager {
    Arc::new(ApplicationManager::new(store, config, state_path))
}
