use chrono::{DateTime, Utc};
use serenity::model::id::{GuildId, RoleId, UserId};
use std::sync::Arc;
use tracing::{debug, info};

use super::role_manager::SharedRoleSync;
use crate::config::EventConfig;
use crate::cwl::Upserted;
use crate::error::{BotError, Result};
use crate::locks::KeyedLocks;
use crate::state::{
    participant_key, save_state, Event, EventKind, EventStore, Participant, SharedEventStore,
    StateFile,
};
use crate::tag::normalize_tag;

/// What staff fill in when creating an event
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub guild_id: GuildId,
    pub name: String,
    pub description: String,
    pub kind: EventKind,
    pub registration_opens: DateTime<Utc>,
    pub registration_closes: DateTime<Utc>,
    pub starts_at: DateTime<Utc>,
    pub capacity: Option<usize>,
    pub prize_pool: Option<String>,
    pub role: Option<RoleId>,
    /// Falls back to the configured default; tournaments always allow one
    pub tags_per_user: Option<usize>,
    pub min_town_hall: Option<u8>,
}

/// Event and tournament sign-ups with role sync
pub struct EventManager {
    store: SharedEventStore,
    /// Keyed by event ID
    locks: KeyedLocks<String>,
    roles: SharedRoleSync,
    config: EventConfig,
    state_path: Option<String>,
}

impl EventManager {
    pub fn new(
        store: SharedEventStore,
        roles: SharedRoleSync,
        config: EventConfig,
        state_path: Option<String>,
    ) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            roles,
            config,
            state_path,
        }
    }

    async fn persist(&self) -> Result<()> {
        if let Some(path) = &self.state_path {
            let mut store: tokio::sync::RwLockWriteGuard<'_, EventStore> = self.store.write().await;
            store.touch();
            save_state(&*store, path).await?;
        }
        Ok(())
    }

    pub async fn create_event(&self, new: NewEvent) -> Result<Event> {
        if new.name.trim().is_empty() {
            return Err(BotError::ConfigValidation {
                message: "event name cannot be empty".to_string(),
            });
        }
        if new.registration_closes <= new.registration_opens {
            return Err(BotError::ConfigValidation {
                message: "registration must close after it opens".to_string(),
            });
        }
        if new.starts_at < new.registration_closes {
            return Err(BotError::ConfigValidation {
                message: "the event cannot start before registration closes".to_string(),
            });
        }
        if new.capacity == Some(0) {
            return Err(BotError::ConfigValidation {
                message: "capacity must be at least 1".to_string(),
            });
        }

        let tags_per_user = match new.kind {
            EventKind::Tournament => 1,
            EventKind::General => new
                .tags_per_user
                .unwrap_or(self.config.default_tags_per_user)
                .max(1),
        };

        let event = Event {
            id: uuid::Uuid::new_v4().to_string(),
            guild_id: new.guild_id,
            name: new.name.trim().to_string(),
            description: new.description,
            kind: new.kind,
            registration_opens: new.registration_opens,
            registration_closes: new.registration_closes,
            starts_at: new.starts_at,
            capacity: new.capacity,
            prize_pool: new.prize_pool,
            role: new.role,
            tags_per_user,
            min_town_hall: new.min_town_hall,
            closed: false,
            created_at: Utc::now(),
        };

        {
            let mut store = self.store.write().await;
            store.events.insert(event.id.clone(), event.clone());
        }

        info!("Created {:?} event '{}' ({})", event.kind, event.name, event.id);
        self.persist().await?;
        Ok(event)
    }

    /// Enter an account, or refresh its entry if it is already in
    pub async fn join(
        &self,
        event_id: &str,
        user: UserId,
        tag: &str,
        town_hall: u8,
        now: DateTime<Utc>,
    ) -> Result<Upserted> {
        let tag = normalize_tag(tag)?;
        let _guard = self.locks.lock(event_id.to_string()).await;

        let (upserted, first_entry, event) = {
            let mut store = self.store.write().await;
            let event = store
                .events
                .get(event_id)
                .cloned()
                .ok_or_else(|| BotError::NotFound {
                    kind: "Event",
                    id: event_id.to_string(),
                })?;

            if !event.registration_open(now) {
                return Err(BotError::EventClosed { event: event.name });
            }
            if let Some(required) = event.min_town_hall {
                if town_hall < required {
                    return Err(BotError::TownHallTooLow { tag, required });
                }
            }

            let key = participant_key(event_id, user, &tag);
            if let Some(existing) = store.participants.get_mut(&key) {
                existing.town_hall = town_hall;
                existing.updated_at = now;
                debug!("Refreshed entry {} in '{}'", tag, event.name);
                (Upserted::Updated, false, event)
            } else {
                let taken = store
                    .participants_of(event_id)
                    .iter()
                    .any(|p| p.tag == tag);
                if taken {
                    return Err(BotError::PermissionDenied {
                        message: format!("{} is already entered by another user", tag),
                    });
                }

                let user_entries = store.entries_of_user(event_id, user);
                if user_entries >= event.tags_per_user {
                    return Err(BotError::TooManyTags {
                        event: event.name,
                        limit: event.tags_per_user,
                    });
                }
                if let Some(capacity) = event.capacity {
                    if store.participants_of(event_id).len() >= capacity {
                        return Err(BotError::EventFull {
                            event: event.name,
                            capacity,
                        });
                    }
                }

                store.participants.insert(
                    key,
                    Participant {
                        event_id: event_id.to_string(),
                        discord_user: user,
                        tag: tag.clone(),
                        town_hall,
                        registered_at: now,
                        updated_at: now,
                    },
                );
                (Upserted::Created, user_entries == 0, event)
            }
        };

        if first_entry {
            if let Some(role) = event.role {
                // Entry is recorded regardless; a failed role sync is only logged
                if let Err(e) = self
                    .roles
                    .add_role(event.guild_id, user, role, &format!("Joined {}", event.name))
                    .await
                {
                    tracing::error!("Failed to add event role to {}: {}", user, e);
                }
            }
        }

        info!("{:?} entry {} for {} in '{}'", upserted, tag, user, event.name);
        self.persist().await?;
        Ok(upserted)
    }

    /// Withdraw an account. The event role goes once the user has no entries left.
    pub async fn withdraw(&self, event_id: &str, user: UserId, tag: &str, now: DateTime<Utc>) -> Result<()> {
        let tag = normalize_tag(tag)?;
        let _guard = self.locks.lock(event_id.to_string()).await;

        let (event, remaining) = {
            let mut store = self.store.write().await;
            let event = store
                .events
                .get(event_id)
                .cloned()
                .ok_or_else(|| BotError::NotFound {
                    kind: "Event",
                    id: event_id.to_string(),
                })?;
            if event.closed || now >= event.starts_at {
                return Err(BotError::EventClosed { event: event.name });
            }

            let key = participant_key(event_id, user, &tag);
            if store.participants.remove(&key).is_none() {
                return Err(BotError::NotFound {
                    kind: "Event entry",
                    id: tag,
                });
            }
            (event, store.entries_of_user(event_id, user))
        };

        if remaining == 0 {
            if let Some(role) = event.role {
                if let Err(e) = self
                    .roles
                    .remove_role(event.guild_id, user, role, &format!("Left {}", event.name))
                    .await
                {
                    tracing::error!("Failed to remove event role from {}: {}", user, e);
                }
            }
        }

        info!("Withdrew {} from '{}'", tag, event.name);
        self.persist().await
    }

    pub async fn participants(&self, event_id: &str) -> Result<Vec<Participant>> {
        let store = self.store.read().await;
        if !store.events.contains_key(event_id) {
            return Err(BotError::NotFound {
                kind: "Event",
                id: event_id.to_string(),
            });
        }
        Ok(store.participants_of(event_id).into_iter().cloned().collect())
    }

    /// Stop sign-ups for good
    pub async fn close_event(&self, event_id: &str) -> Result<()> {
        let _guard = self.locks.lock(event_id.to_string()).await;
        {
            let mut store = self.store.write().await;
            let event = store
                .events
                .get_mut(event_id)
                .ok_or_else(|| BotError::NotFound {
                    kind: "Event",
                    id: event_id.to_string(),
                })?;
            event.closed = true;
        }
        info!("Closed event {}", event_id);
        self.persist().await
    }

    pub async fn open_events(&self, guild_id: GuildId, now: DateTime<Utc>) -> Vec<Event> {
        let store = self.store.read().await;
        let mut events: Vec<Event> = store
            .events
            .values()
            .filter(|e| e.guild_id == guild_id && e.registration_open(now))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.starts_at);
        events
    }
}

pub type SharedEventManager = Arc<EventManager>;

pub fn create_shared_event_manager(
    store: SharedEventStore,
    roles: SharedRoleSync,
    config: EventConfig,
    state_path: Option<String>,
) -> SharedEventManager {
    Arc::new(EventManager::new(store, roles, config, state_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managers::role_manager::testing::RecordingRoleSync;
    use crate::state::create_shared_event_store;
    use chrono::Duration;

    fn manager() -> (EventManager, Arc<RecordingRoleSync>) {
        let roles = Arc::new(RecordingRoleSync::default());
        let manager = EventManager::new(
            create_shared_event_store(EventStore::default()),
            roles.clone(),
            EventConfig::default(),
            None,
        );
        (manager, roles)
    }

    fn new_event(kind: EventKind, capacity: Option<usize>) -> NewEvent {
        let now = Utc::now();
        NewEvent {
            guild_id: GuildId::new(1),
            name: "Summer Cup".to_string(),
            description: String::new(),
            kind,
            registration_opens: now - Duration::days(1),
            registration_closes: now + Duration::days(1),
            starts_at: now + Duration::days(2),
            capacity,
            prize_pool: Some("50M gold pass".to_string()),
            role: Some(RoleId::new(900)),
            tags_per_user: None,
            min_town_hall: None,
        }
    }

    #[tokio::test]
    async fn test_join_twice_updates() {
        let (manager, roles) = manager();
        let event = manager.create_event(new_event(EventKind::General, None)).await.unwrap();
        let user = UserId::new(5);

        assert_eq!(
            manager.join(&event.id, user, "#2PP", 13, Utc::now()).await.unwrap(),
            Upserted::Created
        );
        assert_eq!(
            manager.join(&event.id, user, "2pp", 14, Utc::now()).await.unwrap(),
            Upserted::Updated
        );

        let entries = manager.participants(&event.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].town_hall, 14);
        assert_eq!(roles.added(), vec![user]);
    }

    #[tokio::test]
    async fn test_tournament_allows_one_account() {
        let (manager, _) = manager();
        let event = manager.create_event(new_event(EventKind::Tournament, None)).await.unwrap();
        assert_eq!(event.tags_per_user, 1);

        let user = UserId::new(5);
        manager.join(&event.id, user, "#2PP", 14, Utc::now()).await.unwrap();
        let err = manager.join(&event.id, user, "#9QL", 14, Utc::now()).await.unwrap_err();
        assert!(matches!(err, BotError::TooManyTags { limit: 1, .. }));
    }

    #[tokio::test]
    async fn test_capacity_enforced() {
        let (manager, _) = manager();
        let event = manager.create_event(new_event(EventKind::General, Some(1))).await.unwrap();

        manager.join(&event.id, UserId::new(5), "#2PP", 14, Utc::now()).await.unwrap();
        let err = manager
            .join(&event.id, UserId::new(6), "#9QL", 14, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::EventFull { capacity: 1, .. }));
    }

    #[tokio::test]
    async fn test_closed_window_and_town_hall_floor() {
        let (manager, _) = manager();
        let mut draft = new_event(EventKind::Tournament, None);
        draft.min_town_hall = Some(15);
        let event = manager.create_event(draft).await.unwrap();

        let err = manager
            .join(&event.id, UserId::new(5), "#2PP", 14, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::TownHallTooLow { required: 15, .. }));

        let later = Utc::now() + Duration::days(3);
        let err = manager
            .join(&event.id, UserId::new(5), "#2PP", 15, later)
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::EventClosed { .. }));
    }

    #[tokio::test]
    async fn test_withdraw_removes_role_after_last_entry() {
        let (manager, roles) = manager();
        let event = manager.create_event(new_event(EventKind::General, None)).await.unwrap();
        let user = UserId::new(5);

        manager.join(&event.id, user, "#2PP", 14, Utc::now()).await.unwrap();
        manager.join(&event.id, user, "#9QL", 14, Utc::now()).await.unwrap();

        manager.withdraw(&event.id, user, "#2PP", Utc::now()).await.unwrap();
        assert!(roles.removed().is_empty());

        manager.withdraw(&event.id, user, "#9QL", Utc::now()).await.unwrap();
        assert_eq!(roles.removed(), vec![user]);
    }

    #[tokio::test]
    async fn test_same_tag_cannot_be_entered_by_two_users() {
        let (manager, _) = manager();
        let event = manager.create_event(new_event(EventKind::General, None)).await.unwrap();
        manager.join(&event.id, UserId::new(5), "#2PP", 14, Utc::now()).await.unwrap();
        let err = manager
            .join(&event.id, UserId::new(6), "#2PP", 14, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn test_create_rejects_inverted_window() {
        let (manager, _) = manager();
        let mut draft = new_event(EventKind::General, None);
        draft.registration_closes = draft.registration_opens - Duration::hours(1);
        assert!(manager.create_event(draft).await.is_err());
    }
}
