//! Recruiting reminders: periodic announcements that are refreshed in place
//! while they are still the newest message in their channel, and re-sent
//! once the conversation has moved on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::builder::{CreateMessage, EditMessage, GetMessages};
use serenity::http::Http;
use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::error::{BotError, Result};
use crate::locks::KeyedLocks;
use crate::messages::recruiting_message;
use crate::state::{save_state, RecruitingReminder, ReminderStore, SharedReminderStore, StateFile};
use crate::tag::normalize_tag;

/// Message operations a reminder needs
#[async_trait]
pub trait ReminderChannel: Send + Sync {
    /// Newest message in the channel, if any
    async fn latest_message(&self, channel_id: ChannelId) -> Result<Option<MessageId>>;

    async fn send(&self, channel_id: ChannelId, content: &str) -> Result<MessageId>;

    async fn edit(&self, channel_id: ChannelId, message_id: MessageId, content: &str) -> Result<()>;

    async fn delete(&self, channel_id: ChannelId, message_id: MessageId) -> Result<()>;
}

pub type SharedReminderChannel = Arc<dyn ReminderChannel>;

pub struct DiscordReminderChannel {
    http: Arc<Http>,
}

impl DiscordReminderChannel {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ReminderChannel for DiscordReminderChannel {
    async fn latest_message(&self, channel_id: ChannelId) -> Result<Option<MessageId>> {
        let messages = channel_id
            .messages(self.http.as_ref(), GetMessages::new().limit(1))
            .await?;
        Ok(messages.first().map(|m| m.id))
    }

    async fn send(&self, channel_id: ChannelId, content: &str) -> Result<MessageId> {
        let message = channel_id
            .send_message(self.http.as_ref(), CreateMessage::new().content(content))
            .await?;
        Ok(message.id)
    }

    async fn edit(&self, channel_id: ChannelId, message_id: MessageId, content: &str) -> Result<()> {
        channel_id
            .edit_message(self.http.as_ref(), message_id, EditMessage::new().content(content))
            .await?;
        Ok(())
    }

    async fn delete(&self, channel_id: ChannelId, message_id: MessageId) -> Result<()> {
        channel_id.delete_message(&self.http, message_id).await?;
        Ok(())
    }
}

/// What to do with a reminder on this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderAction {
    /// Not due yet, or disabled
    Skip,
    /// The active message is still the newest one; refresh it
    EditInPlace(MessageId),
    /// Post a new message, removing the previous one if there was one
    Resend { delete_previous: Option<MessageId> },
}

pub fn decide_action(
    reminder: &RecruitingReminder,
    latest_in_channel: Option<MessageId>,
    now: DateTime<Utc>,
) -> ReminderAction {
    if !reminder.is_due(now) {
        return ReminderAction::Skip;
    }
    match reminder.active_message {
        Some(active) if latest_in_channel == Some(active) => ReminderAction::EditInPlace(active),
        previous => ReminderAction::Resend {
            delete_previous: previous,
        },
    }
}

#[derive(Debug, Clone)]
pub struct NewReminder {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub clan_tag: String,
    pub clan_name: String,
    pub body: String,
    pub interval_minutes: i64,
}

pub struct ReminderManager {
    store: SharedReminderStore,
    channel: SharedReminderChannel,
    /// Keyed by (guild, channel)
    locks: KeyedLocks<(GuildId, ChannelId)>,
    state_path: Option<String>,
}

impl ReminderManager {
    pub fn new(store: SharedReminderStore, channel: SharedReminderChannel, state_path: Option<String>) -> Self {
        Self {
            store,
            channel,
            locks: KeyedLocks::new(),
            state_path,
        }
    }

    async fn persist(&self) -> Result<()> {
        if let Some(path) = &self.state_path {
            let mut store: tokio::sync::RwLockWriteGuard<'_, ReminderStore> = self.store.write().await;
            store.touch();
            save_state(&*store, path).await?;
        }
        Ok(())
    }

    pub async fn add_reminder(&self, new: NewReminder) -> Result<RecruitingReminder> {
        if new.interval_minutes < 1 {
            return Err(BotError::ConfigValidation {
                message: "reminder interval must be at least one minute".to_string(),
            });
        }

        let reminder = RecruitingReminder {
            id: uuid::Uuid::new_v4().to_string(),
            guild_id: new.guild_id,
            channel_id: new.channel_id,
            clan_tag: normalize_tag(&new.clan_tag)?,
            clan_name: new.clan_name,
            body: new.body,
            interval_minutes: new.interval_minutes,
            active_message: None,
            last_posted_at: None,
            enabled: true,
        };

        {
            let mut store = self.store.write().await;
            store.reminders.insert(reminder.id.clone(), reminder.clone());
        }
        info!(
            "Added recruiting reminder {} for {} every {} minutes",
            reminder.id, reminder.clan_tag, reminder.interval_minutes
        );
        self.persist().await?;
        Ok(reminder)
    }

    /// Stop a reminder and delete its active message
    pub async fn remove_reminder(&self, id: &str) -> Result<()> {
        let reminder = {
            let mut store = self.store.write().await;
            store.reminders.remove(id).ok_or_else(|| BotError::NotFound {
                kind: "Reminder",
                id: id.to_string(),
            })?
        };

        if let Some(message) = reminder.active_message {
            if let Err(e) = self.channel.delete(reminder.channel_id, message).await {
                warn!("Could not delete reminder message {}: {}", message, e);
            }
        }
        info!("Removed recruiting reminder {}", id);
        self.persist().await
    }

    /// Post every due reminder. Returns the actions taken.
    pub async fn tick(&self, now: DateTime<Utc>) -> Vec<(String, ReminderAction)> {
        let due: Vec<RecruitingReminder> = {
            let store = self.store.read().await;
            store
                .reminders
                .values()
                .filter(|r| r.is_due(now))
                .cloned()
                .collect()
        };
        if due.is_empty() {
            return Vec::new();
        }
        debug!("{} recruiting reminder(s) due", due.len());

        let mut actions = Vec::with_capacity(due.len());
        for reminder in due {
            match self.post(&reminder, now).await {
                Ok(action) => actions.push((reminder.id.clone(), action)),
                Err(e) => error!("Recruiting reminder {} failed: {}", reminder.id, e),
            }
        }

        if let Err(e) = self.persist().await {
            error!("Failed to save reminders: {}", e);
        }
        actions
    }

    async fn post(&self, reminder: &RecruitingReminder, now: DateTime<Utc>) -> Result<ReminderAction> {
        let _guard = self.locks.lock((reminder.guild_id, reminder.channel_id)).await;

        let latest = self.channel.latest_message(reminder.channel_id).await?;
        let action = decide_action(reminder, latest, now);
        let content = recruiting_message(&reminder.clan_name, &reminder.clan_tag, &reminder.body);

        let message_id = match action {
            ReminderAction::Skip => return Ok(action),
            ReminderAction::EditInPlace(message_id) => {
                match self.channel.edit(reminder.channel_id, message_id, &content).await {
                    Ok(()) => message_id,
                    Err(e) => {
                        // Message vanished between the fetch and the edit
                        warn!("Edit of reminder {} failed, re-sending: {}", reminder.id, e);
                        self.channel.send(reminder.channel_id, &content).await?
                    }
                }
            }
            ReminderAction::Resend { delete_previous } => {
                let message_id = self.channel.send(reminder.channel_id, &content).await?;
                if let Some(previous) = delete_previous {
                    if let Err(e) = self.channel.delete(reminder.channel_id, previous).await {
                        debug!("Previous reminder message {} already gone: {}", previous, e);
                    }
                }
                message_id
            }
        };

        {
            let mut store = self.store.write().await;
            if let Some(stored) = store.reminders.get_mut(&reminder.id) {
                stored.active_message = Some(message_id);
                stored.last_posted_at = Some(now);
            }
        }
        debug!("Reminder {}: {:?}", reminder.id, action);
        Ok(action)
    }
}

pub type SharedReminderManager = Arc<ReminderManager>;

pub fn create_shared_reminder_manager(
    store: SharedReminderStore,
    channel: SharedReminderChannel,
    state_path: Option<String>,
) -> SharedReminderManager {
    Arc::new(ReminderManager::new(store, channel, state_path))
}

/// Tick reminders every `tick_seconds` until `shutdown` flips to true
pub async fn run_scheduler(manager: SharedReminderManager, tick_seconds: u64, mut shutdown: watch::Receiver<bool>) {
    let mut ticks = IntervalStream::new(tokio::time::interval(Duration::from_secs(tick_seconds)));
    info!("Recruiting reminder scheduler started ({}s tick)", tick_seconds);

    loop {
        tokio::select! {
            tick = ticks.next() => {
                if tick.is_none() {
                    break;
                }
                let actions = manager.tick(Utc::now()).await;
                if !actions.is_empty() {
                    info!("Posted {} recruiting reminder(s)", actions.len());
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Recruiting reminder scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_shared_reminder_store;
    use parking_lot::Mutex;

    /// Channel fake: a list of message IDs, newest last
    #[derive(Default)]
    struct FakeChannel {
        messages: Mutex<Vec<MessageId>>,
        next_id: Mutex<u64>,
        edits: Mutex<Vec<MessageId>>,
    }

    impl FakeChannel {
        fn chat(&self) {
            let id = self.allocate();
            self.messages.lock().push(id);
        }

        fn allocate(&self) -> MessageId {
            let mut next = self.next_id.lock();
            *next += 1;
            MessageId::new(*next)
        }
    }

    #[async_trait]
    impl ReminderChannel for FakeChannel {
        async fn latest_message(&self, _channel_id: ChannelId) -> Result<Option<MessageId>> {
            Ok(self.messages.lock().last().copied())
        }

        async fn send(&self, _channel_id: ChannelId, _content: &str) -> Result<MessageId> {
            let id = self.allocate();
            self.messages.lock().push(id);
            Ok(id)
        }

        async fn edit(&self, _channel_id: ChannelId, message_id: MessageId, _content: &str) -> Result<()> {
            if !self.messages.lock().contains(&message_id) {
                return Err(BotError::Discord {
                    message: "Unknown Message".to_string(),
                });
            }
            self.edits.lock().push(message_id);
            Ok(())
        }

        async fn delete(&self, _channel_id: ChannelId, message_id: MessageId) -> Result<()> {
            self.messages.lock().retain(|m| *m != message_id);
            Ok(())
        }
    }

    fn setup() -> (ReminderManager, Arc<FakeChannel>) {
        let channel = Arc::new(FakeChannel::default());
        let manager = ReminderManager::new(
            create_shared_reminder_store(ReminderStore::default()),
            channel.clone(),
            None,
        );
        (manager, channel)
    }

    fn new_reminder() -> NewReminder {
        NewReminder {
            guild_id: GuildId::new(1),
            channel_id: ChannelId::new(2),
            clan_tag: "2pp".to_string(),
            clan_name: "Owls".to_string(),
            body: "TH13+".to_string(),
            interval_minutes: 60,
        }
    }

    #[test]
    fn test_decide_action() {
        let now = Utc::now();
        let mut reminder = RecruitingReminder {
            id: "r".to_string(),
            guild_id: GuildId::new(1),
            channel_id: ChannelId::new(2),
            clan_tag: "#2PP".to_string(),
            clan_name: "Owls".to_string(),
            body: String::new(),
            interval_minutes: 60,
            active_message: None,
            last_posted_at: None,
            enabled: true,
        };

        assert_eq!(
            decide_action(&reminder, None, now),
            ReminderAction::Resend { delete_previous: None }
        );

        reminder.active_message = Some(MessageId::new(10));
        reminder.last_posted_at = Some(now - chrono::Duration::hours(2));
        assert_eq!(
            decide_action(&reminder, Some(MessageId::new(10)), now),
            ReminderAction::EditInPlace(MessageId::new(10))
        );
        assert_eq!(
            decide_action(&reminder, Some(MessageId::new(11)), now),
            ReminderAction::Resend {
                delete_previous: Some(MessageId::new(10))
            }
        );

        reminder.last_posted_at = Some(now);
        assert_eq!(decide_action(&reminder, Some(MessageId::new(11)), now), ReminderAction::Skip);
    }

    #[tokio::test]
    async fn test_tick_edits_when_still_latest_and_resends_otherwise() {
        let (manager, channel) = setup();
        let reminder = manager.add_reminder(new_reminder()).await.unwrap();
        assert_eq!(reminder.clan_tag, "#2PP");

        let t0 = Utc::now();
        let first = manager.tick(t0).await;
        assert!(matches!(first[0].1, ReminderAction::Resend { delete_previous: None }));
        let posted = *channel.messages.lock().last().unwrap();

        // Not due again until the interval has passed
        assert!(manager.tick(t0 + chrono::Duration::minutes(30)).await.is_empty());

        let t1 = t0 + chrono::Duration::minutes(61);
        let second = manager.tick(t1).await;
        assert_eq!(second[0].1, ReminderAction::EditInPlace(posted));
        assert_eq!(*channel.edits.lock(), vec![posted]);

        channel.chat();
        let t2 = t1 + chrono::Duration::minutes(61);
        let third = manager.tick(t2).await;
        assert_eq!(
            third[0].1,
            ReminderAction::Resend {
                delete_previous: Some(posted)
            }
        );
        assert!(!channel.messages.lock().contains(&posted));
    }

    #[tokio::test]
    async fn test_remove_reminder_deletes_message() {
        let (manager, channel) = setup();
        let reminder = manager.add_reminder(new_reminder()).await.unwrap();
        manager.tick(Utc::now()).await;
        assert_eq!(channel.messages.lock().len(), 1);

        manager.remove_reminder(&reminder.id).await.unwrap();
        assert!(channel.messages.lock().is_empty());
        assert!(manager.remove_reminder(&reminder.id).await.is_err());
    }

    #[tokio::test]
    async fn test_scheduler_stops_on_shutdown() {
        let (manager, _) = setup();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_scheduler(Arc::new(manager), 1, rx));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
