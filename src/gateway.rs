use serenity::async_trait;
use serenity::model::gateway::Ready;
use serenity::prelude::{Context, EventHandler};
use std::sync::Arc;
use tracing::{info, warn};

use crate::Data;

/// Gateway listener. Business actions arrive through the managers, the
/// gateway is only used to confirm the bot can see its guild.
pub struct Handler {
    data: Arc<Data>,
}

impl Handler {
    pub fn new(data: Arc<Data>) -> Self {
        Self { data }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("Bot logged in as: {} ({} guilds)", ready.user.name, ready.guilds.len());

        match self.data.config.guild_id {
            Some(guild_id) if ready.guilds.iter().any(|g| g.id == guild_id) => {
                info!("Managing guild {}", guild_id);
            }
            Some(guild_id) => {
                warn!("Configured guild {} is not among the bot's guilds, role sync will fail", guild_id);
            }
            None => warn!("No guild_id configured, CWL role sync is disabled"),
        }
    }
}
