pub mod bot_config;
pub mod rank_requirements;

pub use bot_config::{
    ApplicationConfig, BotConfig, CwlConfig, EventConfig, ReminderConfig, RosterLimits,
    ShopConfig,
};
pub use rank_requirements::{RankRequirement, RankRequirements};
