pub mod raid_summary;
pub mod war;
pub mod war_summary;

pub use raid_summary::{PlayerRaidSummary, RaidMember, RaidState, RaidSummary, RaidWeekend};
pub use war::{WarAttack, WarMember, WarRecord, WarResult, WarSide, WarState, WarType};
pub use war_summary::{ClanWarSummary, HitRate, PlayerWarSummary};
