pub mod clan;
pub mod group;
pub mod league_group;
pub mod registration;
pub mod roster;
pub mod season;

pub use clan::{CwlSeasonRecord, LeagueClan};
pub use group::{validate_lineup, CwlGroup, CwlWar, GroupClan};
pub use league_group::LeagueGroup;
pub use registration::{
    registration_key, upsert_registration, PlayerRegistration, RegistrationRequest,
    RegistrationStatus, Upserted,
};
pub use roster::{Roster, RosterChange, RosterEntry, RosterState};
pub use season::{RegistrationWindow, SeasonId, SeasonPhase};
