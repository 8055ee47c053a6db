pub mod application_store;
pub mod cwl_database;
pub mod event_store;
pub mod persist;
pub mod reminder_store;
pub mod vault_store;

pub use application_store::{
    create_shared_application_store, ApplicationAnswer, ApplicationStore, ClanApplication,
    SharedApplicationStore,
};
pub use cwl_database::{create_shared_cwl_database, CwlDatabase, SharedCwlDatabase};
pub use event_store::{
    create_shared_event_store, participant_key, Event, EventKind, EventStore, Participant,
    SharedEventStore,
};
pub use persist::{load_state, save_state, state_path, StateFile};
pub use reminder_store::{
    create_shared_reminder_store, RecruitingReminder, ReminderStore, SharedReminderStore,
};
pub use vault_store::{
    create_shared_vault_store, LedgerEntry, SharedVaultStore, ShopItem, Vault, VaultStore,
};
