pub mod application_manager;
pub mod cwl_manager;
pub mod event_manager;
pub mod reminder_manager;
pub mod role_manager;
pub mod vault_manager;

pub use application_manager::{create_shared_application_manager, ApplicationManager, SharedApplicationManager};
pub use cwl_manager::{create_shared_cwl_manager, Actor, CwlManager, SharedCwlManager};
pub use event_manager::{create_shared_event_manager, EventManager, NewEvent, SharedEventManager};
pub use reminder_manager::{
    create_shared_reminder_manager, decide_action, run_scheduler, DiscordReminderChannel, NewReminder,
    ReminderAction, ReminderChannel, ReminderManager, SharedReminderChannel, SharedReminderManager,
};
pub use role_manager::{apply_role_changes, DiscordRoleSync, LoggingRoleSync, RoleSync, SharedRoleSync};
pub use vault_manager::{create_shared_vault_manager, NewItem, Receipt, SharedVaultManager, VaultManager};
