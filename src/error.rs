use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    // Configuration errors
    #[error("Failed to load config file '{path}': {source}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {message}")]
    ConfigValidation { message: String },

    // State errors
    #[error("Failed to save state to '{path}': {source}")]
    StateSave {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load state from '{path}': {source}")]
    StateLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse state file '{path}': {source}")]
    StateParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    // Player tag errors
    #[error("Invalid player tag: {tag}")]
    InvalidTag { tag: String },

    // CWL errors
    #[error("Invalid season '{season}', expected YYYY-MM")]
    InvalidSeason { season: String },

    #[error("Registration for season {season} is closed")]
    RegistrationClosed { season: String },

    #[error("Season {season} is in phase {phase}, expected {expected}")]
    WrongPhase {
        season: String,
        phase: String,
        expected: String,
    },

    #[error("{tag} is not registered for season {season}")]
    NotRegistered { season: String, tag: String },

    #[error("{tag} is already rostered in {clan}")]
    AlreadyRostered { tag: String, clan: String },

    #[error("{tag} is registered for group {player_group} and cannot play in group {clan_group}")]
    IneligibleGroup {
        tag: String,
        player_group: String,
        clan_group: String,
    },

    #[error("Roster of {clan} has {count} players, at least {min} are required")]
    RosterTooSmall { clan: String, count: usize, min: usize },

    #[error("Roster of {clan} would exceed the maximum of {max} players")]
    RosterTooLarge { clan: String, max: usize },

    #[error("Roster of {clan} is finalized")]
    RosterFinalized { clan: String },

    #[error("Invalid lineup: {message}")]
    InvalidLineup { message: String },

    #[error("Invalid league group: {message}")]
    InvalidGroup { message: String },

    // Application errors
    #[error("Application {id} is already linked to a ticket")]
    TicketAlreadyLinked { id: String },

    #[error("Invalid application: {message}")]
    InvalidApplication { message: String },

    // Event errors
    #[error("Registration for '{event}' is not open")]
    EventClosed { event: String },

    #[error("'{event}' is full ({capacity} participants)")]
    EventFull { event: String, capacity: usize },

    #[error("Only {limit} account(s) per user may join '{event}'")]
    TooManyTags { event: String, limit: usize },

    #[error("{tag} does not meet the Town Hall {required} requirement")]
    TownHallTooLow { tag: String, required: u8 },

    // Shop errors
    #[error("Insufficient balance: {balance} available, {price} required")]
    InsufficientFunds { balance: u64, price: u64 },

    #[error("'{item}' is out of stock")]
    OutOfStock { item: String },

    #[error("'{item}' can only be purchased once")]
    AlreadyOwned { item: String },

    // Discord errors
    #[error("Discord API error: {message}")]
    Discord { message: String },

    // Permission errors
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    // Generic errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BotError {
    /// Whether the error is a rejected user action rather than a failure of the bot
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            BotError::ConfigLoad { .. }
                | BotError::ConfigParse { .. }
                | BotError::ConfigValidation { .. }
                | BotError::StateSave { .. }
                | BotError::StateLoad { .. }
                | BotError::StateParse { .. }
                | BotError::Discord { .. }
                | BotError::Internal { .. }
        )
    }

    /// Text shown to the user at the interaction boundary
    pub fn user_message(&self) -> String {
        if self.is_user_error() {
            crate::messages::rejected_message(&self.to_string())
        } else {
            crate::messages::failure_message()
        }
    }
}

impl From<serenity::Error> for BotError {
    fn from(err: serenity::Error) -> Self {
        BotError::Discord {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for BotError {
    fn from(err: std::io::Error) -> Self {
        BotError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Internal {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
