use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serenity::http::Http;
use serenity::prelude::GatewayIntents;
use serenity::Client;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Clan community steward: CWL rosters, applications, events and the vault
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log at debug level
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect to Discord and post recruiting reminders (default)
    Run,

    /// Print the state of a CWL season and the recent log
    Status {
        /// Season as YYYY-MM, defaults to the current month
        #[arg(long)]
        season: Option<String>,

        #[arg(long, default_value_t = 20)]
        log_lines: usize,
    },

    /// End a CWL season: war summaries and CWL role cleanup
    Finalize {
        #[arg(long)]
        season: String,
    },

    /// Print the season's rosters as JSON
    Export {
        #[arg(long)]
        season: String,
    },
}

mod config;
mod cwl;
mod error;
mod gateway;
mod locks;
mod logging;
mod managers;
mod messages;
mod ranks;
mod state;
mod stats;
mod tag;

use config::BotConfig;
use cwl::SeasonId;
use managers::{
    create_shared_application_manager, create_shared_cwl_manager, create_shared_event_manager,
    create_shared_reminder_manager, create_shared_vault_manager, run_scheduler, DiscordReminderChannel,
    DiscordRoleSync, LoggingRoleSync, SharedApplicationManager, SharedCwlManager, SharedEventManager,
    SharedReminderManager, SharedRoleSync, SharedVaultManager,
};
use state::{
    create_shared_application_store, create_shared_cwl_database, create_shared_event_store,
    create_shared_reminder_store, create_shared_vault_store, load_state, state_path, ApplicationStore,
    CwlDatabase, EventStore, ReminderStore, StateFile, VaultStore,
};

/// Shared application state
pub struct Data {
    pub config: Arc<BotConfig>,
    pub cwl: SharedCwlManager,
    pub applications: SharedApplicationManager,
    pub events: SharedEventManager,
    pub reminders: Option<SharedReminderManager>,
    pub vault: SharedVaultManager,
}

/// Load a store, falling back to an empty one
async fn load_store<T: StateFile>(state_dir: &str) -> (T, String) {
    let path = state_path::<T>(state_dir);
    info!("Loading {}...", path);
    let store = load_state::<T>(&path).await.unwrap_or_else(|e| {
        warn!("Could not load {}: {}, starting empty", path, e);
        T::default()
    });
    (store, path)
}

/// Log the application ID encoded in the first token segment
fn log_bot_id(token: &str) {
    use base64::Engine;

    let Some(bot_id_b64) = token.split('.').next() else {
        return;
    };
    let decoded = base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(bot_id_b64)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(bot_id_b64));
    if let Ok(id_str) = decoded.map(String::from_utf8) {
        match id_str {
            Ok(id) => info!("Bot ID: {} (invite needs the Manage Roles permission)", id),
            Err(_) => warn!("DISCORD_TOKEN does not start with a bot ID"),
        }
    }
}

async fn build_data(config: Arc<BotConfig>, state_dir: &str, http: Option<Arc<Http>>) -> Data {
    let roles: SharedRoleSync = match &http {
        Some(http) => Arc::new(DiscordRoleSync::new(http.clone())),
        None => {
            warn!("No DISCORD_TOKEN set, role changes are only logged");
            Arc::new(LoggingRoleSync)
        }
    };

    let (cwl_db, cwl_path) = load_store::<CwlDatabase>(state_dir).await;
    let (applications, applications_path) = load_store::<ApplicationStore>(state_dir).await;
    let (events, events_path) = load_store::<EventStore>(state_dir).await;
    let (reminders, reminders_path) = load_store::<ReminderStore>(state_dir).await;
    let (vault, vault_path) = load_store::<VaultStore>(state_dir).await;

    let reminders = http.map(|http| {
        create_shared_reminder_manager(
            create_shared_reminder_store(reminders),
            Arc::new(DiscordReminderChannel::new(http)),
            Some(reminders_path),
        )
    });

    Data {
        cwl: create_shared_cwl_manager(
            create_shared_cwl_database(cwl_db),
            roles.clone(),
            config.clone(),
            Some(cwl_path),
        ),
        applications: create_shared_application_manager(
            create_shared_application_store(applications),
            config.applications.clone(),
            Some(applications_path),
        ),
        events: create_shared_event_manager(
            create_shared_event_store(events),
            roles.clone(),
            config.events.clone(),
            Some(events_path),
        ),
        reminders,
        vault: create_shared_vault_manager(
            create_shared_vault_store(vault),
            roles,
            config.shop.clone(),
            Some(vault_path),
        ),
        config,
    }
}

async fn run(data: Arc<Data>, token: Option<String>) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = data.reminders.clone().map(|reminders| {
        tokio::spawn(run_scheduler(
            reminders,
            data.config.reminders.tick_seconds,
            shutdown_rx.clone(),
        ))
    });

    match token {
        Some(token) => {
            let mut client = Client::builder(&token, GatewayIntents::GUILDS)
                .event_handler(gateway::Handler::new(data.clone()))
                .await?;

            let shard_manager = client.shard_manager.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutting down...");
                    let _ = shutdown_tx.send(true);
                    shard_manager.shutdown_all().await;
                }
            });

            if let Err(e) = client.start().await {
                error!("Client error: {}", e);
            }
        }
        None => {
            info!("Running without a Discord connection, press Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            let _ = shutdown_tx.send(true);
        }
    }

    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            error!("Reminder scheduler panicked: {}", e);
        }
    }
    Ok(())
}

/// Pretty JSON on success, otherwise the message a user would be shown
fn render<T: serde::Serialize>(result: error::Result<T>) -> String {
    let json = result.and_then(|value| serde_json::to_string_pretty(&value).map_err(error::BotError::from));
    match json {
        Ok(json) => json,
        Err(e) => {
            if !e.is_user_error() {
                error!("{}", e);
            }
            e.user_message()
        }
    }
}

async fn status(data: &Data, season: SeasonId) -> Result<()> {
    println!("{}", render(data.cwl.season_status(season).await));

    if let Some(guild_id) = data.config.guild_id {
        let now = chrono::Utc::now();
        let open = data.events.open_events(guild_id, now).await;
        println!("Open events: {}", open.len());
        for event in open {
            println!("  {} ({:?}), closes {}", event.name, event.kind, event.registration_closes);
        }
        println!("Shop items: {}", data.vault.items(guild_id).await.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let level = if args.verbose {
        tracing_subscriber::filter::LevelFilter::DEBUG
    } else {
        tracing_subscriber::filter::LevelFilter::INFO
    };
    let log_buffer = logging::init(level, 500);

    let data_path = std::env::var("DATA_PATH").unwrap_or_else(|_| "data".to_string());
    let state_dir = std::env::var("STATE_PATH").unwrap_or_else(|_| "state".to_string());
    tokio::fs::create_dir_all(&state_dir).await?;

    info!("Loading configuration from {}...", data_path);
    let config = Arc::new(BotConfig::load_from_file(&format!("{}/config.json", data_path))?);

    let token = std::env::var("DISCORD_TOKEN").ok().filter(|t| !t.trim().is_empty());
    if let Some(token) = &token {
        log_bot_id(token);
    }
    let http = token.as_deref().map(|t| Arc::new(Http::new(t)));

    let data = Arc::new(build_data(config, &state_dir, http).await);

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(data, token).await?,
        Command::Status { season, log_lines } => {
            let season = match season {
                Some(s) => s.parse::<SeasonId>()?,
                None => SeasonId::current(chrono::Utc::now()),
            };
            status(&data, season).await?;

            println!("\nRecent log:");
            for entry in log_buffer.get_recent(log_lines) {
                println!("{}", entry.format());
            }
        }
        Command::Finalize { season } => {
            let season = season.parse::<SeasonId>()?;
            println!("{}", render(data.cwl.finalize_season(season).await));
        }
        Command::Export { season } => {
            let season = season.parse::<SeasonId>()?;
            println!("{}", render(data.cwl.roster_export(season).await));
        }
    }

    Ok(())
}
