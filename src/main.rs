//! LoL Smart Stats - command line entry point
//!
//! Drives the authenticated API client from a terminal: log in, inspect the
//! session, call endpoints and evaluate the navigation guard.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use lolstats_client::{commands, config::ClientConfig, logging, AppState};

#[derive(Parser)]
#[command(name = "lolstats", version, about = "LoL Smart Stats API client")]
struct Cli {
    /// Backend base URL
    #[arg(long, env = "LOLSTATS_API_URL")]
    api_url: Option<String>,

    /// Directory holding the persisted session and logs
    #[arg(long, env = "LOLSTATS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the issued tokens
    Login { email: String, password: String },
    /// Create an account and log in with it
    Register {
        email: String,
        password: String,
        #[arg(long)]
        nickname: Option<String>,
    },
    /// Revoke the refresh token and clear the stored session
    Logout,
    /// Exchange the stored refresh token for a new access token
    Refresh,
    /// Show the logged-in user's profile
    Me,
    /// Show whether a session is stored
    Session,
    /// Send a request through the authenticated pipeline
    Call {
        method: String,
        path: String,
        /// JSON request body
        body: Option<String>,
    },
    /// Check whether a view may be opened with the current session
    Route { path: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().context("Invalid configuration")?;
    if let Some(url) = cli.api_url {
        config.base_url = url;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }
    config.validate().context("Invalid configuration")?;

    let _log_guard =
        logging::init(config.data_dir.as_deref()).context("Failed to initialize logging")?;
    info!("LoL Smart Stats client starting against {}", config.base_url);

    let state = AppState::from_config(config).context("Failed to initialize client")?;

    let result = run(&state, cli.command).await;

    for notification in state.notifications.drain() {
        eprintln!("! {}", notification.message);
    }
    if let Some(path) = state.redirects.last() {
        eprintln!("Session ended; continue at {}", path);
    }

    if let Some(output) = result? {
        println!("{}", output);
    }
    Ok(())
}

async fn run(state: &AppState, command: Command) -> Result<Option<String>> {
    match command {
        Command::Login { email, password } => {
            render(&commands::login(state, &email, &password).await?)
        }
        Command::Register {
            email,
            password,
            nickname,
        } => render(&commands::register(state, &email, &password, nickname.as_deref()).await?),
        Command::Logout => {
            commands::logout(state).await?;
            Ok(None)
        }
        Command::Refresh => render(&commands::refresh(state).await?),
        Command::Me => render(&commands::me(state).await?),
        Command::Session => render(&commands::get_stored_session(state)),
        Command::Call { method, path, body } => {
            render(&commands::call(state, &method, &path, body.as_deref()).await?)
        }
        Command::Route { path } => render(&commands::route(state, &path)?),
    }
}

fn render<T: Serialize>(value: &T) -> Result<Option<String>> {
    Ok(Some(serde_json::to_string_pretty(value)?))
}
