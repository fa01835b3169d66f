mod api;
mod callback;
mod commands;
mod config;
mod db;
mod routes;
mod session;

use api::CollectionKind;
use armory_core::{AchievementFilter, ArmoryError};
use clap::{Parser, Subcommand};
use commands::App;
use config::Config;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "armory", version, about = "Character armory and achievement tracker")]
struct Cli {
    /// Path to config.toml
    #[arg(long, env = "ARMORY_CONFIG", default_value = config::CONFIG_PATH)]
    config: PathBuf,

    /// Override the API base URL from the config file
    #[arg(long, env = "ARMORY_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in through the identity provider
    Login {
        /// Keep the session across runs
        #[arg(long)]
        remember: bool,
    },
    Logout,
    /// Show the current session
    Status,
    /// Check a client route against the auth guard
    Open { route: String },
    /// Profile, equipment and media
    Character { realm: String, name: String },
    /// Achievement progress, or one category's achievements
    Achievements {
        realm: String,
        name: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "all")]
        filter: AchievementFilter,
        /// Count only the last step of each achievement chain
        #[arg(long)]
        exclude_chains: bool,
    },
    /// Show the chain an achievement belongs to
    Chain { realm: String, name: String, id: u64 },
    Reputations { realm: String, name: String },
    /// Best Mythic+ runs per dungeon
    Instances {
        realm: String,
        name: String,
        /// Season id; defaults to the current season
        #[arg(long)]
        season: Option<u64>,
    },
    /// Collected mounts, pets, toys, heirlooms or transmogs
    Collections {
        realm: String,
        name: String,
        kind: CollectionKind,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "armory=info,armory_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", user_message(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> armory_core::Result<()> {
    let mut config = Config::load(&cli.config);
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    config.validate()?;

    let app = App::new(config)?;
    match cli.command {
        Command::Login { remember } => app.login(remember).await,
        Command::Logout => app.logout().await,
        Command::Status => app.status().await,
        Command::Open { route } => app.open(&route).await,
        Command::Character { realm, name } => app.character(&realm, &name).await,
        Command::Achievements {
            realm,
            name,
            category,
            filter,
            exclude_chains,
        } => {
            app.achievements(&realm, &name, category.as_deref(), filter, exclude_chains)
                .await
        }
        Command::Chain { realm, name, id } => app.chain(&realm, &name, id).await,
        Command::Reputations { realm, name } => app.reputations(&realm, &name).await,
        Command::Instances { realm, name, season } => app.instances(&realm, &name, season).await,
        Command::Collections { realm, name, kind } => app.collections(&realm, &name, kind).await,
    }
}

/// Backend failures (status errors, unreachable host, request timeouts) get a
/// generic retry hint; everything else is shown as is
fn user_message(error: &ArmoryError) -> String {
    match error {
        ArmoryError::Api { .. } | ArmoryError::Network(_) => {
            "Could not reach the armory service. Please try again in a moment.".to_string()
        }
        other => other.to_string(),
    }
}
