mod lookup;
mod pending;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::pending::PendingCommands;

#[derive(Debug, Parser)]
#[command(name = "leadfunnel-cli")]
#[command(about = "Lead funnel operator command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve and enrich one property
    Lookup {
        /// Free-text address; the first autocomplete match is used
        #[arg(required_unless_present = "place_id", conflicts_with = "place_id")]
        address: Vec<String>,
        /// Place id from a previous `suggest`
        #[arg(long)]
        place_id: Option<String>,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show autocomplete suggestions for an address fragment
    Suggest {
        #[arg(required = true)]
        input: Vec<String>,
    },
    /// Inspect or re-submit parked lead submissions
    Pending {
        #[command(subcommand)]
        command: PendingCommands,
    },
    /// Database utilities
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check the database connection
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("leadfunnel-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = leadfunnel_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match command {
        Commands::Lookup {
            address,
            place_id,
            json,
        } => {
            let target = match place_id {
                Some(id) => lookup::LookupTarget::PlaceId(id),
                None => lookup::LookupTarget::Address(address.join(" ")),
            };
            lookup::run_lookup(&config, target, json).await
        }
        Commands::Suggest { input } => lookup::run_suggest(&config, &input.join(" ")).await,
        Commands::Pending { command } => match command {
            PendingCommands::List => pending::run_pending_list(&config).await,
            PendingCommands::Flush { no_backoff } => {
                pending::run_pending_flush(&config, no_backoff).await
            }
        },
        Commands::Db { command } => run_db(&config, &command).await,
    }
}

async fn run_db(config: &leadfunnel_core::AppConfig, command: &DbCommands) -> anyhow::Result<()> {
    let pool = pending::connect(config).await?;
    match command {
        DbCommands::Ping => {
            leadfunnel_db::health_check(&pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            leadfunnel_db::run_migrations(&pool).await?;
            println!("migrations applied");
        }
    }
    Ok(())
}
