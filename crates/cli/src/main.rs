mod commands;

use clap::{Parser, Subcommand};
use commands::*;
use goose_core::{init_logging, LoggingConfig};

#[derive(Parser)]
#[command(name = "goose")]
#[command(about = "Versioned SQL migrations for PostgreSQL, Redshift, MySQL and TiDB")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply all pending migrations
    Up,

    /// Apply pending migrations up to and including VERSION
    UpTo {
        /// Target version
        version: i64,
    },

    /// Revert the most recently applied migration
    Down,

    /// Revert migrations down to VERSION (exclusive)
    DownTo {
        /// Version to stop at
        version: i64,
    },

    /// Revert and re-apply the current migration
    Redo,

    /// Revert every applied migration
    Reset,

    /// Show the state of every migration
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the current database version
    Version,

    /// Create a new migration file
    Create {
        /// Migration name
        name: String,
    },

    /// Create the database named in the connection string
    CreateDb {
        /// Succeed if the database already exists
        #[arg(long)]
        soft: bool,
    },

    /// Drop the database named in the connection string
    DropDb {
        /// Succeed if the database does not exist
        #[arg(long)]
        soft: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logging = if cli.global.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::default()
    };
    init_logging(logging.with_format(cli.global.log_format))?;

    let args = &cli.global;
    match cli.command {
        Commands::Up => migrate::up(args, None).await?,
        Commands::UpTo { version } => migrate::up(args, Some(version)).await?,
        Commands::Down => migrate::down(args, None).await?,
        Commands::DownTo { version } => migrate::down(args, Some(version)).await?,
        Commands::Redo => migrate::redo(args).await?,
        Commands::Reset => migrate::reset(args).await?,
        Commands::Status { json } => migrate::status(args, json).await?,
        Commands::Version => migrate::version(args).await?,
        Commands::Create { name } => migrate::create(args, &name)?,
        Commands::CreateDb { soft } => database::create_db(args, soft).await?,
        Commands::DropDb { soft } => database::drop_db(args, soft).await?,
    }

    Ok(())
}
