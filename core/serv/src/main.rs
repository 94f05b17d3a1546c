use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use dsx_file_logging::{start_logger, DEFAULT_MODULE_OVERRIDES};

mod commands;

#[derive(Parser, Debug)]
#[clap(about, version)]
struct CliArgs {
    /// Directory holding the negotiation database
    #[clap(long = "datadir", env = "DSX_DATA_DIR", default_value = "dsx-data", global = true)]
    data_dir: PathBuf,

    /// Also write logs to daily rotated files in this directory
    #[clap(long, env = "DSX_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    /// Log at debug level regardless of RUST_LOG defaults
    #[clap(long, global = true)]
    debug: bool,

    #[clap(subcommand)]
    command: Command,
}

#[allow(clippy::large_enum_variant)]
#[derive(Subcommand, Debug)]
enum Command {
    /// Find offers of a manufacturer part's submodel
    Discover(commands::DiscoverArgs),
    /// Negotiate contracts for every offer of a request and wait for the outcome
    Subscribe(commands::SubscribeArgs),
    /// Obtain EDR tokens for the offers of a request and download the data
    Download(commands::DownloadArgs),
    /// Download data of assets whose transfer already completed
    Fetch(commands::FetchArgs),
    /// Show recorded negotiations of a process
    Status(commands::StatusArgs),
    /// Find or create twin shells and submodels for input rows
    Twin(commands::TwinArgs),
}

async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Discover(cmd) => cmd.run(&args.data_dir).await,
        Command::Subscribe(cmd) => cmd.run(&args.data_dir).await,
        Command::Download(cmd) => cmd.run(&args.data_dir).await,
        Command::Fetch(cmd) => cmd.run(&args.data_dir).await,
        Command::Status(cmd) => cmd.run(&args.data_dir).await,
        Command::Twin(cmd) => cmd.run().await,
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = CliArgs::parse();

    let _logger = match start_logger("info", args.log_dir.as_deref(), DEFAULT_MODULE_OVERRIDES, args.debug) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Failed to start logger: {:?}", e);
            None
        }
    };

    std::process::exit(match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            log::error!("Error: {:?}", e);
            1
        }
    });
}
