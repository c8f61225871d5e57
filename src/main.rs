use clap::Parser;
use fast_merge_lib::services::conflict_tracker::{DEFAULT_MAX_ATTEMPTS, PollConfig};
use fast_merge_lib::services::ConfigManager;
use fast_merge_lib::{AppError, BridgeOptions};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "fast-merge")]
#[command(author, version, about = "GitLab merge request helper speaking JSON lines on stdin/stdout", long_about = None)]
struct Cli {
    /// Directory holding fast-merge-config.json [default: platform config dir]
    #[arg(short, long, env = "FAST_MERGE_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Repository inspected by gitlab:getCurrentRepo
    #[arg(short, long, env = "FAST_MERGE_WORKSPACE", default_value = ".")]
    workspace: PathBuf,

    /// Delay between merge status polls, in milliseconds
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Polls per conflict check before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    poll_max_attempts: u32,

    /// Do not reload the config file when it changes
    #[arg(long, default_value_t = false)]
    no_watch: bool,
}

impl Cli {
    fn into_options(self) -> Result<BridgeOptions, AppError> {
        let storage_dir = match self.storage_dir {
            Some(dir) => dir,
            None => ConfigManager::default_storage_dir()?,
        };

        Ok(BridgeOptions {
            storage_dir,
            workspace: self.workspace,
            poll: PollConfig {
                interval: Duration::from_millis(self.poll_interval_ms),
                max_attempts: self.poll_max_attempts,
            },
            watch_config: !self.no_watch,
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries the protocol; env_logger writes to stderr.
    env_logger::init();

    let result = async {
        let options = Cli::parse().into_options()?;
        info!("Starting fast-merge (storage: {})", options.storage_dir.display());
        fast_merge_lib::run(options).await
    }
    .await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
