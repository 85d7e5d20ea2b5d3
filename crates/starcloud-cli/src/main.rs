mod commands;
mod config;
mod env;
mod logging;
mod progress;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::download::DownloadArgs;
use crate::commands::refill::RefillArgs;
use crate::commands::validate::ValidateArgs;

#[derive(Parser)]
#[command(name = "starcloud")]
#[command(about = "Download CSDC satellite tiles from StarCloud and check local completeness")]
struct Cli {
    /// Config file (defaults to ~/.config/starcloud/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download every file of a tile for a range of years
    Download {
        /// Tile id, e.g. 31UFS
        tile: String,
        #[arg(long, default_value_t = 2000)]
        start_year: i32,
        #[arg(long, default_value_t = 2022)]
        end_year: i32,
        /// Root directory; files land in <DIR>/<year>/<tile>/
        #[arg(short, long = "output-dir", default_value = ".")]
        output: PathBuf,
        /// Bytes per write (defaults to the configured chunk size)
        #[arg(short, long)]
        chunk_size: Option<usize>,
        /// File with STAR_EMAIL and STAR_PASSWORD
        #[arg(short, long, default_value = ".env")]
        env_file: PathBuf,
        /// Disable progress bars
        #[arg(long)]
        no_progress: bool,
        /// Download everything, ignoring files already on disk
        #[arg(long)]
        force: bool,
    },
    /// Run one cluster array task, configured through the environment
    Task {
        /// File with STAR_EMAIL and STAR_PASSWORD
        #[arg(short, long, default_value = ".env")]
        env_file: PathBuf,
    },
    /// Compare local files against the archive listing
    Validate {
        /// Root directory containing <year>/<tile>/
        root: PathBuf,
        /// Years to check
        #[arg(required = true)]
        years: Vec<i32>,
        /// Restrict to these tiles (defaults to the configured catalogue)
        #[arg(long = "tile")]
        tiles: Vec<String>,
        /// Write a per-file CSV report
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Download only the files that validation reports as not complete
    Refill {
        /// Years, or a single A-B range (end exclusive)
        #[arg(long, required = true, num_args = 1..)]
        years: Vec<String>,
        /// Root directory (defaults to $S_ROOT_DIR)
        #[arg(long)]
        root: Option<PathBuf>,
        /// Only report what is missing
        #[arg(long)]
        check: bool,
        /// File with STAR_EMAIL, STAR_PASSWORD and optionally S_ROOT_DIR
        #[arg(short, long, default_value = ".env")]
        env_file: PathBuf,
        /// Disable progress bars
        #[arg(long)]
        no_progress: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logger();

    let app_config = config::load_config(cli.config.as_deref());

    match cli.command {
        Command::Download {
            tile,
            start_year,
            end_year,
            output,
            chunk_size,
            env_file,
            no_progress,
            force,
        } => {
            commands::download::run(
                &app_config,
                DownloadArgs {
                    tile,
                    start_year,
                    end_year,
                    output,
                    chunk_size,
                    env_file,
                    no_progress,
                    force,
                },
            )
            .await
        }
        Command::Task { env_file } => commands::task::run(&app_config, &env_file).await,
        Command::Validate {
            root,
            years,
            tiles,
            csv,
        } => {
            commands::validate::run(
                &app_config,
                ValidateArgs {
                    root,
                    years,
                    tiles,
                    csv,
                },
            )
            .await
        }
        Command::Refill {
            years,
            root,
            check,
            env_file,
            no_progress,
        } => {
            commands::refill::run(
                &app_config,
                RefillArgs {
                    years,
                    root,
                    check,
                    env_file,
                    no_progress,
                },
            )
            .await
        }
    }
}
