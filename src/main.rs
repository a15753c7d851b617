// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use log::{LevelFilter, Log, Metadata, Record, Level, SetLoggerError};
use std::io::Write;
use std::path::PathBuf;
use clap::{Parser, ValueEnum, CommandFactory, Subcommand};
use clap_complete::{generate, Shell};

use crate::app_config::{Config, OutputFormat};
use app_controller::{Controller, MergeRequest};

mod app_config;
mod app_controller;
mod alignment;
mod chapters;
mod errors;
mod file_utils;
mod merge;
mod playlist;
mod subtitle_processor;

/// CLI Wrapper for OutputFormat to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliOutputFormat {
    Srt,
    Ass,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(cli_format: CliOutputFormat) -> Self {
        match cli_format {
            CliOutputFormat::Srt => OutputFormat::Srt,
            CliOutputFormat::Ass => OutputFormat::Ass,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Merge per-episode subtitles against a disc's main playlist (default command)
    Merge(MergeArgs),

    /// List ranked main-playlist candidates for a disc
    Scan {
        /// Disc root containing a BDMV directory
        #[arg(value_name = "DISC_ROOT")]
        disc_root: PathBuf,

        /// Configuration file path
        #[arg(short, long, default_value = "conf.json")]
        config_path: String,
    },

    /// Generate shell completions for bdsubmerge
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct MergeArgs {
    /// Disc root containing a BDMV directory (mounted image or folder)
    #[arg(value_name = "DISC_ROOT")]
    disc_root: PathBuf,

    /// Directory holding the per-episode subtitle files
    #[arg(value_name = "SUBTITLES_DIR")]
    subtitles_dir: PathBuf,

    /// Output directory for the merged subtitle and chapter files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Playlist to merge against: a rank from `scan` or an .mpls file stem
    #[arg(short, long)]
    playlist: Option<String>,

    /// JSON file with mapping overrides (assignments, manual offsets, skips)
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// Where to write the OGM chapter file
    #[arg(long)]
    chapters: Option<PathBuf>,

    /// Output subtitle format (defaults to the input tracks' format)
    #[arg(long, value_enum)]
    format: Option<CliOutputFormat>,

    /// Anomaly tolerance in seconds
    #[arg(short, long)]
    tolerance: Option<f64>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// bdsubmerge - Blu-ray subtitle alignment and merging
///
/// Aligns one subtitle file per broadcast episode to the segment timeline of
/// a disc's main playlist, corrects every timestamp by the cumulative disc
/// time before its segment, and writes one merged subtitle track plus an OGM
/// chapter list for external injection.
#[derive(Parser, Debug)]
#[command(name = "bdsubmerge")]
#[command(version)]
#[command(about = "Align per-episode subtitles to a Blu-ray main playlist")]
#[command(long_about = "bdsubmerge parses a disc's MPLS playlists, pairs per-episode subtitle files
with playlist segments, and emits a single merged subtitle track with
disc-accurate timestamps plus a chapter list.

EXAMPLES:
    bdsubmerge scan /mnt/disc                        # List playlist candidates
    bdsubmerge /mnt/disc ./subs -o ./out             # Merge against the top candidate
    bdsubmerge /mnt/disc ./subs -p 00001             # Merge against a named playlist
    bdsubmerge /mnt/disc ./subs --overrides map.json # Apply manual mapping overrides
    bdsubmerge /mnt/disc ./subs --format srt         # Force SRT output
    bdsubmerge completions bash > bdsubmerge.bash    # Generate bash completions

CONFIGURATION:
    Configuration is read from conf.json by default; a missing file falls
    back to built-in defaults. Command-line flags win over the config file.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Disc root containing a BDMV directory (mounted image or folder)
    #[arg(value_name = "DISC_ROOT")]
    disc_root: Option<PathBuf>,

    /// Directory holding the per-episode subtitle files
    #[arg(value_name = "SUBTITLES_DIR")]
    subtitles_dir: Option<PathBuf>,

    /// Output directory for the merged subtitle and chapter files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Playlist to merge against: a rank from `scan` or an .mpls file stem
    #[arg(short, long)]
    playlist: Option<String>,

    /// JSON file with mapping overrides (assignments, manual offsets, skips)
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// Where to write the OGM chapter file
    #[arg(long)]
    chapters: Option<PathBuf>,

    /// Output subtitle format (defaults to the input tracks' format)
    #[arg(long, value_enum)]
    format: Option<CliOutputFormat>,

    /// Anomaly tolerance in seconds
    #[arg(short, long)]
    tolerance: Option<f64>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default
    // We'll update the level after loading the config if needed
    CustomLogger::init(LevelFilter::Info)?;

    // Parse command line arguments using clap
    let cli = CommandLineOptions::parse();

    // Handle subcommands
    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "bdsubmerge", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Scan { disc_root, config_path }) => {
            let config = Config::from_file_or_default(&config_path)?;
            log::set_max_level(config.log_level.to_level_filter());
            let controller = Controller::with_config(config)?;
            controller.run_scan(&disc_root).await
        }
        Some(Commands::Merge(args)) => run_merge(args).await,
        None => {
            // Default behavior - top-level positional args behave like `merge`
            let (Some(disc_root), Some(subtitles_dir)) = (cli.disc_root, cli.subtitles_dir) else {
                return Err(anyhow::anyhow!(
                    "DISC_ROOT and SUBTITLES_DIR are required when no subcommand is given"
                ));
            };
            let args = MergeArgs {
                disc_root,
                subtitles_dir,
                output_dir: cli.output_dir,
                playlist: cli.playlist,
                overrides: cli.overrides,
                chapters: cli.chapters,
                format: cli.format,
                tolerance: cli.tolerance,
                force_overwrite: cli.force_overwrite,
                config_path: cli.config_path,
                log_level: cli.log_level,
            };
            run_merge(args).await
        }
    }
}

async fn run_merge(options: MergeArgs) -> Result<()> {
    // If log level is set via command line, apply it immediately
    if let Some(cmd_log_level) = &options.log_level {
        let config_log_level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(config_log_level.to_level_filter());
    }

    let mut config = Config::from_file_or_default(&options.config_path)?;

    // Command-line flags win over the config file
    if let Some(log_level) = options.log_level {
        config.log_level = log_level.into();
    }
    if let Some(tolerance) = options.tolerance {
        config.tolerance_secs = tolerance;
    }
    if let Some(format) = options.format {
        config.output_format = Some(format.into());
    }
    log::set_max_level(config.log_level.to_level_filter());

    let controller = Controller::with_config(config)?;
    let outcome = controller
        .run_merge(MergeRequest {
            disc_root: options.disc_root,
            subtitles_dir: options.subtitles_dir,
            output_dir: options.output_dir,
            playlist: options.playlist,
            overrides_path: options.overrides,
            chapters_path: options.chapters,
            force_overwrite: options.force_overwrite,
        })
        .await?;

    println!("merged subtitle: {}", outcome.subtitle_path.display());
    println!("chapter file:    {}", outcome.chapters_path.display());
    Ok(())
}
