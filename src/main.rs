use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;

use pardeblur::command;
use pardeblur::command::constants::{DEFAULT_LOG_LEVEL, DEFAULT_LOG_MODE, DEFAULT_LOG_PATH};
use pardeblur::runtime::{self, LogLevel, LogMode};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long = "log-level", global = true, default_value = DEFAULT_LOG_LEVEL)]
    log_level: LogLevel,

    // terminal, path or discard
    #[arg(long = "log-mode", global = true, default_value = DEFAULT_LOG_MODE)]
    log_mode: LogMode,

    #[arg(long = "log-path", global = true, default_value = DEFAULT_LOG_PATH)]
    log_path: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Split, denoise each sample in parallel, and merge
    Workflow(command::WorkflowCMD),
    /// Split a combined sequence file by sample
    Split(command::SplitCMD),
    /// Denoise one partition
    Denoise(command::DenoiseCMD),
    /// Merge per-sample feature tables
    Merge(command::MergeCMD),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = runtime::setup_global_logger(cli.log_level, cli.log_mode, &cli.log_path) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Commands::Workflow(mut cmd) => cmd.try_execute(),
        Commands::Split(mut cmd) => cmd.try_execute(),
        Commands::Denoise(mut cmd) => cmd.try_execute(),
        Commands::Merge(mut cmd) => cmd.try_execute(),
    };

    if let Err(e) = result {
        //The terminal logger writes to stderr already
        if cli.log_mode == LogMode::Path {
            error!("{:#}", e);
        }
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
