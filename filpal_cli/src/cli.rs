//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(name = "filpal", version, about = "Filament calibration and correction")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/filpal.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run host command lines against a simulated printer
    Exec {
        /// Command lines, e.g. "FILPAL_UPDATER LOOKUP=1"
        #[arg(required = true, value_name = "LINE")]
        lines: Vec<String>,
        /// Longest simulated wait for a heater during a swap, in seconds
        #[arg(long, value_name = "SECONDS", default_value_t = 1200.0)]
        max_wait_s: f64,
    },
    /// Parse a file on the SD card and annotate it in place
    Parse {
        /// File name inside paths.sdcard_dir
        file: String,
    },
    /// Fit a correction curve and print its coefficients
    Fit {
        /// Target values, comma separated
        #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
        observed: Vec<f64>,
        /// Commanded values, comma separated
        #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
        commanded: Vec<f64>,
        /// Highest polynomial degree for long series
        #[arg(long, default_value_t = 2)]
        max_degree: usize,
    },
    /// Print a filament profile (default: the loaded one)
    Show {
        #[arg(long, value_name = "FILA_ID")]
        id: Option<String>,
    },
}
