mod cli;
mod error_fmt;
mod host;
mod run;

use clap::Parser;
use eyre::{Result, WrapErr};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE, json_mode};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(err) = run(cli) {
        if json_mode() {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: Cli) -> Result<()> {
    // `fit` is pure arithmetic and runs without a config file.
    if let Commands::Fit {
        observed,
        commanded,
        max_degree,
    } = &cli.cmd
    {
        init_tracing(cli.json, &cli.log_level, None);
        return run::run_fit(observed, commanded, *max_degree, cli.json);
    }

    let cfg = load_config(&cli.config)?;
    init_tracing(cli.json, &cli.log_level, Some(&cfg.logging));
    let mut filpal = filpal_core::Filpal::from_config(&cfg)?;

    match cli.cmd {
        Commands::Exec { lines, max_wait_s } => run::run_exec(&mut filpal, &lines, max_wait_s, cli.json),
        Commands::Parse { file } => run::run_parse(&mut filpal, &file, cli.json),
        Commands::Show { id } => run::run_show(&filpal, id.as_deref(), cli.json),
        Commands::Fit { .. } => Ok(()),
    }
}

fn load_config(path: &Path) -> Result<filpal_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = filpal_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}

/// Console logs to stderr (pretty or JSON), plus optional JSON lines to the
/// file named in `[logging]`. `RUST_LOG` overrides `--log-level`.
fn init_tracing(json: bool, level: &str, logging: Option<&filpal_config::Logging>) {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if json {
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    } else {
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter)
                .boxed(),
        );
    }

    if let Some(l) = logging
        && let Some(file) = l.file.as_deref()
    {
        let path = filpal_config::expand_home(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let name = path
            .file_name()
            .map_or_else(|| OsString::from("filpal.log"), ToOwned::to_owned);
        let appender = match l.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_level = l.level.as_deref().unwrap_or("info");
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(EnvFilter::new(file_level))
                .boxed(),
        );
    }

    let _ = tracing_subscriber::registry().with(layers).try_init();
}
