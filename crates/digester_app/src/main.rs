use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use digester_app::config::{Config, FormatSetting};
use digester_logging::{digester_error, digester_warn, LogDestination, LogSettings};
use log::LevelFilter;
use tokio_util::sync::CancellationToken;

/// Build a reading digest from RSS feeds and Hacker News.
#[derive(Parser, Debug)]
#[command(name = "digester", version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Output path, overriding `digest.output_path`
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format, overriding `digest.format`
    #[arg(short, long, value_enum)]
    format: Option<FormatSetting>,

    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    digester_logging::initialize(log_settings(&cli));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            digester_error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Errors are reported only through the logger, so the terminal is always
/// one of its destinations.
fn log_settings(cli: &Cli) -> LogSettings {
    LogSettings {
        destination: match &cli.log_file {
            Some(path) => LogDestination::Both(path.clone()),
            None => LogDestination::Terminal,
        },
        level: if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(output) = cli.output {
        config.digest.output_path = output;
    }
    if let Some(format) = cli.format {
        config.digest.format = format;
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            digester_warn!("interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    let path = digester_app::run(&config, &cancel)
        .await
        .context("digest run failed")?;
    println!("{}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_logging_is_always_enabled() {
        let cli = Cli::parse_from(["digester", "--config", "c.toml"]);
        let settings = log_settings(&cli);
        assert_eq!(settings.destination, LogDestination::Terminal);
        assert_eq!(settings.level, LevelFilter::Info);

        let cli = Cli::parse_from(["digester", "-c", "c.toml", "--log-file", "run.log", "-v"]);
        let settings = log_settings(&cli);
        assert_eq!(settings.destination, LogDestination::Both(PathBuf::from("run.log")));
        assert_eq!(settings.level, LevelFilter::Debug);
    }
}
