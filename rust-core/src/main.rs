//! contextd
//!
//! Reads `x y z` accelerometer lines from stdin, runs them through the
//! context service and prints every property change as a notification line
//! on stdout. Logs go to stderr.
//!
//! ```text
//! $ printf '60 960 18\n270 216 -972\n' | contextd --property Screen.IsCovered
//! Screen.IsCovered = bool:false
//! Screen.IsCovered = bool:true
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, EnvFilter};

use context_sensing::config::{DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE};
use context_sensing::source::parse_reading;
use context_sensing::{ContextProperty, ContextService, EngineConfig};

/// Accelerometer context daemon
#[derive(Parser)]
#[command(name = "contextd")]
#[command(version)]
#[command(about = "Publishes screen edge, flatness, cover and stability from accelerometer samples")]
struct Cli {
    /// Main configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config_file: PathBuf,

    /// Drop-in directory, every *.toml applied in name order
    #[arg(long, default_value = DEFAULT_CONFIG_DIR)]
    config_dir: PathBuf,

    /// Only print these properties (repeatable, default all)
    #[arg(long = "property", value_parser = parse_property)]
    properties: Vec<ContextProperty>,

    /// Print the effective configuration and exit
    #[arg(long)]
    dump_config: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_property(name: &str) -> Result<ContextProperty, String> {
    ContextProperty::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = ContextProperty::ALL.iter().map(|p| p.name()).collect();
        format!("unknown property '{name}', expected one of: {}", known.join(", "))
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let config = EngineConfig::load_layered(&cli.config_file, &cli.config_dir).with_env_overrides();

    if cli.dump_config {
        return match config.to_toml_string() {
            Ok(text) => {
                print!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize configuration");
                ExitCode::FAILURE
            }
        };
    }

    let handle = ContextService::spawn(&config);
    let mut subscription = match handle.subscribe(&cli.properties).await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::error!(error = %e, "failed to subscribe");
            return ExitCode::FAILURE;
        }
    };

    let printer = tokio::spawn(async move {
        while let Some(change) = subscription.recv().await {
            println!("{change}");
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_number: u64 = 0;
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        line_number += 1;
                        match parse_reading(&line) {
                            Ok(Some(reading)) => {
                                if handle.push_reading(reading.x, reading.y, reading.z).is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => tracing::warn!(line = line_number, error = %e, "skipping sample line"),
                        }
                    }
                    Ok(None) => {
                        tracing::info!(lines = line_number, "input closed");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to read input");
                        break;
                    }
                }
            }

            _ = &mut interrupted => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    if let Err(e) = handle.shutdown().await {
        tracing::warn!(error = %e, "service already stopped");
    }
    if let Err(e) = printer.await {
        tracing::error!(error = %e, "printer task failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["contextd"]);
        assert_eq!(cli.config_file, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert_eq!(cli.config_dir, PathBuf::from(DEFAULT_CONFIG_DIR));
        assert!(cli.properties.is_empty());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_property_filter() {
        let cli = Cli::parse_from([
            "contextd",
            "--property",
            "Screen.TopEdge",
            "--property",
            "Position.Stable",
            "-vv",
        ]);
        assert_eq!(
            cli.properties,
            vec![ContextProperty::ScreenTopEdge, ContextProperty::PositionStable]
        );
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_rejects_unknown_property() {
        assert!(Cli::try_parse_from(["contextd", "--property", "Screen.Orientation"]).is_err());
    }
}
