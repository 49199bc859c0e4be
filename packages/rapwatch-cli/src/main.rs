//! rapwatch CLI - daily wired client inventory for branch routers
//!
//! This binary can:
//! - Run the daily inventory as a long-lived daemon (for systemd integration)
//! - Run a single inventory cycle on demand
//! - Validate and generate the configuration file
//! - Read back the router registry and stored client snapshots

mod daemon;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use rapwatch_core::config::{self, Config, ConfigSource};
use rapwatch_core::{ConfigError, Inventory, RegistryStore, SqliteStore};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rapwatch")]
#[command(author = "rapwatch contributors")]
#[command(version)]
#[command(about = "Daily wired client inventory for branch routers")]
#[command(long_about = "
rapwatch discovers branch routers from the management console, asks each
router which wired clients it sees, and records the results in a local
registry database once a day.

Quick start:
  1. Write a config:    rapwatch config > ~/.config/rapwatch/config.toml
  2. Check it:          rapwatch check
  3. Try one cycle:     rapwatch once
  4. Start daemon:      rapwatch run

For systemd integration, run `rapwatch run` as a simple service.
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Config file (overrides RAPWATCH_CONFIG and the default location)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the daily inventory until SIGINT/SIGTERM
    #[command(alias = "daemon")]
    Run,

    /// Run one inventory cycle now
    Once,

    /// Validate the configuration file
    #[command(alias = "test")]
    Check,

    /// Show configuration paths and print an example config
    Config,

    /// List routers in the registry
    Routers,

    /// Show stored wired clients of one router
    Clients {
        /// Routing code
        code: String,

        /// Start of the range, RFC 3339 or YYYY-MM-DD (default: 24 hours ago)
        #[arg(long)]
        since: Option<String>,

        /// End of the range, RFC 3339 or YYYY-MM-DD (default: now)
        #[arg(long)]
        until: Option<String>,

        /// Only this client MAC address
        #[arg(long)]
        mac: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config_path, config_source) =
        config::resolve_config_path(cli.config.as_deref()).context("Could not locate a config file")?;
    let loaded = config::load_config(&config_path);

    // Initialize logging
    let debug = cli.verbose || matches!(&loaded, Ok(config) if config.debug);
    let log_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("rapwatch={},rapwatch_core={}", log_level, log_level).into()),
        )
        .with_target(false)
        .init();

    match &cli.command {
        Commands::Config => cmd_config(&cli, &config_path, &config_source, &loaded),
        Commands::Check => cmd_check(&cli, &config_path, loaded),
        Commands::Run => daemon::run_daemon(require(&config_path, loaded)?).await,
        Commands::Once => cmd_once(&cli, require(&config_path, loaded)?).await,
        Commands::Routers => cmd_routers(&cli, &require(&config_path, loaded)?),
        Commands::Clients {
            code,
            since,
            until,
            mac,
        } => cmd_clients(
            &cli,
            &require(&config_path, loaded)?,
            code,
            since.as_deref(),
            until.as_deref(),
            mac.as_deref(),
        ),
    }
}

fn require(path: &Path, loaded: Result<Config, ConfigError>) -> Result<Config> {
    loaded.with_context(|| format!("Failed to load config from {}", path.display()))
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&config.database.path)
        .with_context(|| format!("Failed to open database {}", config.database.path.display()))
}

async fn cmd_once(cli: &Cli, config: Config) -> Result<()> {
    let store = open_store(&config)?;
    let inventory = Inventory::from_config(&config, store)?;

    match cli.format {
        OutputFormat::Text => println!("Running inventory cycle..."),
        OutputFormat::Json => {}
    }

    let report = inventory.run_cycle().await.context("Inventory cycle failed")?;

    match cli.format {
        OutputFormat::Text => {
            println!();
            println!("Routers discovered:  {}", report.discovered);
            println!("New routers:         {}", report.created);
            println!("Registry updates:    {}", report.updated);
            println!("Skipped (not up):    {}", report.skipped_down);
            println!(
                "Scraped:             {} ({} via gateway)",
                report.scraped, report.retried_via_gateway
            );
            println!("Failed:              {}", report.failed);
            println!("Clients stored:      {}", report.clients_stored);
            if report.timed_out {
                println!();
                println!(
                    "Cycle deadline reached, {} routers were not queried.",
                    report.abandoned
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(&report)?);
        }
    }

    Ok(())
}

fn cmd_check(cli: &Cli, path: &Path, loaded: Result<Config, ConfigError>) -> Result<()> {
    match loaded {
        Ok(config) => {
            let schedule = config.schedule()?;
            match cli.format {
                OutputFormat::Text => {
                    println!("{} is ok", path.display());
                    println!("Daily run at {}", schedule);
                }
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::json!({
                            "config_file": path,
                            "valid": true,
                            "schedule": schedule.to_string(),
                        })
                    );
                }
            }
            Ok(())
        }
        Err(e) => {
            if let OutputFormat::Json = cli.format {
                println!(
                    "{}",
                    serde_json::json!({
                        "config_file": path,
                        "valid": false,
                        "error": e.to_string(),
                    })
                );
            }
            Err(e).with_context(|| format!("{} is not valid", path.display()))
        }
    }
}

fn cmd_config(
    cli: &Cli,
    path: &Path,
    source: &ConfigSource,
    loaded: &Result<Config, ConfigError>,
) -> Result<()> {
    let database = match loaded {
        Ok(config) => config.database.path.clone(),
        Err(_) => config::default_database_path(),
    };

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration");
            println!("=============");
            println!();
            println!("Config file:  {} (from {})", path.display(), source);
            match loaded {
                Ok(_) => println!("Status:       ok"),
                Err(e) => println!("Status:       {}", e),
            }
            println!("Database:     {}", database.display());
            println!();
            println!("Environment variables:");
            println!("  {} - Override config file location", config::ENV_CONFIG_PATH);
            println!("  RUST_LOG - Override log filter");
            println!();
            println!("Example config.toml:");
            println!();
            println!("{}", config::generate_example_config());
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "config_file": path,
                    "config_source": source.to_string(),
                    "config_error": loaded.as_ref().err().map(|e| e.to_string()),
                    "database": database,
                    "example": config::generate_example_config(),
                })
            );
        }
    }

    Ok(())
}

fn cmd_routers(cli: &Cli, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let devices = store.select_all_devices()?;

    match cli.format {
        OutputFormat::Text => {
            println!("{} routers:", devices.len());
            println!();
            for device in &devices {
                let name = if device.name.is_empty() { "-" } else { &device.name };
                let gateway = if device.gateway.is_empty() { "-" } else { &device.gateway };
                let pinned = if device.auto_update { "" } else { " (pinned)" };
                println!(
                    "  {:10} {:15} {:15} {:12} {}{}",
                    device.code, device.wan_ip, gateway, device.area, name, pinned
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "routers": devices }));
        }
    }

    Ok(())
}

fn cmd_clients(
    cli: &Cli,
    config: &Config,
    code: &str,
    since: Option<&str>,
    until: Option<&str>,
    mac: Option<&str>,
) -> Result<()> {
    let end = match until {
        Some(value) => parse_time(value, true)?,
        None => Utc::now(),
    };
    let start = match since {
        Some(value) => parse_time(value, false)?,
        None => end - Duration::hours(24),
    };
    if start > end {
        anyhow::bail!("--since must not be later than --until");
    }

    let store = open_store(config)?;
    let rows = store
        .query_client_records(code, start, end, mac)
        .with_context(|| format!("Failed to query clients of router {}", code))?;

    match cli.format {
        OutputFormat::Text => {
            println!("{} client records for {}:", rows.len(), code.to_uppercase());
            println!();
            for row in &rows {
                let c = &row.client;
                println!(
                    "  {}  {:24} {:15} {:17} {:10} {:5} {}",
                    row.captured_at.format("%Y-%m-%d %H:%M"),
                    c.name,
                    c.ip,
                    c.mac,
                    c.os,
                    c.network,
                    c.role
                );
            }
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "code": code.to_uppercase(),
                    "since": start,
                    "until": end,
                    "clients": rows,
                })
            );
        }
    }

    Ok(())
}

/// Accept RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or a bare date. A bare date
/// means the start of that day, or its end when `end_of_day` is set.
fn parse_time(value: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    if let Ok(at) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&at));
    }

    let day = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid time '{}'", value))?;
    let at = if end_of_day {
        day.and_hms_opt(23, 59, 59)
    } else {
        day.and_hms_opt(0, 0, 0)
    }
    .context("Invalid time of day")?;
    Ok(Utc.from_utc_datetime(&at))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_formats() {
        let at = parse_time("2026-10-19T02:30:00Z", false).unwrap();
        assert_eq!(at.to_rfc3339(), "2026-10-19T02:30:00+00:00");

        let at = parse_time("2026-10-19 02:30:00", false).unwrap();
        assert_eq!(at.to_rfc3339(), "2026-10-19T02:30:00+00:00");

        let start = parse_time("2026-10-19", false).unwrap();
        let end = parse_time("2026-10-19", true).unwrap();
        assert_eq!(start.to_rfc3339(), "2026-10-19T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-10-19T23:59:59+00:00");

        assert!(parse_time("yesterday", false).is_err());
    }

    #[test]
    fn test_cli_parses_clients_command() {
        let cli = Cli::try_parse_from([
            "rapwatch",
            "--format",
            "json",
            "clients",
            "531",
            "--since",
            "2026-10-01",
            "--mac",
            "aa:bb:cc:dd:ee:ff",
        ])
        .unwrap();

        assert!(matches!(cli.format, OutputFormat::Json));
        match cli.command {
            Commands::Clients {
                code, since, mac, ..
            } => {
                assert_eq!(code, "531");
                assert_eq!(since.as_deref(), Some("2026-10-01"));
                assert_eq!(mac.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
            }
            _ => panic!("expected clients command"),
        }
    }
}
