use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use core::time::Duration;
use shortno::{DEFAULT_BATCH_SIZE, DEFAULT_DIGITS, DEFAULT_LOW_WATER_MARK, PoolConfig};
use std::path::PathBuf;

/// Runtime configuration for the `shortno-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first), with defaults matching the library's.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "shortno-server",
    version,
    about = "Keeps a pool of short numeric identifiers replenished"
)]
pub struct CliArgs {
    /// Path to the SQLite database holding the pool.
    ///
    /// Environment variable: `SHORTNO_DB`
    #[arg(long, env = "SHORTNO_DB", default_value = "shortno.db")]
    pub db: PathBuf,

    /// Number of decimal digits per short number.
    ///
    /// Changing this on an existing database only affects newly generated
    /// values.
    ///
    /// Environment variable: `SHORTNO_DIGITS`
    #[arg(long, env = "SHORTNO_DIGITS", default_value_t = DEFAULT_DIGITS)]
    pub digits: u8,

    /// Unlocked count below which a refill batch is generated.
    ///
    /// Environment variable: `SHORTNO_LOW_WATER_MARK`
    #[arg(long, env = "SHORTNO_LOW_WATER_MARK", default_value_t = DEFAULT_LOW_WATER_MARK)]
    pub low_water_mark: u64,

    /// Candidates generated per refill pass.
    ///
    /// Environment variable: `SHORTNO_BATCH_SIZE`
    #[arg(long, env = "SHORTNO_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Seconds between replenishment passes.
    ///
    /// Environment variable: `SHORTNO_REFILL_INTERVAL_SECS`
    #[arg(long, env = "SHORTNO_REFILL_INTERVAL_SECS", default_value_t = 30)]
    pub refill_interval_secs: u64,

    /// Seconds to back off after the unlocked count cannot be read.
    ///
    /// Environment variable: `SHORTNO_ERROR_BACKOFF_SECS`
    #[arg(long, env = "SHORTNO_ERROR_BACKOFF_SECS", default_value_t = 2)]
    pub error_backoff_secs: u64,

    /// Per round-trip timeout for allocation and usage calls, in
    /// milliseconds. `0` disables the timeout.
    ///
    /// Environment variable: `SHORTNO_STORE_TIMEOUT_MS`
    #[arg(long, env = "SHORTNO_STORE_TIMEOUT_MS", default_value_t = 0)]
    pub store_timeout_ms: u64,

    /// Seconds to wait for the replenishment loop on shutdown.
    ///
    /// Environment variable: `SHORTNO_SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHORTNO_SHUTDOWN_TIMEOUT_SECS", default_value_t = 3)]
    pub shutdown_timeout_secs: u64,

    /// Console log format.
    ///
    /// Environment variable: `LOG_FORMAT`
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Keep the pool replenished until interrupted (default).
    Run,
    /// Claim one short number and print it.
    Allocate,
    /// Record that an allocated short number is used by an owner.
    MarkUsed {
        /// The allocated short number.
        value: String,
        /// Business tag to attribute the short number to.
        owner: String,
    },
    /// Print record counts by lifecycle state.
    Stats,
    /// Run a single replenishment pass and report its outcome.
    Refill,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db: PathBuf,
    pub pool: PoolConfig,
    pub log_format: LogFormat,
    pub command: Command,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.db.as_os_str().is_empty() {
            bail!("SHORTNO_DB must not be empty");
        }

        let pool = PoolConfig {
            digits: args.digits,
            low_water_mark: args.low_water_mark,
            batch_size: args.batch_size,
            refill_interval: Duration::from_secs(args.refill_interval_secs),
            error_backoff: Duration::from_secs(args.error_backoff_secs),
            store_timeout: (args.store_timeout_ms > 0)
                .then(|| Duration::from_millis(args.store_timeout_ms)),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
        }
        .validate()
        .context("invalid pool configuration")?;

        Ok(Self {
            db: args.db,
            pool,
            log_format: args.log_format,
            command: args.command.unwrap_or(Command::Run),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ServerConfig> {
        let args =
            CliArgs::try_parse_from(std::iter::once("shortno-server").chain(args.iter().copied()))?;
        ServerConfig::try_from(args)
    }

    #[test]
    fn defaults_to_run_with_library_defaults() {
        let config = parse(&["--db", "pool.db"]).unwrap();
        assert_eq!(config.command, Command::Run);
        assert_eq!(config.pool, PoolConfig::default());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn parses_subcommands_and_overrides() {
        let config = parse(&[
            "--db",
            "pool.db",
            "--digits",
            "9",
            "--store-timeout-ms",
            "250",
            "--log-format",
            "json",
            "mark-used",
            "012345678",
            "group",
        ])
        .unwrap();

        assert_eq!(config.pool.digits, 9);
        assert_eq!(config.pool.store_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.command,
            Command::MarkUsed {
                value: "012345678".to_string(),
                owner: "group".to_string(),
            }
        );
    }

    #[test]
    fn rejects_invalid_pool_settings() {
        assert!(parse(&["--db", "pool.db", "--digits", "0"]).is_err());
        assert!(parse(&["--db", "pool.db", "--batch-size", "0"]).is_err());
        assert!(parse(&["--db", "pool.db", "--error-backoff-secs", "60"]).is_err());
    }
}
