use std::collections::BTreeMap;

use clap::{Parser, Subcommand};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "bookdb", about = "bookdb - SQLite persistence for accounting books")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "bookdb.toml")]
    pub config: String,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report whether a file would be accepted as a book database
    Check { path: String },
    /// Create a database holding an empty book
    Init { locator: String },
    /// List the tables of a database
    Tables { locator: String },
    /// Run a query against one object type
    Query {
        locator: String,
        /// Type tag to search for, e.g. Account or Trans
        type_tag: String,
        /// Filter, e.g. "post_date >= 2024-01-01 AND description = 'rent'"
        filter: Option<String>,
        /// Print the compiled SQL instead of running it
        #[arg(long)]
        explain: bool,
    },
    /// Copy a whole book into another database, replacing its contents
    SaveAs { from: String, to: String },
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub session: SessionConfig,

    /// Named connections, used as `scheme://@name`.
    #[serde(default)]
    pub connections: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Create missing database files when a command opens them.
    #[serde(default = "default_create_if_missing")]
    pub create_if_missing: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            create_if_missing: default_create_if_missing(),
        }
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        json: false,
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_create_if_missing() -> bool {
    false
}

impl Default for Config {
    fn default() -> Self {
        Config {
            logging: default_logging(),
            session: SessionConfig::default(),
            connections: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn load(cli: &CliArgs) -> Self {
        let mut config = match std::fs::read_to_string(&cli.config) {
            Ok(contents) => Config::parse(&contents),
            Err(_) => Config::default(),
        };

        // CLI overrides
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }

        config
    }

    fn parse(contents: &str) -> Self {
        toml::from_str(contents).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to parse config file: {}", e);
            Config::default()
        })
    }
}
