//! Command-line surface for `resp-cli`.
//!
//! Connection settings come from, in increasing precedence: defaults, the
//! `[connection]` table of a TOML file, `--url`, then individual flags.

use clap::Parser;
use resp_client::config::TomlConfig;
use resp_client::{ConfigError, ConnectionConfig, ParserKind};
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the client
#[derive(Parser, Debug)]
#[command(name = "resp-cli")]
#[command(version = "0.1.0")]
#[command(about = "Send commands to a RESP server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Connection URL (redis://[user:pass@]host[:port][/db] or unix:///path)
    #[arg(short, long)]
    pub url: Option<String>,

    /// Server hostname
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Unix socket path (overrides host and port)
    #[arg(short, long)]
    pub socket: Option<PathBuf>,

    /// Database number
    #[arg(short = 'n', long)]
    pub db: Option<i64>,

    /// Password for AUTH
    #[arg(short = 'a', long)]
    pub password: Option<String>,

    /// Username for AUTH
    #[arg(long)]
    pub user: Option<String>,

    /// Socket timeout in milliseconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Decode replies as text
    #[arg(long)]
    pub decode: bool,

    /// Use the push-style reply parser
    #[arg(long)]
    pub feed_parser: bool,

    /// Read one command per line from stdin and send them as a pipeline
    #[arg(long)]
    pub pipeline: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Command and arguments
    #[arg(trailing_var_arg = true)]
    pub args: Vec<String>,
}

/// Final resolved settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub connection: ConnectionConfig,
    pub log_level: String,
    pub pipeline: bool,
    pub args: Vec<String>,
}

impl Settings {
    /// Parse the process arguments and merge them with the config file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };

        let mut connection = match &cli.url {
            Some(url) => {
                let mut from_url = ConnectionConfig::from_url(url)?;
                from_url.encoding = file.connection.encoding;
                from_url.encoding_errors = file.connection.encoding_errors;
                from_url.read_chunk_size = file.connection.read_chunk_size;
                from_url.parser = file.connection.parser;
                from_url.error_codes = file.connection.error_codes.clone();
                from_url.max_reply_depth = file.connection.max_reply_depth;
                from_url
            }
            None => file.connection,
        };

        if let Some(host) = cli.host {
            connection.host = host;
            connection.unix_socket = None;
        }
        if let Some(port) = cli.port {
            connection.port = port;
        }
        if let Some(socket) = cli.socket {
            connection.unix_socket = Some(socket);
        }
        if let Some(db) = cli.db {
            connection.db = Some(db);
        }
        if let Some(password) = cli.password {
            connection.password = Some(password);
        }
        if let Some(user) = cli.user {
            connection.username = Some(user);
        }
        if let Some(timeout) = cli.timeout {
            connection = connection.socket_timeout(Duration::from_millis(timeout));
        }
        if cli.decode {
            connection.decode_responses = true;
        }
        if cli.feed_parser {
            connection.parser = ParserKind::Feed;
        }

        Ok(Settings {
            connection,
            log_level: if cli.log_level != "warn" {
                cli.log_level
            } else {
                file.logging.level
            },
            pipeline: cli.pipeline,
            args: cli.args,
        })
    }
}
