//! Connection configuration.
//!
//! A [`ConnectionConfig`] can be built in code, parsed from a
//! `redis://` / `unix://` URL, or read from the `[connection]` table of a TOML
//! file. The CLI layers its flags on top; flags take precedence over file
//! values.

use crate::resp::{
    EncodingErrors, ErrorClassifier, ReplyDecoder, TextCodec, TextEncoding, DEFAULT_MAX_DEPTH,
};
use crate::transport::{SocketOptions, DEFAULT_CHUNK_SIZE};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use percent_encoding::percent_decode_str;
use url::Url;

/// Default Redis port.
pub const DEFAULT_PORT: u16 = 6379;

/// Which reply decoder a connection uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    /// `SocketBuffer` with the recursive blocking decoder.
    #[default]
    Buffered,
    /// A push-style `ReplyParser` fed from the socket.
    Feed,
}

/// Settings for one connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Connect to this Unix socket instead of `host:port`.
    pub unix_socket: Option<PathBuf>,
    /// Database selected after connect.
    pub db: Option<i64>,
    /// ACL user name sent with `AUTH`.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Read/write timeout in milliseconds.
    pub socket_timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds; falls back to `socket_timeout_ms`.
    pub connect_timeout_ms: Option<u64>,
    pub keepalive: bool,
    pub encoding: TextEncoding,
    pub encoding_errors: EncodingErrors,
    /// Decode string replies to text with `encoding`.
    pub decode_responses: bool,
    /// Bytes requested per socket read.
    pub read_chunk_size: usize,
    pub parser: ParserKind,
    /// Extra error codes to classify besides the built-in ones.
    pub error_codes: Vec<String>,
    /// Deepest array nesting accepted in a reply.
    pub max_reply_depth: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: DEFAULT_PORT,
            unix_socket: None,
            db: None,
            username: None,
            password: None,
            socket_timeout_ms: None,
            connect_timeout_ms: None,
            keepalive: false,
            encoding: TextEncoding::default(),
            encoding_errors: EncodingErrors::default(),
            decode_responses: false,
            read_chunk_size: DEFAULT_CHUNK_SIZE,
            parser: ParserKind::default(),
            error_codes: Vec::new(),
            max_reply_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl ConnectionConfig {
    /// TCP connection to `host:port`.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Unix-domain socket connection.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self {
            unix_socket: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn db(mut self, db: i64) -> Self {
        self.db = Some(db);
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout_ms = Some(duration_ms(timeout));
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(duration_ms(timeout));
        self
    }

    pub fn keepalive(mut self, enabled: bool) -> Self {
        self.keepalive = enabled;
        self
    }

    pub fn encoding(mut self, encoding: TextEncoding, errors: EncodingErrors) -> Self {
        self.encoding = encoding;
        self.encoding_errors = errors;
        self
    }

    pub fn decode_responses(mut self, enabled: bool) -> Self {
        self.decode_responses = enabled;
        self
    }

    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    pub fn parser(mut self, parser: ParserKind) -> Self {
        self.parser = parser;
        self
    }

    pub fn max_reply_depth(mut self, depth: usize) -> Self {
        self.max_reply_depth = depth;
        self
    }

    pub fn error_code(mut self, code: impl Into<String>) -> Self {
        self.error_codes.push(code.into());
        self
    }

    /// Parse `redis://[user:password@]host[:port][/db]` or
    /// `unix:///path/to/socket[?db=N&password=P]`.
    pub fn from_url(input: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(input).map_err(|e| ConfigError::Url(input.to_string(), e.to_string()))?;
        let invalid = |reason: &str| ConfigError::Url(input.to_string(), reason.to_string());

        let mut config = match url.scheme() {
            "redis" => {
                let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
                let mut config = Self::tcp(
                    host.trim_start_matches('[').trim_end_matches(']'),
                    url.port().unwrap_or(DEFAULT_PORT),
                );
                let db = url.path().trim_start_matches('/');
                if !db.is_empty() {
                    config.db = Some(db.parse().map_err(|_| invalid("invalid database index"))?);
                }
                config
            }
            "unix" => {
                if url.path().is_empty() {
                    return Err(invalid("missing socket path"));
                }
                Self::unix(decode_component(url.path()))
            }
            other => return Err(invalid(&format!("unsupported scheme '{other}'"))),
        };

        if !url.username().is_empty() {
            config.username = Some(decode_component(url.username()));
        }
        if let Some(password) = url.password() {
            config.password = Some(decode_component(password));
        }

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "db" => {
                    config.db = Some(value.parse().map_err(|_| invalid("invalid database index"))?)
                }
                "password" => config.password = Some(value.into_owned()),
                "username" => config.username = Some(value.into_owned()),
                "socket_timeout" => {
                    config.socket_timeout_ms =
                        Some(value.parse().map_err(|_| invalid("invalid socket_timeout"))?)
                }
                "decode_responses" => config.decode_responses = value == "true" || value == "1",
                _ => {}
            }
        }

        Ok(config)
    }

    pub fn text_codec(&self) -> TextCodec {
        TextCodec::new(self.encoding, self.encoding_errors)
    }

    /// Reply decoder matching this configuration.
    pub fn decoder(&self) -> ReplyDecoder {
        let classifier = self
            .error_codes
            .iter()
            .fold(ErrorClassifier::new(), |c, code| c.with_code(code.clone()));
        let text = self.decode_responses.then(|| self.text_codec());
        ReplyDecoder::new(classifier, text).with_max_depth(self.max_reply_depth)
    }

    pub fn socket_options(&self) -> SocketOptions {
        let timeout = self.socket_timeout_ms.map(Duration::from_millis);
        SocketOptions {
            connect_timeout: self.connect_timeout_ms.map(Duration::from_millis).or(timeout),
            timeout,
            keepalive: self.keepalive,
        }
    }

    /// Short human-readable target, e.g. `127.0.0.1:6379,db=0`.
    pub fn describe(&self) -> String {
        let target = match &self.unix_socket {
            Some(path) => format!("unix:{}", path.display()),
            None => format!("{}:{}", self.host, self.port),
        };
        match self.db {
            Some(db) => format!("{target},db={db}"),
            None => target,
        }
    }
}

fn decode_component(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

/// Whole milliseconds, rounded up so a non-zero timeout never becomes 0.
fn duration_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        toml::from_str(&contents).map_err(|e| ConfigError::TomlParse(path.to_path_buf(), e))
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Url(String, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Url(url, reason) => {
                write!(f, "Invalid connection URL '{}': {}", url, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
