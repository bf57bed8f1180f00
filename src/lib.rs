//! resp-client: a blocking Redis client core.
//!
//! The crate covers the client side of the RESP2 protocol:
//! - Command encoding and reply decoding (`resp`)
//! - A buffered socket reader and pluggable push parser (`transport`)
//! - Connection lifecycle with `AUTH` / `SELECT` handshake (`connection`)
//! - Pipelined execution (`pipeline`)
//!
//! ```no_run
//! use resp_client::{Command, Connection, ConnectionConfig};
//!
//! let mut conn = Connection::new(ConnectionConfig::tcp("127.0.0.1", 6379).db(1));
//! conn.connect()?;
//! conn.execute(&Command::new("SET").arg("greeting").arg("hello"))?;
//! let reply = conn.execute(&Command::new("GET").arg("greeting"))?;
//! assert_eq!(reply.as_str(), Some("hello"));
//! # Ok::<(), resp_client::Error>(())
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod pipeline;
pub mod resp;
pub mod transport;

#[cfg(test)]
mod testkit;

pub use config::{ConfigError, ConnectionConfig, ParserKind};
pub use connection::{ConnectState, Connection, ParserFactory};
pub use error::{Error, Result};
pub use pipeline::Pipeline;
pub use resp::{
    Arg, Command, Data, EncodingErrors, ErrorClassifier, ParseError, Reply, ReplyError,
    ReplyErrorKind, TextCodec, TextEncoding,
};
