//! Error taxonomy for the client.
//!
//! Transport, protocol and handshake failures are fatal to the connection
//! that produced them: the connection is closed before the error reaches the
//! caller. Reply errors are ordinary server answers and leave the connection
//! usable.

use crate::config::ConfigError;
use crate::resp::{ParseError, ReplyError};
use std::io;

/// Errors returned by the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket connect, read or write failure (timeouts included).
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A socket read returned zero bytes.
    #[error("remote closed connection")]
    ConnectionClosed,

    /// The byte stream is not valid RESP.
    #[error("protocol error: {0}")]
    Protocol(#[from] ParseError),

    /// `AUTH` or `SELECT` did not answer `OK` during connect.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The server answered with an error reply.
    #[error("{0}")]
    Reply(#[from] ReplyError),

    /// Text could not be converted with the configured encoding.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An operation needing a live socket ran on a disconnected connection.
    #[error("not connected")]
    NotConnected,
}

impl Error {
    /// Returns true if this error closes the connection it came from.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::ConnectionClosed
                | Error::Protocol(_)
                | Error::Authentication(_)
                | Error::NotConnected
        )
    }

    /// Returns true for socket-level failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Io(_) | Error::ConnectionClosed)
    }

    /// Returns true if a socket timeout caused this error.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    /// The server error reply, if this is one.
    pub fn as_reply_error(&self) -> Option<&ReplyError> {
        match self {
            Error::Reply(e) => Some(e),
            _ => None,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
