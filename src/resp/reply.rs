//! Reply values decoded from the server.

use super::classify::ReplyError;
use crate::error::Error;
use bytes::Bytes;
use std::fmt;

/// Payload of a string reply: raw bytes, or text when the connection decodes
/// responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Data {
    Bytes(Bytes),
    Text(String),
}

impl Data {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Data::Bytes(b) => b,
            Data::Text(t) => t.as_bytes(),
        }
    }

    /// Borrow as `&str` if the payload is text or valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Data::Bytes(b) => std::str::from_utf8(b).ok(),
            Data::Text(t) => Some(t),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&'static str> for Data {
    fn from(value: &'static str) -> Self {
        Data::Text(value.to_string())
    }
}

/// A decoded RESP reply.
///
/// Arrays nest arbitrarily; every element is itself any variant, error
/// replies included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK\r\n`
    SimpleString(Data),
    /// `:1000\r\n`
    Integer(i64),
    /// `$6\r\nfoobar\r\n`, or `None` for `$-1\r\n`
    BulkString(Option<Data>),
    /// `*2\r\n...`, or `None` for `*-1\r\n`
    Array(Option<Vec<Reply>>),
    /// `-ERR message\r\n`, already classified
    Error(ReplyError),
}

impl Reply {
    /// True for null bulk strings and null arrays.
    pub fn is_null(&self) -> bool {
        matches!(self, Reply::BulkString(None) | Reply::Array(None))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// True for the `+OK` status reply.
    pub fn is_ok(&self) -> bool {
        matches!(self, Reply::SimpleString(data) if data.as_bytes() == b"OK")
    }

    /// Payload bytes of a simple or bulk string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Reply::SimpleString(data) | Reply::BulkString(Some(data)) => Some(data.as_bytes()),
            _ => None,
        }
    }

    /// Payload of a simple or bulk string as text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Reply::SimpleString(data) | Reply::BulkString(Some(data)) => data.as_str(),
            _ => None,
        }
    }

    /// Integer value, also accepting a string holding a decimal integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(n) => Some(*n),
            _ => self.as_str().and_then(|s| s.parse().ok()),
        }
    }

    pub fn as_array(&self) -> Option<&[Reply]> {
        match self {
            Reply::Array(Some(items)) => Some(items),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<Reply>> {
        match self {
            Reply::Array(Some(items)) => Some(items),
            _ => None,
        }
    }

    /// Turn an error reply into `Err(Error::Reply)`, passing other replies
    /// through.
    pub fn into_result(self) -> Result<Reply, Error> {
        match self {
            Reply::Error(e) => Err(Error::Reply(e)),
            other => Ok(other),
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        match self {
            Reply::SimpleString(data) => f.write_str(&String::from_utf8_lossy(data.as_bytes())),
            Reply::Integer(n) => write!(f, "(integer) {n}"),
            Reply::BulkString(None) | Reply::Array(None) => f.write_str("(nil)"),
            Reply::BulkString(Some(data)) => {
                write!(f, "{:?}", String::from_utf8_lossy(data.as_bytes()))
            }
            Reply::Error(e) => write!(f, "(error) {e}"),
            Reply::Array(Some(items)) if items.is_empty() => f.write_str("(empty array)"),
            Reply::Array(Some(items)) => {
                let width = items.len().to_string().len();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                        write!(f, "{:indent$}", "")?;
                    }
                    write!(f, "{:>width$}) ", i + 1)?;
                    item.fmt_indented(f, indent + width + 2)?;
                }
                Ok(())
            }
        }
    }
}

/// Renders replies the way `redis-cli` does.
impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}
