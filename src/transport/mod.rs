//! Transport layer between the codec and the socket.
//!
//! - `SocketBuffer`: read-ahead buffer with line and length primitives
//! - `Stream`: TCP or Unix-domain socket
//! - `ReplyParser` / `FeedReader`: push-style parsing behind a trait

mod buffer;
mod feed;
mod stream;

pub use buffer::{SocketBuffer, DEFAULT_CHUNK_SIZE};
pub use feed::{FeedReader, ReplyParser, StreamingParser};
pub use stream::{SocketOptions, Stream};
