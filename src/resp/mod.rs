//! RESP (Redis Serialization Protocol) wire codec.
//!
//! Requests are always arrays of bulk strings; replies are any of the five
//! RESP2 types.

pub mod classify;
pub mod command;
pub mod parser;
pub mod reply;
pub mod text;

pub use classify::{ErrorClassifier, ReplyError, ReplyErrorKind};
pub use command::{pack_commands, Arg, Command};
pub use parser::{
    parse, ParseError, ParseResult, PartialReply, ReplyDecoder, ReplySource, DEFAULT_MAX_DEPTH,
};
pub use reply::{Data, Reply};
pub use text::{EncodingErrors, TextCodec, TextEncoding};
