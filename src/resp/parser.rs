//! RESP reply decoding.
//!
//! Two decoders share one tag table:
//! - [`ReplyDecoder::read_reply`] pulls lines and payloads from a blocking
//!   [`ReplySource`].
//! - [`parse`] / [`ReplyDecoder::parse`] inspect a byte slice and report
//!   `Incomplete` when more input is needed. [`PartialReply`] keeps that
//!   progress between calls so bytes already decoded are not parsed again.
//!
//! Neither recurses per nesting level: open arrays live on an explicit
//! stack, capped at [`ReplyDecoder::max_depth`] levels.

use super::classify::ErrorClassifier;
use super::reply::{Data, Reply};
use super::text::TextCodec;
use crate::error::Result;
use bytes::Bytes;

/// Default cap on array nesting in a single reply.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Framing errors in a reply stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The first byte of a reply is not a known type tag.
    #[error("invalid prefix byte: {0:#04x}")]
    InvalidPrefix(u8),

    /// An integer reply is not a signed decimal.
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// A bulk or array length is not a decimal, or is negative but not -1.
    #[error("invalid length: {0}")]
    InvalidLength(String),

    /// A bulk payload is not followed by `\r\n`.
    #[error("bulk string missing trailing CRLF")]
    MissingTerminator,

    /// A line with no type tag.
    #[error("empty reply line")]
    EmptyLine,

    /// Arrays nested deeper than the decoder accepts.
    #[error("reply nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Parse result for the slice decoder.
#[derive(Debug)]
pub enum ParseResult {
    /// A full reply and the number of bytes it occupied.
    Complete(Reply, usize),
    /// Need more data.
    Incomplete,
    /// The input is not valid RESP.
    Error(ParseError),
}

/// Line and length delimited reads used by the blocking decoder.
pub trait ReplySource {
    /// Next line, without its `\r\n`.
    fn read_line(&mut self) -> Result<Bytes>;

    /// Exactly `n` bytes followed by `\r\n`; returns the `n` bytes.
    fn read_exact(&mut self, n: usize) -> Result<Bytes>;
}

/// What one reply line announces.
enum Header {
    /// A reply complete in the line itself (including nulls).
    Value(Reply),
    /// A bulk string whose payload follows.
    Bulk(usize),
    /// An array whose elements follow.
    Array(usize),
}

/// One step of the slice decoder.
enum Token {
    Value(Reply, usize),
    Array(usize, usize),
    Incomplete,
    Error(ParseError),
}

/// Length header of a bulk string or array.
enum Length {
    Null,
    Len(usize),
}

/// Strict signed decimal: optional `-`, then digits only.
fn parse_decimal(payload: &[u8]) -> Option<i64> {
    if payload.first() == Some(&b'+') {
        return None;
    }
    std::str::from_utf8(payload).ok()?.parse().ok()
}

fn parse_length(payload: &[u8]) -> std::result::Result<Length, ParseError> {
    let invalid = || ParseError::InvalidLength(String::from_utf8_lossy(payload).into_owned());
    match parse_decimal(payload).ok_or_else(invalid)? {
        -1 => Ok(Length::Null),
        n if n < 0 => Err(invalid()),
        n => usize::try_from(n).map(Length::Len).map_err(|_| invalid()),
    }
}

fn parse_integer(payload: &[u8]) -> std::result::Result<i64, ParseError> {
    parse_decimal(payload)
        .ok_or_else(|| ParseError::InvalidInteger(String::from_utf8_lossy(payload).into_owned()))
}

/// Find CRLF in buffer, return position of \r
fn find_crlf(buffer: &[u8]) -> Option<usize> {
    memchr::memmem::find(buffer, b"\r\n")
}

/// Arrays still waiting for elements, innermost last.
#[derive(Debug, Default)]
struct Frames {
    open: Vec<(Vec<Reply>, usize)>,
}

impl Frames {
    /// Start an array of `len` elements. An empty array is returned at once
    /// as a finished value.
    fn push_array(
        &mut self,
        len: usize,
        max_depth: usize,
    ) -> std::result::Result<Option<Reply>, ParseError> {
        if self.open.len() >= max_depth {
            return Err(ParseError::TooDeep(max_depth));
        }
        if len == 0 {
            return Ok(Some(Reply::Array(Some(Vec::new()))));
        }
        self.open.push((Vec::with_capacity(len.min(1024)), len));
        Ok(None)
    }

    /// Add a finished value to the innermost open array, closing every array
    /// it fills. Returns the reply once nothing is left open.
    fn complete(&mut self, mut reply: Reply) -> Option<Reply> {
        while let Some((items, remaining)) = self.open.last_mut() {
            items.push(reply);
            *remaining -= 1;
            if *remaining > 0 {
                return None;
            }
            let items = std::mem::take(items);
            self.open.pop();
            reply = Reply::Array(Some(items));
        }
        Some(reply)
    }

    fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

/// A reply decoded part way by the slice decoder.
///
/// Completed elements are kept here, so the caller may discard the bytes
/// they came from and resume with only the unconsumed tail.
#[derive(Debug, Default)]
pub struct PartialReply {
    frames: Frames,
}

impl PartialReply {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no reply is in progress.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Decode from the front of `buffer`, continuing any reply in progress.
    ///
    /// Returns the bytes taken from `buffer` and the outcome: `Ok(Some)` for
    /// a finished reply, `Ok(None)` when more input is needed. Taken bytes
    /// are never needed again, even when the reply is not finished. After an
    /// error the state is reset.
    pub fn advance(
        &mut self,
        decoder: &ReplyDecoder,
        buffer: &[u8],
    ) -> (usize, std::result::Result<Option<Reply>, ParseError>) {
        let mut offset = 0;
        loop {
            let value = match decoder.next_token(&buffer[offset..]) {
                Token::Value(reply, used) => {
                    offset += used;
                    reply
                }
                Token::Array(len, used) => {
                    offset += used;
                    match self.frames.push_array(len, decoder.max_depth) {
                        Ok(Some(empty)) => empty,
                        Ok(None) => continue,
                        Err(e) => return self.fail(offset, e),
                    }
                }
                Token::Incomplete => return (offset, Ok(None)),
                Token::Error(e) => return self.fail(offset, e),
            };
            if let Some(reply) = self.frames.complete(value) {
                return (offset, Ok(Some(reply)));
            }
        }
    }

    fn fail(
        &mut self,
        offset: usize,
        e: ParseError,
    ) -> (usize, std::result::Result<Option<Reply>, ParseError>) {
        self.frames = Frames::default();
        (offset, Err(e))
    }
}

/// Decodes replies, classifying error lines and optionally turning string
/// payloads into text.
#[derive(Debug, Clone)]
pub struct ReplyDecoder {
    classifier: ErrorClassifier,
    text: Option<TextCodec>,
    max_depth: usize,
}

impl Default for ReplyDecoder {
    fn default() -> Self {
        Self::new(ErrorClassifier::default(), None)
    }
}

impl ReplyDecoder {
    pub fn new(classifier: ErrorClassifier, text: Option<TextCodec>) -> Self {
        Self {
            classifier,
            text,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Decode string payloads to text with `codec`.
    pub fn with_text(mut self, codec: TextCodec) -> Self {
        self.text = Some(codec);
        self
    }

    /// Reject replies with arrays nested more than `depth` levels.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Same classifier and depth limit, no text decoding.
    pub fn raw(&self) -> Self {
        Self {
            classifier: self.classifier.clone(),
            text: None,
            max_depth: self.max_depth,
        }
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Interpret one line (without CRLF). String payloads are raw.
    fn header(&self, line: &[u8]) -> std::result::Result<Header, ParseError> {
        let (&tag, payload) = line.split_first().ok_or(ParseError::EmptyLine)?;

        Ok(match tag {
            b'+' => Header::Value(Reply::SimpleString(Data::Bytes(Bytes::copy_from_slice(
                payload,
            )))),
            b'-' => Header::Value(Reply::Error(
                self.classifier.classify(&String::from_utf8_lossy(payload)),
            )),
            b':' => Header::Value(Reply::Integer(parse_integer(payload)?)),
            b'$' => match parse_length(payload)? {
                Length::Null => Header::Value(Reply::BulkString(None)),
                Length::Len(n) => Header::Bulk(n),
            },
            b'*' => match parse_length(payload)? {
                Length::Null => Header::Value(Reply::Array(None)),
                Length::Len(n) => Header::Array(n),
            },
            other => return Err(ParseError::InvalidPrefix(other)),
        })
    }

    /// Read one reply from `source`.
    pub fn read_reply<S: ReplySource + ?Sized>(&self, source: &mut S) -> Result<Reply> {
        let mut frames = Frames::default();
        loop {
            let line = source.read_line()?;
            let value = match self.header(&line)? {
                Header::Value(Reply::SimpleString(Data::Bytes(data))) => {
                    Reply::SimpleString(self.payload(data)?)
                }
                Header::Value(reply) => reply,
                Header::Bulk(n) => Reply::BulkString(Some(self.payload(source.read_exact(n)?)?)),
                Header::Array(n) => match frames.push_array(n, self.max_depth)? {
                    Some(empty) => empty,
                    None => continue,
                },
            };
            if let Some(reply) = frames.complete(value) {
                return Ok(reply);
            }
        }
    }

    /// Decode the next line or bulk string at the front of `buffer`.
    fn next_token(&self, buffer: &[u8]) -> Token {
        let Some(&tag) = buffer.first() else {
            return Token::Incomplete;
        };
        if !matches!(tag, b'+' | b'-' | b':' | b'$' | b'*' | b'\r') {
            return Token::Error(ParseError::InvalidPrefix(tag));
        }
        let Some(end) = find_crlf(buffer) else {
            return Token::Incomplete;
        };
        let header_len = end + 2;

        match self.header(&buffer[..end]) {
            Ok(Header::Value(reply)) => Token::Value(reply, header_len),
            Ok(Header::Array(len)) => Token::Array(len, header_len),
            Ok(Header::Bulk(len)) => {
                let data_end = header_len.saturating_add(len);
                let total_len = data_end.saturating_add(2); // +2 for trailing \r\n

                if buffer.len() < total_len {
                    return Token::Incomplete;
                }
                if &buffer[data_end..total_len] != b"\r\n" {
                    return Token::Error(ParseError::MissingTerminator);
                }

                let data = Bytes::copy_from_slice(&buffer[header_len..data_end]);
                Token::Value(Reply::BulkString(Some(Data::Bytes(data))), total_len)
            }
            Err(e) => Token::Error(e),
        }
    }

    /// Parse one reply from the front of `buffer`. String payloads are
    /// returned raw; see [`ReplyDecoder::decode_payloads`].
    pub fn parse(&self, buffer: &[u8]) -> ParseResult {
        match PartialReply::new().advance(self, buffer) {
            (consumed, Ok(Some(reply))) => ParseResult::Complete(reply, consumed),
            (_, Ok(None)) => ParseResult::Incomplete,
            (_, Err(e)) => ParseResult::Error(e),
        }
    }

    /// Apply text decoding to every string payload in `reply`.
    pub fn decode_payloads(&self, reply: Reply) -> Result<Reply> {
        if self.text.is_none() {
            return Ok(reply);
        }
        Ok(match reply {
            Reply::SimpleString(Data::Bytes(b)) => Reply::SimpleString(self.payload(b)?),
            Reply::BulkString(Some(Data::Bytes(b))) => Reply::BulkString(Some(self.payload(b)?)),
            Reply::Array(Some(items)) => Reply::Array(Some(
                items
                    .into_iter()
                    .map(|item| self.decode_payloads(item))
                    .collect::<Result<_>>()?,
            )),
            other => other,
        })
    }

    fn payload(&self, data: Bytes) -> Result<Data> {
        match &self.text {
            Some(codec) => Ok(Data::Text(codec.decode(&data)?)),
            None => Ok(Data::Bytes(data)),
        }
    }
}

/// Parse a RESP reply from a buffer with the default decoder.
pub fn parse(buffer: &[u8]) -> ParseResult {
    ReplyDecoder::default().parse(buffer)
}
