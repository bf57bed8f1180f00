//! Push-style reply parsing.
//!
//! A [`ReplyParser`] is fed raw bytes and hands out replies once complete.
//! [`StreamingParser`] is the built-in implementation; an accelerated parser
//! can be plugged in behind the same trait. [`FeedReader`] drives any parser
//! from a blocking stream.

use crate::error::{Error, Result};
use crate::resp::{ParseError, PartialReply, Reply, ReplyDecoder};
use bytes::BytesMut;
use std::io::{self, Read};

/// Incremental reply parser.
pub trait ReplyParser: Send {
    /// Append bytes received from the server.
    fn feed(&mut self, data: &[u8]);

    /// Next complete reply, or `None` when more data is needed.
    ///
    /// String payloads are raw; text decoding happens in the caller.
    fn next_reply(&mut self) -> std::result::Result<Option<Reply>, ParseError>;

    /// Bytes fed but not yet returned as replies.
    fn buffered(&self) -> usize;
}

/// Built-in [`ReplyParser`] on top of the slice decoder.
///
/// Decoding resumes where the previous call stopped: elements of a large
/// array are decoded once, as their bytes arrive, and their bytes are then
/// dropped from the buffer.
#[derive(Debug, Default)]
pub struct StreamingParser {
    decoder: ReplyDecoder,
    partial: PartialReply,
    buf: BytesMut,
    consumed: usize,
}

impl StreamingParser {
    pub fn new(decoder: ReplyDecoder) -> Self {
        Self {
            decoder,
            partial: PartialReply::new(),
            buf: BytesMut::new(),
            consumed: 0,
        }
    }
}

impl ReplyParser for StreamingParser {
    fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    fn next_reply(&mut self) -> std::result::Result<Option<Reply>, ParseError> {
        let (used, outcome) = self.partial.advance(&self.decoder, &self.buf[self.consumed..]);
        self.consumed += used;
        if self.consumed == self.buf.len() {
            self.buf.clear();
            self.consumed = 0;
        }
        outcome
    }

    fn buffered(&self) -> usize {
        self.buf.len() - self.consumed
    }
}

/// Reads from a stream into a [`ReplyParser`] until a reply is available.
pub struct FeedReader<S> {
    stream: S,
    parser: Box<dyn ReplyParser>,
    decoder: ReplyDecoder,
    chunk: Vec<u8>,
}

impl<S: Read> FeedReader<S> {
    /// `decoder` applies text decoding to the replies `parser` produces.
    pub fn new(
        stream: S,
        parser: Box<dyn ReplyParser>,
        decoder: ReplyDecoder,
        chunk_size: usize,
    ) -> Self {
        Self {
            stream,
            parser,
            decoder,
            chunk: vec![0; chunk_size.max(1)],
        }
    }

    /// Block until one reply is complete.
    pub fn read_reply(&mut self) -> Result<Reply> {
        loop {
            if let Some(reply) = self.parser.next_reply()? {
                return self.decoder.decode_payloads(reply);
            }

            let n = match self.stream.read(&mut self.chunk) {
                Ok(0) => return Err(Error::ConnectionClosed),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            };
            self.parser.feed(&self.chunk[..n]);
        }
    }

    pub fn buffered(&self) -> usize {
        self.parser.buffered()
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resp::{Data, TextCodec};
    use crate::transport::buffer::tests::ChunkedReader;
    use bytes::Bytes;

    #[test]
    fn test_feed_byte_by_byte() {
        let mut parser = StreamingParser::default();
        let message = b"*2\r\n$3\r\nfoo\r\n:7\r\n";

        for (i, byte) in message.iter().enumerate() {
            assert!(parser.next_reply().unwrap().is_none(), "early reply at {i}");
            parser.feed(std::slice::from_ref(byte));
        }

        let reply = parser.next_reply().unwrap().unwrap();
        assert_eq!(
            reply,
            Reply::Array(Some(vec![
                Reply::BulkString(Some(Data::Bytes(Bytes::from_static(b"foo")))),
                Reply::Integer(7),
            ]))
        );
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_feed_several_replies() {
        let mut parser = StreamingParser::default();
        parser.feed(b":1\r\n:2\r\n:3");

        assert_eq!(parser.next_reply().unwrap(), Some(Reply::Integer(1)));
        assert_eq!(parser.next_reply().unwrap(), Some(Reply::Integer(2)));
        assert_eq!(parser.next_reply().unwrap(), None);
        assert_eq!(parser.buffered(), 2);

        parser.feed(b"\r\n");
        assert_eq!(parser.next_reply().unwrap(), Some(Reply::Integer(3)));
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_feed_large_array_in_small_chunks() {
        let count = 5_000;
        let element = b"$5\r\nhello\r\n";
        let mut message = format!("*{count}\r\n").into_bytes();
        for _ in 0..count {
            message.extend_from_slice(element);
        }

        let mut parser = StreamingParser::default();
        let mut chunks = message.chunks(7).peekable();
        let reply = loop {
            let chunk = chunks.next().expect("reply finished early");
            parser.feed(chunk);
            match parser.next_reply().unwrap() {
                Some(reply) => break reply,
                None => {
                    // Finished elements leave the buffer; only a partial
                    // token is carried to the next feed.
                    assert!(parser.buffered() < element.len());
                }
            }
        };

        assert!(chunks.peek().is_none());
        let items = reply.into_array().unwrap();
        assert_eq!(items.len(), count);
        assert!(items.iter().all(|item| item.as_bytes() == Some(&b"hello"[..])));
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_feed_nested_reply_across_feeds() {
        let mut parser = StreamingParser::default();
        parser.feed(b"*2\r\n*2\r\n:1\r\n");
        assert_eq!(parser.next_reply().unwrap(), None);
        assert_eq!(parser.buffered(), 0);

        parser.feed(b":2\r\n$3\r\nab");
        assert_eq!(parser.next_reply().unwrap(), None);
        parser.feed(b"c\r\n+next\r\n");

        assert_eq!(
            parser.next_reply().unwrap(),
            Some(Reply::Array(Some(vec![
                Reply::Array(Some(vec![Reply::Integer(1), Reply::Integer(2)])),
                Reply::BulkString(Some(Data::Bytes(Bytes::from_static(b"abc")))),
            ])))
        );
        assert_eq!(
            parser.next_reply().unwrap(),
            Some(Reply::SimpleString(Data::Bytes(Bytes::from_static(b"next"))))
        );
    }

    #[test]
    fn test_feed_deep_nesting_rejected() {
        let mut parser = StreamingParser::new(ReplyDecoder::default().with_max_depth(64));
        for _ in 0..200_000 {
            parser.feed(b"*1\r\n");
        }
        parser.feed(b":1\r\n");
        assert_eq!(parser.next_reply(), Err(ParseError::TooDeep(64)));
    }

    #[test]
    fn test_feed_protocol_error() {
        let mut parser = StreamingParser::default();
        parser.feed(b"%2\r\n");
        assert_eq!(parser.next_reply(), Err(ParseError::InvalidPrefix(b'%')));
    }

    #[test]
    fn test_feed_reader_fragmented() {
        let message = b"$5\r\nhello\r\n-ERR bad\r\n";
        for step in [1usize, 3, message.len()] {
            let mut reader = FeedReader::new(
                ChunkedReader::new(message, step),
                Box::new(StreamingParser::default()),
                ReplyDecoder::default(),
                4096,
            );
            assert_eq!(reader.read_reply().unwrap().as_bytes(), Some(&b"hello"[..]));
            assert!(reader.read_reply().unwrap().is_error());
            assert_eq!(reader.buffered(), 0);
            assert!(matches!(reader.read_reply(), Err(Error::ConnectionClosed)));
        }
    }

    #[test]
    fn test_feed_reader_decodes_text() {
        let mut reader = FeedReader::new(
            &b"+OK\r\n"[..],
            Box::new(StreamingParser::default()),
            ReplyDecoder::default().with_text(TextCodec::default()),
            4096,
        );
        assert_eq!(
            reader.read_reply().unwrap(),
            Reply::SimpleString(Data::Text("OK".to_string()))
        );
    }
}
