//! A single client connection.
//!
//! A connection owns one socket and one read cursor. It is built from a
//! [`ConnectionConfig`] without touching the network; [`Connection::connect`]
//! opens the socket and runs the `AUTH` / `SELECT` handshake.
//!
//! Any transport or protocol fault closes the socket before the error is
//! returned, so a half-read stream is never reused. There is no automatic
//! reconnect: call `connect()` again.

use crate::config::{ConnectionConfig, ParserKind};
use crate::error::{Error, Result};
use crate::resp::{pack_commands, Command, Reply, ReplyDecoder, TextCodec};
use crate::transport::{FeedReader, ReplyParser, SocketBuffer, Stream, StreamingParser};
use std::fmt;
use std::io::Write;
use tracing::{debug, trace, warn};

/// Builds the push-style parser used with [`ParserKind::Feed`].
pub type ParserFactory = Box<dyn Fn(ReplyDecoder) -> Box<dyn ReplyParser> + Send>;

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectState {
    Disconnected,
    Connecting,
    Handshaking,
    Ready,
}

/// Reply source over the connected socket.
enum Reader {
    Buffered(SocketBuffer<Stream>),
    Feed(FeedReader<Stream>),
}

impl Reader {
    fn stream(&self) -> &Stream {
        match self {
            Reader::Buffered(r) => r.get_ref(),
            Reader::Feed(r) => r.get_ref(),
        }
    }

    fn stream_mut(&mut self) -> &mut Stream {
        match self {
            Reader::Buffered(r) => r.get_mut(),
            Reader::Feed(r) => r.get_mut(),
        }
    }

    fn read_reply(&mut self, decoder: &ReplyDecoder) -> Result<Reply> {
        match self {
            Reader::Buffered(r) => decoder.read_reply(r),
            Reader::Feed(r) => r.read_reply(),
        }
    }

    fn buffered(&self) -> usize {
        match self {
            Reader::Buffered(r) => r.len(),
            Reader::Feed(r) => r.buffered(),
        }
    }
}

/// A blocking connection to a RESP server.
///
/// Not safe for concurrent use; give each concurrent caller its own
/// connection.
pub struct Connection {
    config: ConnectionConfig,
    codec: TextCodec,
    decoder: ReplyDecoder,
    parser_factory: ParserFactory,
    state: ConnectState,
    reader: Option<Reader>,
}

impl Connection {
    /// Create a disconnected connection.
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_parser(
            config,
            Box::new(|decoder: ReplyDecoder| {
                Box::new(StreamingParser::new(decoder)) as Box<dyn ReplyParser>
            }),
        )
    }

    /// Create a disconnected connection that uses `factory` to build its
    /// reply parser when configured with [`ParserKind::Feed`].
    pub fn with_parser(config: ConnectionConfig, factory: ParserFactory) -> Self {
        Self {
            codec: config.text_codec(),
            decoder: config.decoder(),
            config,
            parser_factory: factory,
            state: ConnectState::Disconnected,
            reader: None,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    /// Bytes received but not yet decoded.
    pub fn buffered(&self) -> usize {
        self.reader.as_ref().map_or(0, Reader::buffered)
    }

    /// Open the socket and run the handshake. Does nothing if already
    /// connected.
    pub fn connect(&mut self) -> Result<()> {
        if self.reader.is_some() {
            return Ok(());
        }

        self.state = ConnectState::Connecting;
        let options = self.config.socket_options();
        let stream = match &self.config.unix_socket {
            Some(path) => Stream::connect_unix(path, &options),
            None => Stream::connect_tcp(&self.config.host, self.config.port, &options),
        };
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                self.state = ConnectState::Disconnected;
                warn!(conn = %self, error = %e, "Connect failed");
                return Err(Error::Io(e));
            }
        };

        let chunk_size = self.config.read_chunk_size;
        self.reader = Some(match self.config.parser {
            ParserKind::Buffered => Reader::Buffered(SocketBuffer::new(stream, chunk_size)),
            ParserKind::Feed => Reader::Feed(FeedReader::new(
                stream,
                (self.parser_factory)(self.decoder.raw()),
                self.decoder.clone(),
                chunk_size,
            )),
        });
        debug!(conn = %self, parser = ?self.config.parser, "Connected");

        self.state = ConnectState::Handshaking;
        if let Err(e) = self.handshake() {
            warn!(conn = %self, error = %e, "Handshake failed");
            self.disconnect();
            return Err(e);
        }

        self.state = ConnectState::Ready;
        Ok(())
    }

    fn handshake(&mut self) -> Result<()> {
        if let Some(password) = &self.config.password {
            let mut auth = Command::new("AUTH");
            if let Some(username) = &self.config.username {
                auth.push(username.as_str());
            }
            auth.push(password.as_str());
            self.expect_ok(&auth, "AUTH")?;
            debug!(conn = %self, "Authenticated");
        }

        if let Some(db) = self.config.db {
            self.expect_ok(&Command::new("SELECT").arg(db), "SELECT")?;
            debug!(conn = %self, db, "Selected database");
        }
        Ok(())
    }

    fn expect_ok(&mut self, command: &Command, what: &str) -> Result<()> {
        let packed = command.encode(&self.codec)?;
        self.write_all(&packed)?;

        let reader = self.reader.as_mut().ok_or(Error::NotConnected)?;
        let reply = reader.read_reply(&self.decoder)?;
        if reply.is_ok() {
            Ok(())
        } else {
            Err(Error::Authentication(format!("{what} rejected: {reply}")))
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let reader = self.reader.as_mut().ok_or(Error::NotConnected)?;
        let stream = reader.stream_mut();
        stream.write_all(data)?;
        stream.flush()?;
        Ok(())
    }

    /// Close the socket and drop any buffered bytes. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.stream().shutdown();
            debug!(conn = %self, "Disconnected");
        }
        self.state = ConnectState::Disconnected;
    }

    /// Write pre-encoded bytes.
    pub fn send_packed(&mut self, data: &[u8]) -> Result<()> {
        if self.reader.is_none() {
            return Err(Error::NotConnected);
        }
        if let Err(e) = self.write_all(data) {
            warn!(conn = %self, error = %e, "Write failed, disconnecting");
            self.disconnect();
            return Err(e);
        }
        Ok(())
    }

    /// Encode and write one command.
    pub fn send_command(&mut self, command: &Command) -> Result<()> {
        let packed = command.encode(&self.codec)?;
        trace!(conn = %self, command = %command.name(), bytes = packed.len(), "Sending command");
        self.send_packed(&packed)
    }

    /// Encode all `commands` and write them with a single write.
    pub fn send_pipeline(&mut self, commands: &[Command]) -> Result<()> {
        let packed = pack_commands(commands, &self.codec)?;
        trace!(conn = %self, commands = commands.len(), bytes = packed.len(), "Sending pipeline");
        self.send_packed(&packed)
    }

    /// Read one reply. Error replies are returned as [`Reply::Error`].
    pub fn read_reply(&mut self) -> Result<Reply> {
        let reader = self.reader.as_mut().ok_or(Error::NotConnected)?;
        match reader.read_reply(&self.decoder) {
            Ok(reply) => Ok(reply),
            Err(e) => {
                warn!(conn = %self, error = %e, "Read failed, disconnecting");
                self.disconnect();
                Err(e)
            }
        }
    }

    /// Read exactly `n` replies in the order they arrive.
    pub fn read_n(&mut self, n: usize) -> Result<Vec<Reply>> {
        let mut replies = Vec::with_capacity(n);
        for _ in 0..n {
            replies.push(self.read_reply()?);
        }
        Ok(replies)
    }

    /// Send one command and read its reply. An error reply becomes
    /// `Err(Error::Reply)`; the connection stays usable.
    pub fn execute(&mut self, command: &Command) -> Result<Reply> {
        self.send_command(command)?;
        self.read_reply()?.into_result()
    }

    /// Whether a reply can be read without blocking.
    pub fn can_read(&mut self) -> Result<bool> {
        let Some(reader) = self.reader.as_ref() else {
            return Ok(false);
        };
        if reader.buffered() > 0 {
            return Ok(true);
        }
        match reader.stream().poll_readable() {
            Ok(readable) => Ok(readable),
            Err(e) => {
                self.disconnect();
                Err(Error::Io(e))
            }
        }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.config.describe())
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("target", &self.config.describe())
            .field("state", &self.state)
            .field("buffered", &self.buffered())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}
