//! Client-side command encoding.
//!
//! Commands are encoded as RESP arrays of bulk strings:
//! `*<argc>\r\n` followed by `$<len>\r\n<bytes>\r\n` for every argument.

use super::text::TextCodec;
use crate::error::Result;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// A single command argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Raw bytes, sent verbatim.
    Bytes(Bytes),
    /// Signed integer, sent as base-10 ASCII.
    Int(i64),
    /// Unsigned integer, sent as base-10 ASCII.
    UInt(u64),
    /// Text, encoded with the connection's text codec.
    Text(String),
    /// Any other value, already rendered through `Display`. Sent as UTF-8.
    Display(String),
}

impl Arg {
    /// Render any displayable value as an argument.
    pub fn display(value: impl fmt::Display) -> Self {
        Arg::Display(value.to_string())
    }

    fn write_to(&self, codec: &TextCodec, buf: &mut BytesMut) -> Result<()> {
        match self {
            Arg::Bytes(data) => write_bulk(buf, data),
            Arg::Int(n) => {
                let mut fmt = itoa::Buffer::new();
                write_bulk(buf, fmt.format(*n).as_bytes());
            }
            Arg::UInt(n) => {
                let mut fmt = itoa::Buffer::new();
                write_bulk(buf, fmt.format(*n).as_bytes());
            }
            Arg::Text(text) => write_bulk(buf, &codec.encode(text)?),
            Arg::Display(text) => write_bulk(buf, text.as_bytes()),
        }
        Ok(())
    }
}

impl From<Bytes> for Arg {
    fn from(value: Bytes) -> Self {
        Arg::Bytes(value)
    }
}

impl From<&Bytes> for Arg {
    fn from(value: &Bytes) -> Self {
        Arg::Bytes(value.clone())
    }
}

impl From<Vec<u8>> for Arg {
    fn from(value: Vec<u8>) -> Self {
        Arg::Bytes(Bytes::from(value))
    }
}

impl From<&[u8]> for Arg {
    fn from(value: &[u8]) -> Self {
        Arg::Bytes(Bytes::copy_from_slice(value))
    }
}

impl<const N: usize> From<&[u8; N]> for Arg {
    fn from(value: &[u8; N]) -> Self {
        Arg::Bytes(Bytes::copy_from_slice(value))
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Text(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Text(value)
    }
}

impl From<&String> for Arg {
    fn from(value: &String) -> Self {
        Arg::Text(value.clone())
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg {
            fn from(value: $t) -> Self {
                Arg::Int(i64::from(value))
            }
        })*
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Arg {
            fn from(value: $t) -> Self {
                Arg::UInt(u64::from(value))
            }
        })*
    };
}

impl_from_signed!(i8, i16, i32, i64);
impl_from_unsigned!(u8, u16, u32, u64);

impl From<isize> for Arg {
    fn from(value: isize) -> Self {
        Arg::Int(value as i64)
    }
}

impl From<usize> for Arg {
    fn from(value: usize) -> Self {
        Arg::UInt(value as u64)
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Arg::display(value)
    }
}

impl From<f32> for Arg {
    fn from(value: f32) -> Self {
        Arg::display(value)
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Arg::display(value)
    }
}

/// An ordered sequence of arguments, the first being the command name.
///
/// # Example
///
/// ```
/// use resp_client::{Command, TextCodec};
///
/// let cmd = Command::new("SET").arg("key").arg(42);
/// let bytes = cmd.encode(&TextCodec::default()).unwrap();
/// assert_eq!(&bytes[..], b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$2\r\n42\r\n");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    args: Vec<Arg>,
}

impl Command {
    /// Start a command. A name with spaces (`"CONFIG GET"`) becomes several
    /// leading arguments.
    pub fn new(name: &str) -> Self {
        Self {
            args: name
                .split_whitespace()
                .map(|part| Arg::Bytes(Bytes::copy_from_slice(part.as_bytes())))
                .collect(),
        }
    }

    /// Build a command from pre-split arguments.
    pub fn from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Arg>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, T>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Arg>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn push(&mut self, arg: impl Into<Arg>) {
        self.args.push(arg.into());
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arg> {
        self.args.iter()
    }

    /// The command name as sent, for logging.
    pub fn name(&self) -> String {
        match self.args.first() {
            Some(Arg::Bytes(b)) => String::from_utf8_lossy(b).into_owned(),
            Some(Arg::Text(t) | Arg::Display(t)) => t.clone(),
            Some(Arg::Int(n)) => n.to_string(),
            Some(Arg::UInt(n)) => n.to_string(),
            None => String::new(),
        }
    }

    /// Encode into a fresh buffer.
    pub fn encode(&self, codec: &TextCodec) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.size_hint());
        self.encode_into(codec, &mut buf)?;
        Ok(buf.freeze())
    }

    /// Append the encoding to `buf`. On failure `buf` is left as it was.
    pub fn encode_into(&self, codec: &TextCodec, buf: &mut BytesMut) -> Result<()> {
        let start = buf.len();
        buf.put_u8(b'*');
        write_decimal(buf, self.args.len());
        buf.put_slice(b"\r\n");

        for arg in &self.args {
            if let Err(e) = arg.write_to(codec, buf) {
                buf.truncate(start);
                return Err(e);
            }
        }
        Ok(())
    }

    fn size_hint(&self) -> usize {
        self.args
            .iter()
            .map(|arg| {
                let len = match arg {
                    Arg::Bytes(b) => b.len(),
                    Arg::Text(t) | Arg::Display(t) => t.len(),
                    Arg::Int(_) | Arg::UInt(_) => 20,
                };
                len + 16
            })
            .sum::<usize>()
            + 16
    }
}

/// Encode several commands back to back into one buffer.
pub fn pack_commands<'a, I>(commands: I, codec: &TextCodec) -> Result<Bytes>
where
    I: IntoIterator<Item = &'a Command>,
{
    let mut buf = BytesMut::new();
    for command in commands {
        buf.reserve(command.size_hint());
        command.encode_into(codec, &mut buf)?;
    }
    Ok(buf.freeze())
}

fn write_decimal(buf: &mut BytesMut, n: usize) {
    let mut fmt = itoa::Buffer::new();
    buf.put_slice(fmt.format(n).as_bytes());
}

fn write_bulk(buf: &mut BytesMut, data: &[u8]) {
    buf.put_u8(b'$');
    write_decimal(buf, data.len());
    buf.put_slice(b"\r\n");
    buf.put_slice(data);
    buf.put_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::resp::parser::{parse, ParseResult};
    use crate::resp::reply::{Data, Reply};
    use crate::resp::text::{EncodingErrors, TextEncoding};

    fn encode(cmd: &Command) -> Bytes {
        cmd.encode(&TextCodec::default()).unwrap()
    }

    /// Decode an encoded command the way a server would and return its
    /// arguments.
    fn server_side_args(encoded: &[u8]) -> Vec<Vec<u8>> {
        match parse(encoded) {
            ParseResult::Complete(Reply::Array(Some(items)), consumed) => {
                assert_eq!(consumed, encoded.len());
                items
                    .into_iter()
                    .map(|item| match item {
                        Reply::BulkString(Some(Data::Bytes(b))) => b.to_vec(),
                        other => panic!("Expected bulk string, got {other:?}"),
                    })
                    .collect()
            }
            other => panic!("Expected array, got {other:?}"),
        }
    }

    #[test]
    fn test_encode_get() {
        let cmd = Command::new("GET").arg("mykey");
        assert_eq!(&encode(&cmd)[..], b"*2\r\n$3\r\nGET\r\n$5\r\nmykey\r\n");
    }

    #[test]
    fn test_encode_integers() {
        let cmd = Command::new("X").arg(0).arg(-42i64).arg(1234567890u64).arg(i64::MIN);
        assert_eq!(
            &encode(&cmd)[..],
            b"*5\r\n$1\r\nX\r\n$1\r\n0\r\n$3\r\n-42\r\n$10\r\n1234567890\r\n$20\r\n-9223372036854775808\r\n"
        );
    }

    #[test]
    fn test_encode_binary_bytes() {
        let value: &[u8] = b"a\r\nb\x00c";
        let cmd = Command::new("SET").arg("k").arg(value);
        assert_eq!(
            &encode(&cmd)[..],
            b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$6\r\na\r\nb\x00c\r\n"
        );
    }

    #[test]
    fn test_encode_display_values() {
        let cmd = Command::new("INCRBYFLOAT").arg("k").arg(2.5f64).arg(true);
        let args = server_side_args(&encode(&cmd));
        assert_eq!(args[2], b"2.5");
        assert_eq!(args[3], b"true");
    }

    #[test]
    fn test_multi_word_name() {
        let cmd = Command::new("CONFIG GET").arg("maxmemory");
        assert_eq!(cmd.len(), 3);
        assert_eq!(
            &encode(&cmd)[..],
            b"*3\r\n$6\r\nCONFIG\r\n$3\r\nGET\r\n$9\r\nmaxmemory\r\n"
        );
    }

    #[test]
    fn test_encode_empty_argument() {
        let cmd = Command::new("SET").arg("k").arg("");
        assert_eq!(&encode(&cmd)[..], b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$0\r\n\r\n");
    }

    #[test]
    fn test_round_trip_through_server_parser() {
        let text = "héllo wörld";
        let raw: Vec<u8> = (0..=255u8).collect();
        let cmd = Command::new("RPUSH")
            .arg("list")
            .arg(raw.clone())
            .arg(text)
            .arg(-7)
            .arg(0)
            .arg(u64::MAX);

        let args = server_side_args(&encode(&cmd));
        assert_eq!(
            args,
            vec![
                b"RPUSH".to_vec(),
                b"list".to_vec(),
                raw,
                text.as_bytes().to_vec(),
                b"-7".to_vec(),
                b"0".to_vec(),
                b"18446744073709551615".to_vec(),
            ]
        );
    }

    #[test]
    fn test_text_uses_codec() {
        let latin1 = TextCodec::new(TextEncoding::Latin1, EncodingErrors::Strict);
        let cmd = Command::new("SET").arg("k").arg("é");
        let encoded = cmd.encode(&latin1).unwrap();
        assert_eq!(&encoded[..], b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\n\xe9\r\n");
    }

    #[test]
    fn test_strict_encoding_failure_leaves_buffer_untouched() {
        let ascii = TextCodec::new(TextEncoding::Ascii, EncodingErrors::Strict);
        let mut buf = BytesMut::from(&b"prefix"[..]);
        let cmd = Command::new("SET").arg("k").arg("✓");

        assert!(matches!(cmd.encode_into(&ascii, &mut buf), Err(Error::Encoding(_))));
        assert_eq!(&buf[..], b"prefix");
    }

    #[test]
    fn test_pack_preserves_framing() {
        let codec = TextCodec::default();
        let a = Command::new("INCR").arg("a");
        let b = Command::new("GET").arg("a");

        let packed = pack_commands([&a, &b, &a], &codec).unwrap();
        let mut expected = BytesMut::new();
        expected.extend_from_slice(&a.encode(&codec).unwrap());
        expected.extend_from_slice(&b.encode(&codec).unwrap());
        expected.extend_from_slice(&a.encode(&codec).unwrap());
        assert_eq!(packed, expected.freeze());

        let mut rest = &packed[..];
        let mut names = Vec::new();
        while !rest.is_empty() {
            match parse(rest) {
                ParseResult::Complete(Reply::Array(Some(items)), consumed) => {
                    names.push(items[0].as_bytes().unwrap().to_vec());
                    rest = &rest[consumed..];
                }
                other => panic!("Expected array, got {other:?}"),
            }
        }
        assert_eq!(names, vec![b"INCR".to_vec(), b"GET".to_vec(), b"INCR".to_vec()]);
    }

    #[test]
    fn test_name() {
        assert_eq!(Command::new("CLIENT SETNAME").arg("x").name(), "CLIENT");
        assert_eq!(Command::default().name(), "");
    }
}
