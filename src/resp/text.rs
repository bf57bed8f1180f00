//! Text encoding used for `Text` arguments and decoded replies.

use crate::error::{Error, Result};
use bytes::Bytes;
use serde::Deserialize;

/// Character encoding for text values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum TextEncoding {
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "latin-1", alias = "latin1", alias = "iso-8859-1")]
    Latin1,
    #[serde(rename = "ascii")]
    Ascii,
}

impl TextEncoding {
    /// Highest code point the encoding represents in a single byte, if it is
    /// a single-byte encoding.
    fn single_byte_limit(self) -> Option<u32> {
        match self {
            TextEncoding::Utf8 => None,
            TextEncoding::Latin1 => Some(0xff),
            TextEncoding::Ascii => Some(0x7f),
        }
    }
}

impl std::str::FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(TextEncoding::Latin1),
            "ascii" | "us-ascii" => Ok(TextEncoding::Ascii),
            other => Err(format!("unsupported encoding: {other}")),
        }
    }
}

/// What to do with characters or bytes the encoding cannot represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingErrors {
    /// Fail with [`Error::Encoding`].
    #[default]
    Strict,
    /// Substitute `?` when encoding and U+FFFD when decoding.
    Replace,
    /// Drop the offending unit.
    Ignore,
}

impl std::str::FromStr for EncodingErrors {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(EncodingErrors::Strict),
            "replace" => Ok(EncodingErrors::Replace),
            "ignore" => Ok(EncodingErrors::Ignore),
            other => Err(format!("unsupported error policy: {other}")),
        }
    }
}

/// Encoding plus error policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextCodec {
    pub encoding: TextEncoding,
    pub errors: EncodingErrors,
}

impl TextCodec {
    pub fn new(encoding: TextEncoding, errors: EncodingErrors) -> Self {
        Self { encoding, errors }
    }

    /// Encode text to wire bytes.
    pub fn encode(&self, text: &str) -> Result<Bytes> {
        let Some(limit) = self.encoding.single_byte_limit() else {
            return Ok(Bytes::copy_from_slice(text.as_bytes()));
        };

        let mut out = Vec::with_capacity(text.len());
        for (pos, ch) in text.char_indices() {
            let cp = ch as u32;
            if cp <= limit {
                out.push(cp as u8);
                continue;
            }
            match self.errors {
                EncodingErrors::Strict => {
                    return Err(Error::Encoding(format!(
                        "{:?} can't encode character {:?} in position {}",
                        self.encoding, ch, pos
                    )))
                }
                EncodingErrors::Replace => out.push(b'?'),
                EncodingErrors::Ignore => {}
            }
        }
        Ok(Bytes::from(out))
    }

    /// Decode wire bytes to text.
    pub fn decode(&self, data: &[u8]) -> Result<String> {
        match self.encoding.single_byte_limit() {
            None => self.decode_utf8(data),
            Some(limit) => {
                let mut out = String::with_capacity(data.len());
                for (pos, &b) in data.iter().enumerate() {
                    if u32::from(b) <= limit {
                        out.push(char::from(b));
                        continue;
                    }
                    match self.errors {
                        EncodingErrors::Strict => {
                            return Err(Error::Encoding(format!(
                                "{:?} can't decode byte {:#04x} in position {}",
                                self.encoding, b, pos
                            )))
                        }
                        EncodingErrors::Replace => out.push(char::REPLACEMENT_CHARACTER),
                        EncodingErrors::Ignore => {}
                    }
                }
                Ok(out)
            }
        }
    }

    fn decode_utf8(&self, data: &[u8]) -> Result<String> {
        match std::str::from_utf8(data) {
            Ok(s) => Ok(s.to_string()),
            Err(e) => match self.errors {
                EncodingErrors::Strict => Err(Error::Encoding(format!(
                    "invalid utf-8 at position {}",
                    e.valid_up_to()
                ))),
                EncodingErrors::Replace => Ok(String::from_utf8_lossy(data).into_owned()),
                EncodingErrors::Ignore => {
                    let mut out = String::with_capacity(data.len());
                    for chunk in data.utf8_chunks() {
                        out.push_str(chunk.valid());
                    }
                    Ok(out)
                }
            },
        }
    }
}
