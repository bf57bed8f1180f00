//! Classification of `-` error replies.
//!
//! The leading token of an error line is matched against a table of known
//! codes. Unknown codes are not a failure: they produce a `Generic` error
//! carrying the whole line, since servers add new codes over time.

use std::fmt;

/// Known error reply codes.
const BUILTIN_CODES: &[(&str, ReplyErrorKind)] = &[
    ("ERR", ReplyErrorKind::Err),
    ("EXECABORT", ReplyErrorKind::ExecAbort),
    ("LOADING", ReplyErrorKind::Loading),
    ("NOSCRIPT", ReplyErrorKind::NoScript),
];

/// Kind of an error reply, derived from its leading code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyErrorKind {
    /// No known code; the message is the full error line.
    Generic,
    /// `ERR`
    Err,
    /// `EXECABORT`: a transaction was discarded.
    ExecAbort,
    /// `LOADING`: the server is loading its dataset.
    Loading,
    /// `NOSCRIPT`: no script matches the given SHA.
    NoScript,
    /// A code registered through [`ErrorClassifier::with_code`].
    Custom(String),
}

impl ReplyErrorKind {
    /// The wire code for this kind, if it has one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ReplyErrorKind::Generic => None,
            ReplyErrorKind::Err => Some("ERR"),
            ReplyErrorKind::ExecAbort => Some("EXECABORT"),
            ReplyErrorKind::Loading => Some("LOADING"),
            ReplyErrorKind::NoScript => Some("NOSCRIPT"),
            ReplyErrorKind::Custom(code) => Some(code),
        }
    }
}

/// A typed error reply from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyError {
    kind: ReplyErrorKind,
    message: String,
}

impl ReplyError {
    pub fn new(kind: ReplyErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &ReplyErrorKind {
        &self.kind
    }

    /// The matched code, or `None` for generic errors.
    pub fn code(&self) -> Option<&str> {
        self.kind.code()
    }

    /// Message text with the code stripped.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ReplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code() {
            Some(code) if self.message.is_empty() => f.write_str(code),
            Some(code) => write!(f, "{} {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ReplyError {}

/// Maps error reply text to a [`ReplyError`].
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    extra: Vec<String>,
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recognize an additional code, classified as [`ReplyErrorKind::Custom`].
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.extra.push(code.into());
        self
    }

    /// Classify the payload of an error reply (the line without `-`).
    pub fn classify(&self, text: &str) -> ReplyError {
        let (code, rest) = match text.split_once(' ') {
            Some((code, rest)) => (code, rest),
            None => (text, ""),
        };

        if let Some((_, kind)) = BUILTIN_CODES.iter().find(|(known, _)| *known == code) {
            return ReplyError::new(kind.clone(), rest);
        }
        if self.extra.iter().any(|known| known == code) {
            return ReplyError::new(ReplyErrorKind::Custom(code.to_string()), rest);
        }

        ReplyError::new(ReplyErrorKind::Generic, text)
    }
}
