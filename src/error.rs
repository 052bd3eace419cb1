use crate::codec::Version;
use crate::prototype::Category;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unexpected end of stream: requested {requested} bytes, {available} available")]
    UnexpectedEof { requested: usize, available: usize },

    #[error("reading {requested} bytes is too large (limit {limit})")]
    ReadTooLarge { requested: usize, limit: usize },

    #[error("can't read {0} bytes as a number")]
    UnsupportedWidth(usize),

    #[error("unexpected boolean value {0:#04x}")]
    InvalidBoolean(u8),

    #[error("unexpected length 0xff for one-byte length")]
    ReservedLength,

    #[error("invalid string \"{0}\"")]
    InvalidString(String),

    #[error("{label}: expected 0x{expected}, got 0x{actual}")]
    SentinelMismatch {
        label: &'static str,
        expected: String,
        actual: String,
    },

    #[error("index {index} out of range for {what} ({len} choices)")]
    MappedIndexOutOfRange {
        what: &'static str,
        index: u64,
        len: usize,
    },

    #[error("timestamp {0} is too large")]
    TimestampOverflow(u64),

    #[error("branch version must be 0, got {0}")]
    BranchVersion(u8),

    #[error("entry {found} does not match {expected}")]
    PrototypeMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("blueprint books nested {depth} deep")]
    NestingTooDeep { depth: usize },

    #[error("{category} entry with id {id} not found in index")]
    UnresolvedReference { category: Category, id: u16 },

    #[error("blueprint version {0} is less than or equal to 1.0.0")]
    UnsupportedVersion(Version),

    #[error("not yet supported: {0}")]
    Unsupported(String),

    #[error("unexpected {len} bytes remaining in stream")]
    TrailingData { len: usize },

    #[error("timeout reading remaining data")]
    DrainTimeout,

    #[error("io error: {0}")]
    Io(String),
}

/// Broad failure classes, for callers that only care which kind of thing went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bytes that do not fit the format model. The stream is desynchronized.
    Structural,
    UnresolvedReference,
    StreamExhaustion,
    TrailingData,
    UnsupportedVersion,
    Timeout,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnexpectedEof { .. } => ErrorKind::StreamExhaustion,
            Self::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
            Self::UnsupportedVersion(_) | Self::Unsupported(_) => ErrorKind::UnsupportedVersion,
            Self::TrailingData { .. } => ErrorKind::TrailingData,
            Self::DrainTimeout => ErrorKind::Timeout,
            Self::Io(_) => ErrorKind::Io,
            Self::ReadTooLarge { .. }
            | Self::UnsupportedWidth(_)
            | Self::InvalidBoolean(_)
            | Self::ReservedLength
            | Self::InvalidString(_)
            | Self::SentinelMismatch { .. }
            | Self::MappedIndexOutOfRange { .. }
            | Self::TimestampOverflow(_)
            | Self::BranchVersion(_)
            | Self::PrototypeMismatch { .. }
            | Self::NestingTooDeep { .. } => ErrorKind::Structural,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
