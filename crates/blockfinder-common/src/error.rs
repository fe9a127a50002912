use std::error::Error;
use std::fmt;
use std::io;

/// How far a failure reaches. Chunk-scoped errors cost one slot, file-scoped
/// errors cost one region file; neither ends the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    Chunk,
    File,
}

#[derive(Debug)]
pub enum ScanError {
    IoError(io::Error),
    UnknownCompression(u8),
    TruncatedPayload { expected: u64, available: u64 },
    Decompression(io::Error),
    MalformedTag { offset: u64, reason: String },
    TagTooDeep { limit: usize },
    MissingField(String),
    InvalidLength {
        field: String,
        expected: usize,
        actual: usize,
    },
}

impl ScanError {
    pub fn malformed(offset: u64, reason: impl Into<String>) -> Self {
        ScanError::MalformedTag {
            offset,
            reason: reason.into(),
        }
    }

    pub fn missing(path: impl Into<String>) -> Self {
        ScanError::MissingField(path.into())
    }

    pub fn scope(&self) -> ErrorScope {
        match self {
            ScanError::IoError(_) => ErrorScope::File,
            _ => ErrorScope::Chunk,
        }
    }

    /// Short stable name of the variant, used when tallying failures.
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::IoError(_) => "io",
            ScanError::UnknownCompression(_) => "unknown-compression",
            ScanError::TruncatedPayload { .. } => "truncated-payload",
            ScanError::Decompression(_) => "decompression",
            ScanError::MalformedTag { .. } => "malformed-tag",
            ScanError::TagTooDeep { .. } => "tag-too-deep",
            ScanError::MissingField(_) => "missing-field",
            ScanError::InvalidLength { .. } => "invalid-length",
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::IoError(err) => write!(f, "IO error: {}", err),
            ScanError::UnknownCompression(kind) => {
                write!(f, "Unknown compression type: {}", kind)
            }
            ScanError::TruncatedPayload {
                expected,
                available,
            } => write!(
                f,
                "Truncated payload: expected {} bytes, {} available",
                expected, available
            ),
            ScanError::Decompression(err) => write!(f, "Decompression failed: {}", err),
            ScanError::MalformedTag { offset, reason } => {
                write!(f, "Malformed tag at byte {}: {}", offset, reason)
            }
            ScanError::TagTooDeep { limit } => {
                write!(f, "Tag nesting exceeds depth limit of {}", limit)
            }
            ScanError::MissingField(path) => write!(f, "Missing field: {}", path),
            ScanError::InvalidLength {
                field,
                expected,
                actual,
            } => write!(
                f,
                "Invalid length for {}: expected {}, got {}",
                field, expected, actual
            ),
        }
    }
}

impl Error for ScanError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ScanError::IoError(err) | ScanError::Decompression(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ScanError {
    fn from(err: io::Error) -> Self {
        ScanError::IoError(err)
    }
}
