use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by document edits, parsing and configuration loading.
///
/// The history and view range components never produce these: they report
/// "nothing happened" through `Option`/`bool` and normalise bad ranges.
#[derive(Debug)]
pub enum EngineError {
    RowNotFound {
        position: usize,
    },
    CombineNeedsTwoRows {
        count: usize,
    },
    NonContiguousRows {
        positions: Vec<usize>,
    },
    InvalidSplit {
        reason: &'static str,
    },
    InvalidTimestamp(String),
    MalformedSrt {
        line: usize,
        reason: &'static str,
    },
    AudioNotLoaded,
    CorrectionNotFound {
        index: String,
    },
    Serialization {
        source: serde_json::Error,
    },
    Config {
        source: toml::de::Error,
    },
    Io {
        context: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RowNotFound { position } => write!(f, "row not found at position {position}"),
            Self::CombineNeedsTwoRows { count } => {
                write!(f, "combine needs at least two rows, got {count}")
            }
            Self::NonContiguousRows { positions } => {
                write!(f, "rows to combine are not contiguous: {positions:?}")
            }
            Self::InvalidSplit { reason } => write!(f, "invalid split: {reason}"),
            Self::InvalidTimestamp(value) => write!(f, "invalid timestamp: {value:?}"),
            Self::MalformedSrt { line, reason } => {
                write!(f, "malformed srt at line {line}: {reason}")
            }
            Self::AudioNotLoaded => write!(f, "audio duration is not set"),
            Self::CorrectionNotFound { index } => {
                write!(f, "no correction recorded for row {index}")
            }
            Self::Serialization { source } => write!(f, "serialization failed ({source})"),
            Self::Config { source } => write!(f, "invalid configuration ({source})"),
            Self::Io {
                context,
                path,
                source,
            } => write!(f, "{context}: {} ({source})", path.display()),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Serialization { source } => Some(source),
            Self::Config { source } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization { source: value }
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(value: toml::de::Error) -> Self {
        Self::Config { source: value }
    }
}
