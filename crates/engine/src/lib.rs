//! UI-agnostic engine for the subtitle alignment editor.

pub mod api;
pub mod config;
pub mod correction;
pub mod document;
pub mod error;
pub mod history;
pub mod snapshot;
pub mod srt;
pub mod time;
pub mod view;

pub use api::{Command, EngineErrorEvent, EngineErrorKind, Event, Session};
pub use config::EditorConfig;
pub use correction::{CorrectionEntry, CorrectionSnapshot, CorrectionStatus, CorrectionTable};
pub use document::{Document, SplitPiece, TextTarget};
pub use error::{EngineError, Result};
pub use history::{
    Clock, History, HistoryConfig, HistoryEntry, ManualClock, Operation, OperationKind, Restored,
    SaveOutcome, SystemClock,
};
pub use snapshot::{DisplayMode, Snapshot, SubtitleRow};
pub use view::{TimeRange, ViewConfig, ViewRangeCalculator, validate_range};
