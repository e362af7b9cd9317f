use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One subtitle entry as shown in the alignment table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleRow {
    pub index: u32,
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_text: Option<String>,
    /// Whether the reference document text replaces the SRT text on export.
    #[serde(default)]
    pub use_word_text: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl SubtitleRow {
    /// Creates a row with only timing and SRT text.
    pub fn new(index: u32, start_ms: i64, end_ms: i64, text: impl Into<String>) -> Self {
        Self {
            index,
            start_ms,
            end_ms,
            text: text.into(),
            word_text: None,
            use_word_text: false,
            tags: Vec::new(),
        }
    }

    /// Text that should be exported for this row.
    pub fn effective_text(&self) -> &str {
        match (&self.word_text, self.use_word_text) {
            (Some(word_text), true) => word_text,
            _ => &self.text,
        }
    }
}

/// Column layout of the alignment table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// SRT only.
    #[default]
    Srt,
    /// SRT and reference document text.
    SrtWord,
    /// SRT and audio.
    AudioSrt,
    /// SRT, reference document text and audio.
    All,
}

/// Immutable, cheaply clonable picture of the editable rows.
///
/// Rows are reference counted so consecutive snapshots share every row an
/// edit did not touch. Equality compares row values, not pointers.
///
/// # Example
/// ```
/// use align_engine::{DisplayMode, Snapshot, SubtitleRow};
///
/// let snapshot = Snapshot::from_rows(
///     vec![SubtitleRow::new(1, 0, 1_000, "hello")],
///     DisplayMode::Srt,
/// );
/// let copy = snapshot.clone();
/// assert!(copy.shares_row_with(&snapshot, 0));
/// assert_eq!(copy, snapshot);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    rows: Arc<[Arc<SubtitleRow>]>,
    display_mode: DisplayMode,
}

impl Snapshot {
    pub fn new(rows: Vec<Arc<SubtitleRow>>, display_mode: DisplayMode) -> Self {
        Self {
            rows: Arc::from(rows),
            display_mode,
        }
    }

    pub fn from_rows(rows: Vec<SubtitleRow>, display_mode: DisplayMode) -> Self {
        Self::new(rows.into_iter().map(Arc::new).collect(), display_mode)
    }

    pub fn rows(&self) -> &[Arc<SubtitleRow>] {
        &self.rows
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns true when both snapshots hold the very same allocation for the
    /// row at `position`.
    pub fn shares_row_with(&self, other: &Snapshot, position: usize) -> bool {
        match (self.rows.get(position), other.rows.get(position)) {
            (Some(left), Some(right)) => Arc::ptr_eq(left, right),
            _ => false,
        }
    }
}
