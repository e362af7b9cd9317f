use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::snapshot::{DisplayMode, Snapshot, SubtitleRow};

/// Which text column an edit or split applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextTarget {
    #[default]
    Srt,
    WordText,
}

/// One piece of a row being split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPiece {
    pub text: String,
    pub start_ms: i64,
    pub end_ms: i64,
}

/// Live, mutable set of subtitle rows.
///
/// Rows are stored behind `Arc` and mutated copy-on-write, so taking a
/// [`Snapshot`] after an edit only allocates for the rows that changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    rows: Vec<Arc<SubtitleRow>>,
    display_mode: DisplayMode,
}

impl Document {
    /// Builds a document and renumbers rows `1..=n` in the given order.
    pub fn from_rows(rows: Vec<SubtitleRow>, display_mode: DisplayMode) -> Self {
        let mut document = Self {
            rows: rows.into_iter().map(Arc::new).collect(),
            display_mode,
        };
        document.renumber();
        document
    }

    pub fn rows(&self) -> &[Arc<SubtitleRow>] {
        &self.rows
    }

    pub fn row(&self, position: usize) -> Option<&SubtitleRow> {
        self.rows.get(position).map(|row| row.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    pub fn set_display_mode(&mut self, display_mode: DisplayMode) {
        self.display_mode = display_mode;
    }

    /// Captures the current rows without copying row contents.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.rows.clone(), self.display_mode)
    }

    /// Replaces the live rows with the rows of `snapshot`.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.rows = snapshot.rows().to_vec();
        self.display_mode = snapshot.display_mode();
    }

    /// Merges contiguous rows into one and returns the merged row position.
    ///
    /// The merged row keeps the first row's start and tags, takes the last
    /// row's end, and joins non-empty texts with a single space.
    ///
    /// # Example
    /// ```
    /// use align_engine::{DisplayMode, Document, SubtitleRow};
    ///
    /// let mut document = Document::from_rows(
    ///     vec![
    ///         SubtitleRow::new(1, 0, 1_000, "hello"),
    ///         SubtitleRow::new(2, 1_000, 2_000, "world"),
    ///     ],
    ///     DisplayMode::Srt,
    /// );
    /// document.combine_rows(&[0, 1]).expect("combine");
    /// assert_eq!(document.rows()[0].text, "hello world");
    /// assert_eq!(document.rows()[0].end_ms, 2_000);
    /// ```
    pub fn combine_rows(&mut self, positions: &[usize]) -> Result<usize> {
        let mut sorted = positions.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        if sorted.len() < 2 {
            warn!(count = sorted.len(), "combine rejected: not enough rows");
            return Err(EngineError::CombineNeedsTwoRows {
                count: sorted.len(),
            });
        }
        if let Some(&position) = sorted.iter().find(|&&position| position >= self.rows.len()) {
            warn!(position, "combine rejected: row not found");
            return Err(EngineError::RowNotFound { position });
        }
        if sorted.windows(2).any(|pair| pair[1] != pair[0] + 1) {
            warn!(positions = ?sorted, "combine rejected: rows are not contiguous");
            return Err(EngineError::NonContiguousRows { positions: sorted });
        }

        let first = sorted[0];
        let last = sorted[sorted.len() - 1];
        let merged_rows = &self.rows[first..=last];

        let text = join_non_empty(merged_rows.iter().map(|row| row.text.as_str()));
        let word_texts: Vec<&str> = merged_rows
            .iter()
            .filter_map(|row| row.word_text.as_deref())
            .collect();
        let word_text = if word_texts.is_empty() {
            None
        } else {
            Some(join_non_empty(word_texts.into_iter()))
        };

        let combined = SubtitleRow {
            index: merged_rows[0].index,
            start_ms: merged_rows[0].start_ms,
            end_ms: merged_rows[merged_rows.len() - 1].end_ms,
            text,
            word_text,
            use_word_text: merged_rows.iter().any(|row| row.use_word_text),
            tags: merged_rows[0].tags.clone(),
        };

        debug!(
            first,
            last,
            start_ms = combined.start_ms,
            end_ms = combined.end_ms,
            "combine accepted"
        );

        self.rows.splice(first..=last, [Arc::new(combined)]);
        self.renumber();
        Ok(first)
    }

    /// Replaces one row with `pieces` and returns the positions they occupy.
    ///
    /// Pieces must be ordered, non-overlapping, non-empty in time, and lie
    /// inside the original row's time span.
    pub fn split_row(
        &mut self,
        position: usize,
        pieces: &[SplitPiece],
        target: TextTarget,
    ) -> Result<Range<usize>> {
        let Some(original) = self.rows.get(position).cloned() else {
            warn!(position, "split rejected: row not found");
            return Err(EngineError::RowNotFound { position });
        };
        validate_pieces(&original, pieces)?;

        let replacement: Vec<Arc<SubtitleRow>> = pieces
            .iter()
            .enumerate()
            .map(|(offset, piece)| {
                let first = offset == 0;
                let (text, word_text) = match target {
                    TextTarget::Srt => (
                        piece.text.clone(),
                        original.word_text.clone().filter(|_| first),
                    ),
                    TextTarget::WordText => (
                        if first {
                            original.text.clone()
                        } else {
                            String::new()
                        },
                        Some(piece.text.clone()),
                    ),
                };
                Arc::new(SubtitleRow {
                    index: original.index,
                    start_ms: piece.start_ms,
                    end_ms: piece.end_ms,
                    text,
                    word_text,
                    use_word_text: original.use_word_text,
                    tags: original.tags.clone(),
                })
            })
            .collect();

        debug!(
            position,
            piece_count = pieces.len(),
            target = ?target,
            "split accepted"
        );

        self.rows.splice(position..=position, replacement);
        self.renumber();
        Ok(position..position + pieces.len())
    }

    /// Sets every row's end to the next row's start and returns how many
    /// rows changed. The last row keeps its end.
    pub fn align_end_times(&mut self) -> Result<usize> {
        if self.rows.is_empty() {
            warn!("align rejected: document is empty");
            return Err(EngineError::RowNotFound { position: 0 });
        }

        let mut changed = 0;
        for position in 0..self.rows.len() - 1 {
            let next_start = self.rows[position + 1].start_ms;
            if self.rows[position].end_ms != next_start {
                Arc::make_mut(&mut self.rows[position]).end_ms = next_start;
                changed += 1;
            }
        }

        debug!(changed, row_count = self.rows.len(), "end times aligned");
        Ok(changed)
    }

    /// Replaces the SRT or reference text of one row.
    pub fn edit_text(&mut self, position: usize, text: &str, target: TextTarget) -> Result<()> {
        let Some(row) = self.rows.get_mut(position) else {
            warn!(position, "edit rejected: row not found");
            return Err(EngineError::RowNotFound { position });
        };
        let row = Arc::make_mut(row);
        match target {
            TextTarget::Srt => row.text = text.to_string(),
            TextTarget::WordText => row.word_text = Some(text.to_string()),
        }
        Ok(())
    }

    fn renumber(&mut self) {
        for (position, row) in self.rows.iter_mut().enumerate() {
            let expected = position as u32 + 1;
            if row.index != expected {
                Arc::make_mut(row).index = expected;
            }
        }
    }
}

fn join_non_empty<'a>(texts: impl Iterator<Item = &'a str>) -> String {
    texts
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn validate_pieces(original: &SubtitleRow, pieces: &[SplitPiece]) -> Result<()> {
    let (Some(first), Some(last)) = (pieces.first(), pieces.last()) else {
        return Err(EngineError::InvalidSplit { reason: "no pieces" });
    };
    if pieces.iter().any(|piece| piece.end_ms <= piece.start_ms) {
        return Err(EngineError::InvalidSplit {
            reason: "piece has no duration",
        });
    }
    if pieces.windows(2).any(|pair| pair[0].end_ms > pair[1].start_ms) {
        return Err(EngineError::InvalidSplit {
            reason: "pieces overlap or are out of order",
        });
    }
    if first.start_ms < original.start_ms || last.end_ms > original.end_ms {
        return Err(EngineError::InvalidSplit {
            reason: "piece lies outside the row",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Document, SplitPiece, TextTarget};
    use crate::error::EngineError;
    use crate::snapshot::{DisplayMode, SubtitleRow};

    fn sample_document() -> Document {
        Document::from_rows(
            vec![
                SubtitleRow::new(1, 0, 900, "one"),
                SubtitleRow::new(2, 1_000, 1_900, "two"),
                SubtitleRow::new(3, 2_000, 2_900, "three"),
            ],
            DisplayMode::Srt,
        )
    }

    #[test]
    fn combine_renumbers_following_rows() {
        let mut document = sample_document();

        let position = document.combine_rows(&[1, 0]).expect("combine");

        assert_eq!(position, 0);
        assert_eq!(document.len(), 2);
        assert_eq!(document.rows()[0].text, "one two");
        assert_eq!(document.rows()[0].end_ms, 1_900);
        assert_eq!(document.rows()[1].index, 2);
        assert_eq!(document.rows()[1].text, "three");
    }

    #[test]
    fn combine_rejects_single_row() {
        let mut document = sample_document();
        let result = document.combine_rows(&[2, 2]);
        assert!(matches!(
            result,
            Err(EngineError::CombineNeedsTwoRows { count: 1 })
        ));
    }

    #[test]
    fn combine_rejects_gaps_between_rows() {
        let mut document = sample_document();
        let result = document.combine_rows(&[0, 2]);
        assert!(matches!(result, Err(EngineError::NonContiguousRows { .. })));
        assert_eq!(document.len(), 3);
    }

    #[test]
    fn combine_joins_word_text_when_present() {
        let mut rows = vec![
            SubtitleRow::new(1, 0, 10, "a"),
            SubtitleRow::new(2, 10, 20, "b"),
        ];
        rows[1].word_text = Some("B".to_string());
        let mut document = Document::from_rows(rows, DisplayMode::SrtWord);

        document.combine_rows(&[0, 1]).expect("combine");

        assert_eq!(document.rows()[0].word_text.as_deref(), Some("B"));
    }

    #[test]
    fn split_inserts_pieces_and_shifts_indices() {
        let mut document = sample_document();
        let pieces = [
            SplitPiece {
                text: "tw".to_string(),
                start_ms: 1_000,
                end_ms: 1_400,
            },
            SplitPiece {
                text: "o".to_string(),
                start_ms: 1_400,
                end_ms: 1_900,
            },
        ];

        let range = document
            .split_row(1, &pieces, TextTarget::Srt)
            .expect("split");

        assert_eq!(range, 1..3);
        let indices: Vec<u32> = document.rows().iter().map(|row| row.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
        assert_eq!(document.rows()[2].text, "o");
        assert_eq!(document.rows()[3].text, "three");
    }

    #[test]
    fn split_word_text_keeps_srt_text_on_first_piece() {
        let mut document = sample_document();
        let pieces = [
            SplitPiece {
                text: "first".to_string(),
                start_ms: 0,
                end_ms: 400,
            },
            SplitPiece {
                text: "second".to_string(),
                start_ms: 400,
                end_ms: 900,
            },
        ];

        document
            .split_row(0, &pieces, TextTarget::WordText)
            .expect("split");

        assert_eq!(document.rows()[0].text, "one");
        assert_eq!(document.rows()[0].word_text.as_deref(), Some("first"));
        assert_eq!(document.rows()[1].text, "");
        assert_eq!(document.rows()[1].word_text.as_deref(), Some("second"));
    }

    #[test]
    fn split_rejects_pieces_outside_the_row() {
        let mut document = sample_document();
        let pieces = [SplitPiece {
            text: "late".to_string(),
            start_ms: 1_500,
            end_ms: 2_500,
        }];

        let result = document.split_row(1, &pieces, TextTarget::Srt);
        assert!(matches!(result, Err(EngineError::InvalidSplit { .. })));
    }

    #[test]
    fn align_end_times_closes_gaps_except_last_row() {
        let mut document = sample_document();

        let changed = document.align_end_times().expect("align");

        assert_eq!(changed, 2);
        assert_eq!(document.rows()[0].end_ms, 1_000);
        assert_eq!(document.rows()[1].end_ms, 2_000);
        assert_eq!(document.rows()[2].end_ms, 2_900);
    }

    #[test]
    fn align_end_times_fails_on_empty_document() {
        let mut document = Document::default();
        assert!(matches!(
            document.align_end_times(),
            Err(EngineError::RowNotFound { position: 0 })
        ));
    }

    #[test]
    fn edit_shares_untouched_rows_with_previous_snapshot() {
        let mut document = sample_document();
        let before = document.snapshot();

        document
            .edit_text(1, "TWO", TextTarget::Srt)
            .expect("edit");
        let after = document.snapshot();

        assert!(after.shares_row_with(&before, 0));
        assert!(!after.shares_row_with(&before, 1));
        assert!(after.shares_row_with(&before, 2));
        assert_eq!(before.rows()[1].text, "two");
    }

    #[test]
    fn restore_brings_back_rows_and_display_mode() {
        let mut document = sample_document();
        let before = document.snapshot();

        document.combine_rows(&[0, 1, 2]).expect("combine");
        document.set_display_mode(DisplayMode::All);
        document.restore(&before);

        assert_eq!(document.snapshot(), before);
    }
}
