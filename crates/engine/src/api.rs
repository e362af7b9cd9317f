use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EditorConfig;
use crate::correction::{
    CorrectionSnapshot, CorrectionStatus, CorrectionTable, check_text_for_correction,
};
use crate::document::{Document, SplitPiece, TextTarget};
use crate::error::{EngineError, Result};
use crate::history::{Clock, History, Operation, OperationKind, SystemClock};
use crate::snapshot::{DisplayMode, Snapshot, SubtitleRow};
use crate::view::{TimeRange, ViewConfig, ViewRangeCalculator};

/// Commands accepted by the session.
///
/// Row positions are zero-based offsets into the current document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Replaces the document and starts a fresh history.
    ///
    /// # Example
    /// ```
    /// use align_engine::{Command, EditorConfig, Event, Session, SubtitleRow};
    ///
    /// let mut session = Session::new(EditorConfig::default());
    /// let events = session
    ///     .handle_command(Command::Load {
    ///         rows: vec![SubtitleRow::new(1, 0, 1_000, "hello")],
    ///     })
    ///     .expect("load should succeed");
    /// assert!(matches!(events[0], Event::DocumentChanged(_)));
    /// ```
    Load {
        rows: Vec<SubtitleRow>,
    },
    SetAudioDuration {
        duration_ms: f64,
    },
    SetCorrectionDictionary {
        entries: BTreeMap<String, String>,
    },
    CombineRows {
        positions: Vec<usize>,
    },
    SplitRow {
        position: usize,
        pieces: Vec<SplitPiece>,
        #[serde(default)]
        target: TextTarget,
    },
    EditText {
        position: usize,
        text: String,
        #[serde(default)]
        target: TextTarget,
    },
    AlignEndTimes,
    /// Records a corrected text for a row; the row's current text is the
    /// original.
    AddCorrection {
        position: usize,
        corrected_text: String,
    },
    ToggleCorrection {
        position: usize,
    },
    SetDisplayMode {
        mode: DisplayMode,
    },
    Undo,
    Redo,
    /// Drops the history and keeps the current document as the new baseline.
    ClearHistory,
    /// Frames a row's time span, starting a new selection gesture.
    SelectRow {
        position: usize,
    },
    SelectRange {
        start_ms: f64,
        end_ms: f64,
    },
    /// Moves one selection boundary while the other stays at `fixed_ms`.
    DragBoundary {
        new_ms: f64,
        fixed_ms: f64,
        is_start: bool,
    },
    ZoomToFit {
        start_ms: f64,
        end_ms: f64,
    },
}

/// Events emitted by the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    DocumentChanged(Snapshot),
    CorrectionsChanged(CorrectionSnapshot),
    HistoryChanged {
        can_undo: bool,
        can_redo: bool,
    },
    ViewChanged {
        selection: TimeRange,
        view: TimeRange,
        zoom_level: f64,
    },
    Error(EngineErrorEvent),
}

/// Coarse error category for user-facing reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorKind {
    RowNotFound,
    InvalidEdit,
    AudioNotLoaded,
    CorrectionNotFound,
    Other,
}

impl From<&EngineError> for EngineErrorKind {
    fn from(value: &EngineError) -> Self {
        match value {
            EngineError::RowNotFound { .. } => Self::RowNotFound,
            EngineError::CombineNeedsTwoRows { .. }
            | EngineError::NonContiguousRows { .. }
            | EngineError::InvalidSplit { .. } => Self::InvalidEdit,
            EngineError::AudioNotLoaded => Self::AudioNotLoaded,
            EngineError::CorrectionNotFound { .. } => Self::CorrectionNotFound,
            _ => Self::Other,
        }
    }
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineErrorEvent {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineErrorEvent {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            kind: EngineErrorKind::from(error),
            message: error.to_string(),
        }
    }
}

/// One editing session: the live document, its corrections, the undo
/// history and the waveform viewport.
#[derive(Debug)]
pub struct Session<K = SystemClock> {
    document: Document,
    corrections: CorrectionTable,
    dictionary: BTreeMap<String, String>,
    history: History<Snapshot, K>,
    view_config: ViewConfig,
    view: Option<ViewRangeCalculator>,
}

impl Session<SystemClock> {
    pub fn new(config: EditorConfig) -> Self {
        Self::with_clock(config, SystemClock::default())
    }
}

impl<K> Session<K>
where
    K: Clock,
{
    /// Creates an empty session whose history reads time from `clock`.
    pub fn with_clock(config: EditorConfig, clock: K) -> Self {
        Self {
            document: Document::default(),
            corrections: CorrectionTable::new(),
            dictionary: BTreeMap::new(),
            history: History::with_clock(config.history, clock),
            view_config: config.view,
            view: None,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn corrections(&self) -> &CorrectionTable {
        &self.corrections
    }

    pub fn history(&self) -> &History<Snapshot, K> {
        &self.history
    }

    /// Mutable access for callback registration and compaction passes.
    pub fn history_mut(&mut self) -> &mut History<Snapshot, K> {
        &mut self.history
    }

    pub fn view(&self) -> Option<&ViewRangeCalculator> {
        self.view.as_ref()
    }

    /// Applies one command and returns emitted events.
    pub fn handle_command(&mut self, command: Command) -> Result<Vec<Event>> {
        match command {
            Command::Load { rows } => Ok(self.load(rows)),
            Command::SetAudioDuration { duration_ms } => Ok(self.set_audio_duration(duration_ms)),
            Command::SetCorrectionDictionary { entries } => {
                debug!(entries = entries.len(), "correction dictionary replaced");
                self.dictionary = entries;
                Ok(Vec::new())
            }
            Command::CombineRows { positions } => self.combine_rows(positions),
            Command::SplitRow {
                position,
                pieces,
                target,
            } => self.split_row(position, pieces, target),
            Command::EditText {
                position,
                text,
                target,
            } => self.edit_text(position, text, target),
            Command::AlignEndTimes => self.align_end_times(),
            Command::AddCorrection {
                position,
                corrected_text,
            } => self.add_correction(position, corrected_text),
            Command::ToggleCorrection { position } => self.toggle_correction(position),
            Command::SetDisplayMode { mode } => Ok(self.set_display_mode(mode)),
            Command::Undo => Ok(self.undo()),
            Command::Redo => Ok(self.redo()),
            Command::ClearHistory => Ok(self.clear_history()),
            Command::SelectRow { position } => self.select_row(position),
            Command::SelectRange { start_ms, end_ms } => {
                self.select_range(TimeRange::new(start_ms, end_ms))
            }
            Command::DragBoundary {
                new_ms,
                fixed_ms,
                is_start,
            } => self.drag_boundary(new_ms, fixed_ms, is_start),
            Command::ZoomToFit { start_ms, end_ms } => {
                self.zoom_to_fit(TimeRange::new(start_ms, end_ms))
            }
        }
    }

    fn load(&mut self, rows: Vec<SubtitleRow>) -> Vec<Event> {
        self.document = Document::from_rows(rows, self.document.display_mode());
        self.corrections.clear();
        for position in 0..self.document.len() {
            self.check_row_correction(position);
        }
        if let Some(view) = self.view.as_mut() {
            view.reset_gesture();
        }

        self.history.clear_states();
        self.history.save_state(
            self.document.snapshot(),
            Operation::new(OperationKind::Unknown, "Load subtitles"),
            Some(self.corrections.snapshot()),
        );

        info!(
            row_count = self.document.len(),
            corrections = self.corrections.len(),
            "subtitles loaded"
        );
        self.document_events()
    }

    fn set_audio_duration(&mut self, duration_ms: f64) -> Vec<Event> {
        let calculator = ViewRangeCalculator::new(duration_ms, self.view_config);
        debug!(
            audio_duration_ms = calculator.audio_duration_ms(),
            "view calculator created"
        );
        self.view = Some(calculator);
        Vec::new()
    }

    fn combine_rows(&mut self, positions: Vec<usize>) -> Result<Vec<Event>> {
        let count = {
            let mut unique = positions.clone();
            unique.sort_unstable();
            unique.dedup();
            unique.len()
        };

        let description = format!("Combine {count} rows");
        let merged = self.apply_compound(OperationKind::CombineSentences, description, |session| {
            let merged = session.document.combine_rows(&positions)?;
            session.reindex_corrections(merged..merged + count, 1);
            session.check_row_correction(merged);
            Ok(merged)
        })?;

        info!(position = merged, count, "rows combined");
        Ok(self.document_events())
    }

    fn split_row(
        &mut self,
        position: usize,
        pieces: Vec<SplitPiece>,
        target: TextTarget,
    ) -> Result<Vec<Event>> {
        let kind = match target {
            TextTarget::Srt => OperationKind::SplitSrt,
            TextTarget::WordText => OperationKind::SplitWordText,
        };
        let description = format!(
            "Split row {} into {}",
            position.saturating_add(1),
            pieces.len()
        );

        let produced = self.apply_compound(kind, description, |session| {
            let produced = session.document.split_row(position, &pieces, target)?;
            session.reindex_corrections(position..position + 1, produced.len());
            if target == TextTarget::Srt {
                for piece in produced.clone() {
                    session.check_row_correction(piece);
                }
            }
            Ok(produced)
        })?;

        info!(position, pieces = produced.len(), ?target, "row split");
        Ok(self.document_events())
    }

    fn edit_text(&mut self, position: usize, text: String, target: TextTarget) -> Result<Vec<Event>> {
        let kind = match target {
            TextTarget::Srt => OperationKind::EditText,
            TextTarget::WordText => OperationKind::EditWordText,
        };
        let description = format!("Edit row {}", position.saturating_add(1));

        self.apply_compound(kind, description, |session| {
            session.document.edit_text(position, &text, target)?;
            if target == TextTarget::Srt {
                session.check_row_correction(position);
            }
            Ok(())
        })?;

        info!(position, ?target, "text edited");
        Ok(self.document_events())
    }

    fn align_end_times(&mut self) -> Result<Vec<Event>> {
        let changed = self.apply_compound(
            OperationKind::AlignEndTimes,
            "Align end times".to_string(),
            |session| session.document.align_end_times(),
        )?;

        info!(changed, "end times aligned");
        Ok(self.document_events())
    }

    fn add_correction(&mut self, position: usize, corrected_text: String) -> Result<Vec<Event>> {
        let row = self
            .document
            .row(position)
            .ok_or(EngineError::RowNotFound { position })?;
        let index = row.index.to_string();
        let original_text = row.text.clone();

        self.corrections.add(
            &index,
            &original_text,
            &corrected_text,
            CorrectionStatus::Correct,
        );
        self.save_correction_change(format!("Add correction to row {index}"));

        info!(position, "correction added");
        Ok(self.document_events())
    }

    fn toggle_correction(&mut self, position: usize) -> Result<Vec<Event>> {
        let row = self
            .document
            .row(position)
            .ok_or(EngineError::RowNotFound { position })?;
        let index = row.index.to_string();

        let status = self
            .corrections
            .toggle(&index)
            .ok_or_else(|| EngineError::CorrectionNotFound {
                index: index.clone(),
            })?;
        self.save_correction_change(format!("Toggle correction of row {index}"));

        info!(position, ?status, "correction toggled");
        Ok(self.document_events())
    }

    fn set_display_mode(&mut self, mode: DisplayMode) -> Vec<Event> {
        self.document.set_display_mode(mode);
        self.history.save_state(
            self.document.snapshot(),
            Operation::new(OperationKind::Unknown, "Change display mode"),
            Some(self.corrections.snapshot()),
        );
        debug!(?mode, "display mode changed");
        vec![
            Event::DocumentChanged(self.document.snapshot()),
            self.history_event(),
        ]
    }

    fn undo(&mut self) -> Vec<Event> {
        match self.history.undo() {
            Some(restored) => {
                self.document.restore(&restored.state);
                if let Some(correction) = &restored.correction {
                    self.corrections.restore(correction, None);
                }
                info!(operation = %restored.operation, "edit undone");
                self.document_events()
            }
            None => vec![self.history_event()],
        }
    }

    fn redo(&mut self) -> Vec<Event> {
        match self.history.redo() {
            Some(restored) => {
                self.document.restore(&restored.state);
                if let Some(correction) = &restored.correction {
                    self.corrections.restore(correction, None);
                }
                info!(operation = %restored.operation, "edit redone");
                self.document_events()
            }
            None => vec![self.history_event()],
        }
    }

    fn clear_history(&mut self) -> Vec<Event> {
        self.history.clear_states();
        if !self.document.is_empty() {
            self.history.save_state(
                self.document.snapshot(),
                Operation::new(OperationKind::Unknown, "History cleared"),
                Some(self.corrections.snapshot()),
            );
        }
        vec![self.history_event()]
    }

    fn select_row(&mut self, position: usize) -> Result<Vec<Event>> {
        let row = self
            .document
            .row(position)
            .ok_or(EngineError::RowNotFound { position })?;
        let selection = TimeRange::new(row.start_ms as f64, row.end_ms as f64);
        self.select_range(selection)
    }

    fn select_range(&mut self, selection: TimeRange) -> Result<Vec<Event>> {
        let view = self.view.as_mut().ok_or(EngineError::AudioNotLoaded)?;
        view.reset_gesture();
        let range = view.get_optimal_view_range(selection);
        Ok(vec![view_event(view, range)])
    }

    fn drag_boundary(&mut self, new_ms: f64, fixed_ms: f64, is_start: bool) -> Result<Vec<Event>> {
        let view = self.view.as_mut().ok_or(EngineError::AudioNotLoaded)?;
        let range = view.calculate_view_range_on_slide(new_ms, fixed_ms, is_start);
        Ok(vec![view_event(view, range)])
    }

    fn zoom_to_fit(&mut self, selection: TimeRange) -> Result<Vec<Event>> {
        let view = self.view.as_mut().ok_or(EngineError::AudioNotLoaded)?;
        let range = view.zoom_to_fit(selection);
        Ok(vec![view_event(view, range)])
    }

    /// Runs a structural edit and records it with its pre-edit state, so
    /// undo restores exactly what the user saw before.
    fn apply_compound<T>(
        &mut self,
        kind: OperationKind,
        description: String,
        edit: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let before = self.document.snapshot();
        let before_corrections = self.corrections.snapshot();

        // Document edits validate before mutating, so a failed edit leaves
        // nothing to roll back.
        let outcome = edit(self)?;

        let operation = Operation::new(kind, description)
            .with_original_state(before)
            .with_original_correction(before_corrections);
        self.history.save_state(
            self.document.snapshot(),
            operation,
            Some(self.corrections.snapshot()),
        );
        Ok(outcome)
    }

    fn save_correction_change(&mut self, description: String) {
        self.history.save_state(
            self.document.snapshot(),
            Operation::new(OperationKind::ToggleCorrection, description),
            Some(self.corrections.snapshot()),
        );
    }

    /// Drops the correction entries of rows that were at `replaced` before
    /// an edit and renumbers the keys of later rows, which now sit
    /// `inserted` rows after the start of `replaced`.
    fn reindex_corrections(&mut self, replaced: Range<usize>, inserted: usize) {
        let first_after = replaced.end + 1;
        let shift = inserted as i64 - replaced.len() as i64;

        let mut snapshot = self.corrections.snapshot();
        for position in replaced {
            snapshot.remove(&(position + 1).to_string());
        }
        let mapping: HashMap<String, String> = snapshot
            .keys()
            .filter_map(|key| {
                let index = key.parse::<i64>().ok()?;
                (index >= first_after as i64).then(|| (key.clone(), (index + shift).to_string()))
            })
            .collect();

        self.corrections.restore(&snapshot, Some(&mapping));
    }

    /// Registers a dictionary correction for the row at `position`, or
    /// removes a stale one when the row no longer needs it.
    fn check_row_correction(&mut self, position: usize) {
        let Some(row) = self.document.row(position) else {
            return;
        };
        let index = row.index.to_string();
        match check_text_for_correction(&row.text, &self.dictionary) {
            Some(check) => {
                let text = row.text.clone();
                self.corrections.add(
                    &index,
                    &text,
                    &check.corrected_text,
                    CorrectionStatus::Correct,
                );
            }
            None => {
                self.corrections.remove(&index);
            }
        }
    }

    fn history_event(&self) -> Event {
        Event::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        }
    }

    fn document_events(&self) -> Vec<Event> {
        vec![
            Event::DocumentChanged(self.document.snapshot()),
            Event::CorrectionsChanged(self.corrections.snapshot()),
            self.history_event(),
        ]
    }
}

fn view_event(view: &ViewRangeCalculator, range: TimeRange) -> Event {
    let selection = view.last_selection().unwrap_or(range);
    Event::ViewChanged {
        selection,
        view: range,
        zoom_level: view.calculate_zoom_level(selection),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::{Command, EngineErrorKind, Event, Session};
    use crate::config::EditorConfig;
    use crate::correction::CorrectionStatus;
    use crate::document::{SplitPiece, TextTarget};
    use crate::error::EngineError;
    use crate::history::{HistoryConfig, ManualClock};
    use crate::snapshot::{DisplayMode, SubtitleRow};

    fn sample_rows() -> Vec<SubtitleRow> {
        vec![
            SubtitleRow::new(1, 0, 1_000, "one"),
            SubtitleRow::new(2, 1_200, 2_000, "two"),
            SubtitleRow::new(3, 2_000, 3_000, "three"),
        ]
    }

    fn loaded_session() -> (Session<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let mut session = Session::with_clock(EditorConfig::default(), clock.clone());
        session
            .handle_command(Command::Load {
                rows: sample_rows(),
            })
            .expect("load should succeed");
        (session, clock)
    }

    fn texts(session: &Session<ManualClock>) -> Vec<String> {
        session
            .document()
            .rows()
            .iter()
            .map(|row| row.text.clone())
            .collect()
    }

    #[test]
    fn load_emits_document_corrections_and_history() {
        let clock = ManualClock::new();
        let mut session = Session::with_clock(EditorConfig::default(), clock);

        let events = session
            .handle_command(Command::Load {
                rows: sample_rows(),
            })
            .expect("load should succeed");

        assert_eq!(events.len(), 3);
        let Event::DocumentChanged(snapshot) = &events[0] else {
            panic!("first event must be DocumentChanged");
        };
        assert_eq!(snapshot.len(), 3);
        assert!(matches!(events[1], Event::CorrectionsChanged(_)));
        assert_eq!(
            events[2],
            Event::HistoryChanged {
                can_undo: false,
                can_redo: false
            }
        );
    }

    #[test]
    fn combine_then_undo_restores_original_rows() {
        let (mut session, _) = loaded_session();

        session
            .handle_command(Command::CombineRows {
                positions: vec![0, 1],
            })
            .expect("combine should succeed");
        assert_eq!(texts(&session), vec!["one two", "three"]);

        let events = session
            .handle_command(Command::Undo)
            .expect("undo should succeed");

        assert_eq!(texts(&session), vec!["one", "two", "three"]);
        assert_eq!(
            events.last(),
            Some(&Event::HistoryChanged {
                can_undo: false,
                can_redo: true
            })
        );
    }

    #[test]
    fn redo_reapplies_split() {
        let (mut session, _) = loaded_session();
        session
            .handle_command(Command::SplitRow {
                position: 2,
                pieces: vec![
                    SplitPiece {
                        text: "th".to_string(),
                        start_ms: 2_000,
                        end_ms: 2_500,
                    },
                    SplitPiece {
                        text: "ree".to_string(),
                        start_ms: 2_500,
                        end_ms: 3_000,
                    },
                ],
                target: TextTarget::Srt,
            })
            .expect("split should succeed");
        session.handle_command(Command::Undo).expect("undo should succeed");

        session.handle_command(Command::Redo).expect("redo should succeed");

        assert_eq!(texts(&session), vec!["one", "two", "th", "ree"]);
        assert_eq!(session.document().rows()[3].index, 4);
    }

    #[test]
    fn rejected_edit_leaves_history_untouched() {
        let (mut session, _) = loaded_session();

        let error = session
            .handle_command(Command::CombineRows {
                positions: vec![0, 2],
            })
            .expect_err("non-contiguous combine must fail");

        assert!(matches!(error, EngineError::NonContiguousRows { .. }));
        assert_eq!(EngineErrorKind::from(&error), EngineErrorKind::InvalidEdit);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn rapid_text_edits_undo_in_one_step() {
        let (mut session, clock) = loaded_session();
        clock.advance(Duration::from_secs(10));

        for text in ["o", "on", "onE"] {
            session
                .handle_command(Command::EditText {
                    position: 0,
                    text: text.to_string(),
                    target: TextTarget::Srt,
                })
                .expect("edit should succeed");
            clock.advance(Duration::from_millis(300));
        }
        assert_eq!(session.history().len(), 2);

        session.handle_command(Command::Undo).expect("undo should succeed");

        assert_eq!(texts(&session)[0], "one");
    }

    #[test]
    fn toggle_correction_is_undoable() {
        let (mut session, clock) = loaded_session();
        session
            .handle_command(Command::AddCorrection {
                position: 1,
                corrected_text: "too".to_string(),
            })
            .expect("add should succeed");
        clock.advance(Duration::from_secs(5));
        session
            .handle_command(Command::ToggleCorrection { position: 1 })
            .expect("toggle should succeed");
        assert_eq!(session.corrections().status("2"), CorrectionStatus::Error);

        session.handle_command(Command::Undo).expect("undo should succeed");

        assert_eq!(session.corrections().status("2"), CorrectionStatus::Correct);
        assert_eq!(session.corrections().display_text("2"), Some("too"));
    }

    #[test]
    fn toggle_without_correction_reports_missing_entry() {
        let (mut session, _) = loaded_session();
        let error = session
            .handle_command(Command::ToggleCorrection { position: 0 })
            .expect_err("toggle must fail");
        assert_eq!(
            EngineErrorKind::from(&error),
            EngineErrorKind::CorrectionNotFound
        );
    }

    #[test]
    fn dictionary_corrections_follow_rows_through_combine() {
        let clock = ManualClock::new();
        let mut session = Session::with_clock(EditorConfig::default(), clock);
        session
            .handle_command(Command::SetCorrectionDictionary {
                entries: BTreeMap::from([("teh".to_string(), "the".to_string())]),
            })
            .expect("dictionary should be accepted");
        session
            .handle_command(Command::Load {
                rows: vec![
                    SubtitleRow::new(1, 0, 1_000, "a"),
                    SubtitleRow::new(2, 1_000, 2_000, "b"),
                    SubtitleRow::new(3, 2_000, 3_000, "teh end"),
                ],
            })
            .expect("load should succeed");
        assert_eq!(session.corrections().display_text("3"), Some("the end"));

        session
            .handle_command(Command::CombineRows {
                positions: vec![0, 1],
            })
            .expect("combine should succeed");

        assert!(session.corrections().get("3").is_none());
        assert_eq!(session.corrections().display_text("2"), Some("the end"));
    }

    #[test]
    fn split_pieces_get_corrections_under_their_own_row_index() {
        let clock = ManualClock::new();
        let mut session = Session::with_clock(EditorConfig::default(), clock);
        session
            .handle_command(Command::SetCorrectionDictionary {
                entries: BTreeMap::from([("teh".to_string(), "the".to_string())]),
            })
            .expect("dictionary should be accepted");
        session
            .handle_command(Command::Load {
                rows: vec![
                    SubtitleRow::new(1, 0, 1_000, "a"),
                    SubtitleRow::new(2, 1_000, 3_000, "teh end"),
                    SubtitleRow::new(3, 3_000, 4_000, "c teh"),
                ],
            })
            .expect("load should succeed");

        session
            .handle_command(Command::SplitRow {
                position: 1,
                pieces: vec![
                    SplitPiece {
                        text: "teh".to_string(),
                        start_ms: 1_000,
                        end_ms: 2_000,
                    },
                    SplitPiece {
                        text: "end".to_string(),
                        start_ms: 2_000,
                        end_ms: 3_000,
                    },
                ],
                target: TextTarget::Srt,
            })
            .expect("split should succeed");

        let keys: Vec<String> = session.corrections().snapshot().into_keys().collect();
        assert_eq!(keys, vec!["2", "4"]);
        assert_eq!(session.corrections().display_text("2"), Some("the"));
        assert_eq!(session.corrections().display_text("4"), Some("c the"));
    }

    #[test]
    fn display_mode_change_is_undoable() {
        let clock = ManualClock::new();
        let config = EditorConfig {
            history: HistoryConfig::basic(),
            ..EditorConfig::default()
        };
        let mut session = Session::with_clock(config, clock);
        session
            .handle_command(Command::Load {
                rows: sample_rows(),
            })
            .expect("load should succeed");
        session
            .handle_command(Command::SetDisplayMode {
                mode: DisplayMode::All,
            })
            .expect("mode change should succeed");

        session.handle_command(Command::Undo).expect("undo should succeed");

        assert_eq!(session.document().display_mode(), DisplayMode::Srt);
    }

    #[test]
    fn out_of_range_position_is_rejected_as_missing_row() {
        let (mut session, _) = loaded_session();
        let commands = [
            Command::EditText {
                position: usize::MAX,
                text: "late".to_string(),
                target: TextTarget::Srt,
            },
            Command::SplitRow {
                position: usize::MAX,
                pieces: vec![SplitPiece {
                    text: "late".to_string(),
                    start_ms: 0,
                    end_ms: 500,
                }],
                target: TextTarget::WordText,
            },
        ];

        for command in commands {
            let error = session
                .handle_command(command)
                .expect_err("edit of a missing row must fail");
            assert_eq!(EngineErrorKind::from(&error), EngineErrorKind::RowNotFound);
        }
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn view_commands_require_audio_duration() {
        let (mut session, _) = loaded_session();
        let error = session
            .handle_command(Command::SelectRow { position: 0 })
            .expect_err("select must fail");
        assert!(matches!(error, EngineError::AudioNotLoaded));
    }

    #[test]
    fn select_row_frames_row_and_drag_keeps_it_visible() {
        let (mut session, _) = loaded_session();
        session
            .handle_command(Command::SetAudioDuration {
                duration_ms: 60_000.0,
            })
            .expect("audio duration should be accepted");

        let events = session
            .handle_command(Command::SelectRow { position: 1 })
            .expect("select should succeed");
        let Event::ViewChanged {
            selection, view, ..
        } = &events[0]
        else {
            panic!("select must emit ViewChanged");
        };
        assert_eq!(selection.start_ms, 1_200.0);
        assert!(view.contains(selection));

        let events = session
            .handle_command(Command::DragBoundary {
                new_ms: 5_000.0,
                fixed_ms: 1_200.0,
                is_start: false,
            })
            .expect("drag should succeed");
        let Event::ViewChanged {
            selection, view, ..
        } = &events[0]
        else {
            panic!("drag must emit ViewChanged");
        };
        assert_eq!(selection.end_ms, 5_000.0);
        assert!(view.contains(selection));
    }

    #[test]
    fn clear_history_keeps_current_document_as_baseline() {
        let (mut session, _) = loaded_session();
        session
            .handle_command(Command::AlignEndTimes)
            .expect("align should succeed");

        let events = session
            .handle_command(Command::ClearHistory)
            .expect("clear should succeed");

        assert_eq!(
            events,
            vec![Event::HistoryChanged {
                can_undo: false,
                can_redo: false
            }]
        );
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.document().rows()[0].end_ms, 1_200);
    }

    #[test]
    fn commands_deserialize_from_tagged_json() {
        let command: Command =
            serde_json::from_str(r#"{"command":"edit_text","position":2,"text":"hi"}"#)
                .expect("command should parse");
        assert_eq!(
            command,
            Command::EditText {
                position: 2,
                text: "hi".to_string(),
                target: TextTarget::Srt,
            }
        );
    }
}
