//! Bounded undo/redo history of editing snapshots.
//!
//! [`History`] keeps an indexed list of [`StateRecord`]s and a cursor
//! pointing at the record that reflects the live state. Saving while the
//! cursor is not at the tail discards the redo branch. Compound operations
//! (combine, split, end-time alignment, text edit) may carry their own
//! pre-operation snapshot, which undo prefers over the positional previous
//! record.

use std::collections::VecDeque;
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

use crate::correction::CorrectionSnapshot;

pub const DEFAULT_MAX_STATES: usize = 50;
const DEFAULT_COMPRESS_WINDOW_MS: u64 = 2_000;
const COMPRESSED_SUFFIX: &str = " (multiple)";

/// Source of monotonic timestamps for history records.
pub trait Clock {
    /// Time elapsed since an arbitrary, fixed origin.
    fn now(&self) -> Duration;
}

/// Wall-clock backed [`Clock`] measuring from its creation.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven [`Clock`] for deterministic hosts and tests.
///
/// Clones share the same time source.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }

    pub fn set(&self, at: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Kind of editing operation that produced a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CombineSentences,
    SplitSrt,
    SplitWordText,
    AlignEndTimes,
    EditText,
    EditWordText,
    ToggleCorrection,
    #[default]
    Unknown,
}

impl OperationKind {
    /// Whether undo should restore the operation's own pre-operation
    /// snapshot when the record carries one.
    pub fn restores_original(self) -> bool {
        matches!(
            self,
            Self::CombineSentences
                | Self::SplitSrt
                | Self::SplitWordText
                | Self::AlignEndTimes
                | Self::EditText
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CombineSentences => "combine_sentences",
            Self::SplitSrt => "split_srt",
            Self::SplitWordText => "split_word_text",
            Self::AlignEndTimes => "align_end_times",
            Self::EditText => "edit_text",
            Self::EditWordText => "edit_word_text",
            Self::ToggleCorrection => "toggle_correction",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata describing how a record was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation<S> {
    pub kind: OperationKind,
    pub description: String,
    /// Authoritative state before a compound operation ran.
    pub original_state: Option<S>,
    pub original_correction: Option<CorrectionSnapshot>,
}

impl<S> Operation<S> {
    pub fn new(kind: OperationKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            original_state: None,
            original_correction: None,
        }
    }

    pub fn unknown() -> Self {
        Self::new(OperationKind::Unknown, "Unknown operation")
    }

    pub fn with_original_state(mut self, state: S) -> Self {
        self.original_state = Some(state);
        self
    }

    pub fn with_original_correction(mut self, correction: CorrectionSnapshot) -> Self {
        self.original_correction = Some(correction);
        self
    }
}

impl<S> Default for Operation<S> {
    fn default() -> Self {
        Self::unknown()
    }
}

/// One saved point of the editing timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct StateRecord<S> {
    pub state: S,
    pub operation: Operation<S>,
    pub timestamp: Duration,
    pub correction: Option<CorrectionSnapshot>,
}

/// State handed back by [`History::undo`] and [`History::redo`].
#[derive(Debug, Clone, PartialEq)]
pub struct Restored<S> {
    pub state: S,
    pub correction: Option<CorrectionSnapshot>,
    /// The operation that was undone or redone.
    pub operation: OperationKind,
}

/// Read-only summary of one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub index: usize,
    #[serde(serialize_with = "serialize_secs")]
    pub timestamp: Duration,
    pub operation_type: OperationKind,
    pub description: String,
    pub is_current: bool,
    pub has_correction: bool,
}

fn serialize_secs<Z: Serializer>(value: &Duration, serializer: Z) -> Result<Z::Ok, Z::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

/// What [`History::save_state`] did with a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new record was appended.
    Recorded,
    /// The current record absorbed the snapshot.
    Compressed,
    /// The snapshot equals the current record and was dropped.
    Suppressed,
}

/// Retention and deduplication policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_states: usize,
    /// Drop saves whose snapshot equals the current record.
    pub suppress_duplicates: bool,
    /// Same-kind saves closer than this to the current record replace it.
    pub compress_window_ms: Option<u64>,
    pub compressible: Vec<OperationKind>,
}

impl HistoryConfig {
    /// Row snapshots only: identical saves are dropped, nothing is compressed.
    pub fn basic() -> Self {
        Self {
            max_states: DEFAULT_MAX_STATES,
            suppress_duplicates: true,
            compress_window_ms: None,
            compressible: Vec::new(),
        }
    }

    /// Row snapshots plus correction state. Equal rows may still differ in
    /// correction state, so nothing is dropped, but rapid text edits and
    /// toggles collapse into one step.
    ///
    /// With compression on, N saves do not always yield N records; use
    /// [`HistoryConfig::basic`] when every save must stay a separate step.
    pub fn tracked() -> Self {
        Self {
            max_states: DEFAULT_MAX_STATES,
            suppress_duplicates: false,
            compress_window_ms: Some(DEFAULT_COMPRESS_WINDOW_MS),
            compressible: vec![
                OperationKind::EditText,
                OperationKind::EditWordText,
                OperationKind::ToggleCorrection,
            ],
        }
    }

    fn compress_window(&self) -> Option<Duration> {
        self.compress_window_ms.map(Duration::from_millis)
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self::tracked()
    }
}

type StateChangeCallback = Box<dyn FnMut() + Send>;
type RestoreCallback<S> = Box<dyn FnMut(&Restored<S>) + Send>;

/// Synchronous observers notified by [`History`].
///
/// Callbacks run before the triggering method returns and must not call
/// back into the history.
pub struct HistoryCallbacks<S> {
    on_state_change: Option<StateChangeCallback>,
    on_undo: Option<RestoreCallback<S>>,
    on_redo: Option<RestoreCallback<S>>,
}

impl<S> HistoryCallbacks<S> {
    fn state_changed(&mut self) {
        if let Some(callback) = self.on_state_change.as_mut() {
            callback();
        }
    }

    fn undone(&mut self, restored: &Restored<S>) {
        if let Some(callback) = self.on_undo.as_mut() {
            callback(restored);
        }
    }

    fn redone(&mut self, restored: &Restored<S>) {
        if let Some(callback) = self.on_redo.as_mut() {
            callback(restored);
        }
    }
}

impl<S> Default for HistoryCallbacks<S> {
    fn default() -> Self {
        Self {
            on_state_change: None,
            on_undo: None,
            on_redo: None,
        }
    }
}

impl<S> Debug for HistoryCallbacks<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryCallbacks")
            .field("on_state_change", &self.on_state_change.is_some())
            .field("on_undo", &self.on_undo.is_some())
            .field("on_redo", &self.on_redo.is_some())
            .finish()
    }
}

/// Undo/redo history over snapshots of type `S`.
///
/// # Example
/// ```
/// use align_engine::history::{History, HistoryConfig, Operation, OperationKind};
///
/// let mut history = History::new(HistoryConfig::basic());
/// history.save_state(vec![1, 2, 3], Operation::unknown(), None);
/// history.save_state(
///     vec![1, 2, 3, 4],
///     Operation::new(OperationKind::EditText, "edit").with_original_state(vec![1, 2, 3]),
///     None,
/// );
///
/// let restored = history.undo().expect("undo");
/// assert_eq!(restored.state, vec![1, 2, 3]);
/// assert!(history.can_redo());
/// ```
#[derive(Debug)]
pub struct History<S, K = SystemClock> {
    records: VecDeque<StateRecord<S>>,
    current: Option<usize>,
    config: HistoryConfig,
    callbacks: HistoryCallbacks<S>,
    undo_count: u64,
    clock: K,
}

impl<S> History<S, SystemClock>
where
    S: Clone + PartialEq,
{
    pub fn new(config: HistoryConfig) -> Self {
        Self::with_clock(config, SystemClock::default())
    }
}

impl<S, K> History<S, K>
where
    S: Clone + PartialEq,
    K: Clock,
{
    /// Creates an empty history reading timestamps from `clock`.
    ///
    /// A `max_states` of zero is treated as one.
    pub fn with_clock(mut config: HistoryConfig, clock: K) -> Self {
        config.max_states = config.max_states.max(1);
        Self {
            records: VecDeque::new(),
            current: None,
            config,
            callbacks: HistoryCallbacks::default(),
            undo_count: 0,
            clock,
        }
    }

    pub fn set_on_state_change(&mut self, callback: impl FnMut() + Send + 'static) {
        self.callbacks.on_state_change = Some(Box::new(callback));
    }

    pub fn set_on_undo(&mut self, callback: impl FnMut(&Restored<S>) + Send + 'static) {
        self.callbacks.on_undo = Some(Box::new(callback));
    }

    pub fn set_on_redo(&mut self, callback: impl FnMut(&Restored<S>) + Send + 'static) {
        self.callbacks.on_redo = Some(Box::new(callback));
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position of the record reflecting the live state, `None` when empty.
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn records(&self) -> impl Iterator<Item = &StateRecord<S>> {
        self.records.iter()
    }

    /// Records `state` as the newest point of the timeline.
    ///
    /// Any redo branch is discarded first. When the list outgrows
    /// `max_states` the oldest record is evicted.
    pub fn save_state(
        &mut self,
        state: S,
        operation: Operation<S>,
        correction: Option<CorrectionSnapshot>,
    ) -> SaveOutcome {
        if self.config.suppress_duplicates && self.current_state() == Some(&state) {
            debug!(kind = %operation.kind, "save suppressed: state unchanged");
            return SaveOutcome::Suppressed;
        }

        let keep = self.current.map_or(0, |current| current + 1);
        if keep < self.records.len() {
            debug!(
                discarded = self.records.len() - keep,
                "redo branch discarded"
            );
            self.records.truncate(keep);
        }

        let now = self.clock.now();
        if self.should_compress(&operation, now) {
            let tail = &mut self.records[keep - 1];
            tail.state = state;
            tail.correction = correction;
            tail.timestamp = now;
            if !tail.operation.description.ends_with(COMPRESSED_SUFFIX) {
                tail.operation.description.push_str(COMPRESSED_SUFFIX);
            }
            debug!(index = keep - 1, kind = %operation.kind, "save compressed into current record");
            self.callbacks.state_changed();
            return SaveOutcome::Compressed;
        }

        let kind = operation.kind;
        let has_correction = correction.is_some();
        self.records.push_back(StateRecord {
            state,
            operation,
            timestamp: now,
            correction,
        });
        if self.records.len() > self.config.max_states {
            self.records.pop_front();
            debug!(max_states = self.config.max_states, "oldest record evicted");
        }
        self.current = Some(self.records.len() - 1);

        debug!(
            index = self.records.len() - 1,
            kind = %kind,
            has_correction,
            "state saved"
        );
        self.callbacks.state_changed();
        SaveOutcome::Recorded
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.current, Some(current) if current > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.current, Some(current) if current + 1 < self.records.len())
    }

    /// Steps back one record.
    ///
    /// If the active record is a compound operation carrying its own
    /// pre-operation state, that state is returned regardless of position;
    /// otherwise the previous record's state is.
    pub fn undo(&mut self) -> Option<Restored<S>> {
        let Some(current) = self.current.filter(|&current| current > 0) else {
            debug!("undo ignored: nothing to undo");
            return None;
        };

        let active = &self.records[current];
        let previous = &self.records[current - 1];
        let kind = active.operation.kind;
        let original = active
            .operation
            .original_state
            .as_ref()
            .filter(|_| kind.restores_original());

        let restored = match original {
            Some(original_state) => Restored {
                state: original_state.clone(),
                correction: active
                    .operation
                    .original_correction
                    .clone()
                    .or_else(|| previous.correction.clone()),
                operation: kind,
            },
            None => Restored {
                state: previous.state.clone(),
                correction: previous.correction.clone(),
                operation: kind,
            },
        };

        debug!(
            from = current,
            to = current - 1,
            kind = %kind,
            used_original = original.is_some(),
            "undo applied"
        );

        self.current = Some(current - 1);
        self.undo_count += 1;
        self.callbacks.undone(&restored);
        self.callbacks.state_changed();
        Some(restored)
    }

    /// Steps forward one record.
    pub fn redo(&mut self) -> Option<Restored<S>> {
        if !self.can_redo() {
            debug!("redo ignored: nothing to redo");
            return None;
        }

        let next = self.current.map_or(0, |current| current + 1);
        let record = &self.records[next];
        let restored = Restored {
            state: record.state.clone(),
            correction: record.correction.clone(),
            operation: record.operation.kind,
        };

        debug!(to = next, kind = %restored.operation, "redo applied");

        self.current = Some(next);
        self.callbacks.redone(&restored);
        self.callbacks.state_changed();
        Some(restored)
    }

    /// Drops every record and resets the undo counter.
    pub fn clear_states(&mut self) {
        self.records.clear();
        self.current = None;
        self.undo_count = 0;
        debug!("history cleared");
        self.callbacks.state_changed();
    }

    pub fn current_state(&self) -> Option<&S> {
        self.current_record().map(|record| &record.state)
    }

    pub fn current_correction(&self) -> Option<&CorrectionSnapshot> {
        self.current_record()
            .and_then(|record| record.correction.as_ref())
    }

    pub fn current_operation(&self) -> Option<&Operation<S>> {
        self.current_record().map(|record| &record.operation)
    }

    /// Operation of the record just before the current one.
    pub fn previous_operation(&self) -> Option<&Operation<S>> {
        let previous = self.current?.checked_sub(1)?;
        self.records.get(previous).map(|record| &record.operation)
    }

    pub fn state_history(&self) -> Vec<HistoryEntry> {
        self.records
            .iter()
            .enumerate()
            .map(|(index, record)| HistoryEntry {
                index,
                timestamp: record.timestamp,
                operation_type: record.operation.kind,
                description: record.operation.description.clone(),
                is_current: self.current == Some(index),
                has_correction: record.correction.is_some(),
            })
            .collect()
    }

    pub fn operation_history(&self) -> Vec<OperationKind> {
        self.records
            .iter()
            .map(|record| record.operation.kind)
            .collect()
    }

    /// Collapses adjacent same-kind records closer than `threshold`,
    /// keeping the later one. Returns how many records were removed.
    pub fn merge_consecutive_states(&mut self, threshold: Duration) -> usize {
        let mut removed = 0;
        let mut later = self.records.len().saturating_sub(1);
        while later > 0 {
            let earlier = later - 1;
            let gap = self.records[later]
                .timestamp
                .saturating_sub(self.records[earlier].timestamp);
            let same_kind =
                self.records[later].operation.kind == self.records[earlier].operation.kind;

            if same_kind && gap < threshold {
                self.records.remove(earlier);
                if let Some(current) = self.current.filter(|&current| current >= earlier) {
                    self.current = Some(current.saturating_sub(1));
                }
                removed += 1;
            }
            later -= 1;
        }

        if removed > 0 {
            debug!(removed, remaining = self.records.len(), "consecutive records merged");
            self.callbacks.state_changed();
        }
        removed
    }

    /// Evicts records older than `max_age` from the head. Returns how many
    /// records were removed.
    pub fn trim_old_states(&mut self, max_age: Duration) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        while let Some(oldest) = self.records.front() {
            if now.saturating_sub(oldest.timestamp) <= max_age {
                break;
            }
            self.records.pop_front();
            self.current = self.current.map(|current| current.saturating_sub(1));
            removed += 1;
        }
        if self.records.is_empty() {
            self.current = None;
        }

        if removed > 0 {
            debug!(removed, remaining = self.records.len(), "aged records trimmed");
            self.callbacks.state_changed();
        }
        removed
    }

    /// Successful undos since creation, the last clear or the last reset.
    pub fn undo_count(&self) -> u64 {
        self.undo_count
    }

    pub fn reset_undo_count(&mut self) {
        self.undo_count = 0;
    }

    fn current_record(&self) -> Option<&StateRecord<S>> {
        self.current.and_then(|current| self.records.get(current))
    }

    fn should_compress(&self, operation: &Operation<S>, now: Duration) -> bool {
        let Some(window) = self.config.compress_window() else {
            return false;
        };
        let Some(tail) = self.current_record() else {
            return false;
        };

        tail.operation.kind == operation.kind
            && self.config.compressible.contains(&operation.kind)
            && now.saturating_sub(tail.timestamp) < window
    }
}
