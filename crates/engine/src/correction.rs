use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Whether the corrected or the original text is in effect for a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionStatus {
    #[default]
    Correct,
    Error,
}

impl CorrectionStatus {
    pub fn toggled(self) -> Self {
        match self {
            Self::Correct => Self::Error,
            Self::Error => Self::Correct,
        }
    }
}

/// Correction record for one row. `original_text` never equals
/// `corrected_text` for a stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionEntry {
    pub status: CorrectionStatus,
    pub original_text: String,
    pub corrected_text: String,
}

impl CorrectionEntry {
    fn is_valid(&self) -> bool {
        !self.original_text.is_empty()
            && !self.corrected_text.is_empty()
            && self.original_text != self.corrected_text
    }
}

/// Frozen copy of a [`CorrectionTable`], keyed by row index string.
pub type CorrectionSnapshot = BTreeMap<String, CorrectionEntry>;

/// Result of running a correction dictionary over a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionCheck {
    pub corrected_text: String,
    /// `(error, correction)` pairs that actually matched.
    pub applied: Vec<(String, String)>,
}

/// Applies every `error -> correction` pair whose error occurs in `text`.
///
/// Returns `None` when no pair matched or the substitutions cancel out.
///
/// # Example
/// ```
/// use std::collections::BTreeMap;
///
/// use align_engine::correction::check_text_for_correction;
///
/// let dictionary = BTreeMap::from([("teh".to_string(), "the".to_string())]);
/// let check = check_text_for_correction("teh cat", &dictionary).expect("needs correction");
/// assert_eq!(check.corrected_text, "the cat");
/// ```
pub fn check_text_for_correction(
    text: &str,
    dictionary: &BTreeMap<String, String>,
) -> Option<CorrectionCheck> {
    let mut corrected_text = text.to_string();
    let mut applied = Vec::new();

    for (error, correction) in dictionary {
        if error.is_empty() || !text.contains(error.as_str()) {
            continue;
        }
        corrected_text = corrected_text.replace(error.as_str(), correction);
        applied.push((error.clone(), correction.clone()));
    }

    if applied.is_empty() || corrected_text == text {
        return None;
    }
    Some(CorrectionCheck {
        corrected_text,
        applied,
    })
}

/// Per-row correction state of the editing session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectionTable {
    entries: BTreeMap<String, CorrectionEntry>,
}

impl CorrectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: &str) -> Option<&CorrectionEntry> {
        self.entries.get(index)
    }

    /// Adds or replaces the entry for `index`.
    ///
    /// Identical texts mean there is nothing to correct, so any existing
    /// entry is removed instead. Returns whether an entry is now stored.
    pub fn add(
        &mut self,
        index: &str,
        original_text: &str,
        corrected_text: &str,
        status: CorrectionStatus,
    ) -> bool {
        if original_text == corrected_text {
            self.remove(index);
            return false;
        }

        self.entries.insert(
            index.to_string(),
            CorrectionEntry {
                status,
                original_text: original_text.to_string(),
                corrected_text: corrected_text.to_string(),
            },
        );
        true
    }

    pub fn remove(&mut self, index: &str) -> Option<CorrectionEntry> {
        self.entries.remove(index)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Flips the status of `index`. Returns `None` when no entry exists.
    pub fn toggle(&mut self, index: &str) -> Option<CorrectionStatus> {
        let entry = self.entries.get_mut(index)?;
        entry.status = entry.status.toggled();
        debug!(index, status = ?entry.status, "correction toggled");
        Some(entry.status)
    }

    /// Current status of `index`; rows without an entry count as correct.
    pub fn status(&self, index: &str) -> CorrectionStatus {
        self.entries
            .get(index)
            .map(|entry| entry.status)
            .unwrap_or_default()
    }

    /// Text to show for `index`, or `None` when the row has no entry.
    pub fn display_text(&self, index: &str) -> Option<&str> {
        self.entries.get(index).map(|entry| match entry.status {
            CorrectionStatus::Correct => entry.corrected_text.as_str(),
            CorrectionStatus::Error => entry.original_text.as_str(),
        })
    }

    pub fn snapshot(&self) -> CorrectionSnapshot {
        self.entries.clone()
    }

    /// Replaces all entries with those in `snapshot`.
    ///
    /// Invalid entries are dropped. Keys found in `id_mapping` are renamed.
    pub fn restore(
        &mut self,
        snapshot: &CorrectionSnapshot,
        id_mapping: Option<&HashMap<String, String>>,
    ) {
        self.entries = snapshot
            .iter()
            .filter(|(_, entry)| entry.is_valid())
            .map(|(index, entry)| {
                let index = id_mapping
                    .and_then(|mapping| mapping.get(index))
                    .unwrap_or(index);
                (index.clone(), entry.clone())
            })
            .collect();

        info!(
            restored = self.entries.len(),
            offered = snapshot.len(),
            "correction state restored"
        );
    }
}
