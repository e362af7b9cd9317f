use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::history::{HistoryConfig, OperationKind};
use crate::view::{ViewConfig, ViewPreset};

/// Editor settings for one session.
///
/// Each section may name a preset and override individual fields on top of
/// it:
///
/// ```toml
/// [history]
/// preset = "basic"
/// max_states = 100
///
/// [view]
/// preset = "visualization"
/// min_selection_width_ms = 80.0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "EditorConfigFile")]
pub struct EditorConfig {
    pub history: HistoryConfig,
    pub view: ViewConfig,
}

impl EditorConfig {
    /// Parses a TOML document; missing sections and fields keep defaults.
    ///
    /// # Example
    /// ```
    /// use align_engine::EditorConfig;
    ///
    /// let config = EditorConfig::from_toml_str("[view]\npreset = \"visualization\"\n")
    ///     .expect("config should parse");
    /// assert_eq!(config.view.max_view_width_ms, 10_000.0);
    /// assert_eq!(config.history.max_states, 50);
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            context: "failed to read config",
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        debug!(path = %path.display(), ?config, "editor config loaded");
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum HistoryPreset {
    Basic,
    #[default]
    Tracked,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct EditorConfigFile {
    history: HistorySection,
    view: ViewSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct HistorySection {
    preset: HistoryPreset,
    max_states: Option<usize>,
    suppress_duplicates: Option<bool>,
    compress_window_ms: Option<u64>,
    /// `false` turns compression off entirely.
    compress: Option<bool>,
    compressible: Option<Vec<OperationKind>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ViewSection {
    preset: ViewPreset,
    min_view_width_ms: Option<f64>,
    max_view_width_ms: Option<f64>,
    min_selection_width_ms: Option<f64>,
}

impl From<HistorySection> for HistoryConfig {
    fn from(section: HistorySection) -> Self {
        let mut config = match section.preset {
            HistoryPreset::Basic => HistoryConfig::basic(),
            HistoryPreset::Tracked => HistoryConfig::tracked(),
        };
        if let Some(max_states) = section.max_states {
            config.max_states = max_states;
        }
        if let Some(suppress) = section.suppress_duplicates {
            config.suppress_duplicates = suppress;
        }
        if let Some(window) = section.compress_window_ms {
            config.compress_window_ms = Some(window);
        }
        if section.compress == Some(false) {
            config.compress_window_ms = None;
        }
        if let Some(kinds) = section.compressible {
            config.compressible = kinds;
        }
        config
    }
}

impl From<ViewSection> for ViewConfig {
    fn from(section: ViewSection) -> Self {
        let base = ViewConfig::preset(section.preset);
        ViewConfig {
            min_view_width_ms: section.min_view_width_ms.unwrap_or(base.min_view_width_ms),
            max_view_width_ms: section.max_view_width_ms.unwrap_or(base.max_view_width_ms),
            min_selection_width_ms: section
                .min_selection_width_ms
                .unwrap_or(base.min_selection_width_ms),
        }
    }
}

impl From<EditorConfigFile> for EditorConfig {
    fn from(file: EditorConfigFile) -> Self {
        Self {
            history: file.history.into(),
            view: file.view.into(),
        }
    }
}
