//! Mapping from an editing selection to a waveform viewport.
//!
//! All times are milliseconds on the audio timeline. Every public entry point
//! validates its input through [`validate_range`] and every returned view
//! fully contains the validated selection.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const RECENT_VIEWS: usize = 10;
const MAX_MARGIN_MS: f64 = 500.0;
const MARGIN_RATIO: f64 = 0.1;
const DEGENERATE_DURATION_MS: f64 = 100.0;
const SLIDE_MIN_ZOOM_IN_WIDTH_MS: f64 = 1_000.0;
const SLIDE_ANCHOR_RATIO: f64 = 0.2;

/// Half-open time interval in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_ms: f64,
    pub end_ms: f64,
}

impl TimeRange {
    pub fn new(start_ms: f64, end_ms: f64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn width(&self) -> f64 {
        self.end_ms - self.start_ms
    }

    pub fn center(&self) -> f64 {
        (self.start_ms + self.end_ms) / 2.0
    }

    /// Whether `other` lies entirely inside this range.
    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start_ms <= other.start_ms && other.end_ms <= self.end_ms
    }
}

impl From<(f64, f64)> for TimeRange {
    fn from((start_ms, end_ms): (f64, f64)) -> Self {
        Self::new(start_ms, end_ms)
    }
}

/// Width envelope of the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub min_view_width_ms: f64,
    pub max_view_width_ms: f64,
    pub min_selection_width_ms: f64,
}

impl ViewConfig {
    /// Wide envelope used by the alignment table's range manager.
    pub fn range_manager() -> Self {
        Self {
            min_view_width_ms: 500.0,
            max_view_width_ms: 30_000.0,
            min_selection_width_ms: 50.0,
        }
    }

    /// Tighter envelope used by the inline waveform visualisation.
    pub fn visualization() -> Self {
        Self {
            min_view_width_ms: 500.0,
            max_view_width_ms: 10_000.0,
            min_selection_width_ms: 100.0,
        }
    }

    pub fn preset(preset: ViewPreset) -> Self {
        match preset {
            ViewPreset::RangeManager => Self::range_manager(),
            ViewPreset::Visualization => Self::visualization(),
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self::range_manager()
    }
}

/// Named [`ViewConfig`] presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewPreset {
    #[default]
    RangeManager,
    Visualization,
}

/// One remembered `(selection, view)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewSample {
    pub selection: TimeRange,
    pub view: TimeRange,
}

/// Normalises `range` into `[0, max_duration]` with a width of at least
/// `min_range`.
///
/// Reversed ranges are swapped. A short range is widened by moving its end,
/// else its start; if neither fits, `(0, min(min_range, max_duration))` is
/// returned. Non-finite input yields the same fallback.
///
/// # Example
/// ```
/// use align_engine::view::{validate_range, TimeRange};
///
/// let range = validate_range(TimeRange::new(0.0, 5_000.0), 4_000.0, 100.0);
/// assert_eq!(range, TimeRange::new(0.0, 4_000.0));
/// ```
pub fn validate_range(range: TimeRange, max_duration: f64, min_range: f64) -> TimeRange {
    let max_duration = if max_duration.is_finite() {
        max_duration.max(0.0)
    } else {
        0.0
    };
    let min_range = if min_range.is_finite() {
        min_range.max(0.0)
    } else {
        0.0
    };
    let fallback = TimeRange::new(0.0, min_range.min(max_duration));

    if !range.start_ms.is_finite() || !range.end_ms.is_finite() {
        warn!(
            start_ms = range.start_ms,
            end_ms = range.end_ms,
            "non-finite time range replaced"
        );
        return fallback;
    }

    let (mut start, mut end) = (range.start_ms, range.end_ms);
    if start > end {
        warn!(start_ms = start, end_ms = end, "reversed time range swapped");
        std::mem::swap(&mut start, &mut end);
    }

    start = start.clamp(0.0, max_duration);
    end = end.min(max_duration).max(start);

    if end - start < min_range {
        if start + min_range <= max_duration {
            end = start + min_range;
        } else if end - min_range >= 0.0 {
            start = end - min_range;
        } else {
            return fallback;
        }
    }

    TimeRange::new(start, end)
}

/// Computes viewports for selections on one audio timeline.
///
/// The calculator remembers the last `(selection, view)` pair so that
/// successive drags of one gesture adjust the viewport incrementally. Call
/// [`ViewRangeCalculator::reset_gesture`] when an unrelated selection starts.
///
/// # Example
/// ```
/// use align_engine::view::{TimeRange, ViewConfig, ViewRangeCalculator};
///
/// let mut calculator = ViewRangeCalculator::new(60_000.0, ViewConfig::default());
/// let selection = TimeRange::new(10_000.0, 10_100.0);
/// let view = calculator.get_optimal_view_range(selection);
/// assert!(view.contains(&selection));
/// ```
#[derive(Debug, Clone)]
pub struct ViewRangeCalculator {
    audio_duration_ms: f64,
    config: ViewConfig,
    last: Option<ViewSample>,
    recent: VecDeque<ViewSample>,
}

impl ViewRangeCalculator {
    /// Creates a calculator for a timeline of `audio_duration_ms`, clamped to
    /// at least 1 ms.
    pub fn new(audio_duration_ms: f64, config: ViewConfig) -> Self {
        let audio_duration_ms = if audio_duration_ms.is_finite() {
            audio_duration_ms.max(1.0)
        } else {
            1.0
        };
        Self {
            audio_duration_ms,
            config,
            last: None,
            recent: VecDeque::with_capacity(RECENT_VIEWS),
        }
    }

    pub fn audio_duration_ms(&self) -> f64 {
        self.audio_duration_ms
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn last_selection(&self) -> Option<TimeRange> {
        self.last.map(|sample| sample.selection)
    }

    pub fn last_view(&self) -> Option<TimeRange> {
        self.last.map(|sample| sample.view)
    }

    /// Up to the ten most recent computations, oldest first.
    pub fn recent_views(&self) -> impl Iterator<Item = &ViewSample> {
        self.recent.iter()
    }

    /// Forgets drag continuity so the next slide is framed from scratch.
    pub fn reset_gesture(&mut self) {
        self.last = None;
    }

    pub fn validate_selection(&self, selection: TimeRange) -> TimeRange {
        validate_range(
            selection,
            self.audio_duration_ms,
            self.config
                .min_selection_width_ms
                .min(self.audio_duration_ms),
        )
    }

    /// Step function from selection duration to view width; shorter
    /// selections get proportionally more context.
    pub fn calculate_view_width(&self, duration_ms: f64) -> f64 {
        let duration = if duration_ms > 0.0 {
            duration_ms
        } else {
            DEGENERATE_DURATION_MS
        };
        let multiplier = match duration {
            d if d < 100.0 => 20.0,
            d if d < 500.0 => 12.0,
            d if d < 1_000.0 => 8.0,
            d if d < 3_000.0 => 5.0,
            d if d < 10_000.0 => 3.0,
            _ => 2.0,
        };
        (duration * multiplier).max(self.config.min_view_width_ms)
    }

    /// Frames `selection` from scratch: centred, width from
    /// [`Self::calculate_view_width`], expanded to contain the selection and
    /// padded with a margin.
    pub fn get_optimal_view_range(&mut self, selection: TimeRange) -> TimeRange {
        let selection = self.validate_selection(selection);
        let width = self
            .calculate_view_width(selection.width())
            .min(self.config.max_view_width_ms)
            .min(self.audio_duration_ms);

        let framed = self.contain(selection, self.centered(selection, width));
        let view = self.with_margin(selection, framed);

        debug!(
            sel_start = selection.start_ms,
            sel_end = selection.end_ms,
            view_start = view.start_ms,
            view_end = view.end_ms,
            "optimal view computed"
        );
        self.remember(selection, view);
        view
    }

    /// Recomputes the view while one selection boundary is dragged and the
    /// other stays at `fixed_ms`.
    ///
    /// Within a gesture the previous view width is nudged: shrinking the
    /// selection below 80% of its previous duration zooms in by 20%, growing
    /// it past 150% zooms out by 20%. The pinned boundary is kept 20% in from
    /// its edge of the viewport.
    pub fn calculate_view_range_on_slide(
        &mut self,
        new_ms: f64,
        fixed_ms: f64,
        is_start_adjustment: bool,
    ) -> TimeRange {
        let audio = self.audio_duration_ms;
        let min_selection = self.config.min_selection_width_ms;
        let new_ms = clamp_time(new_ms, audio);
        let fixed_ms = clamp_time(fixed_ms, audio);

        let raw = if is_start_adjustment {
            TimeRange::new(new_ms.min(fixed_ms - min_selection), fixed_ms)
        } else {
            TimeRange::new(fixed_ms, new_ms.max(fixed_ms + min_selection))
        };
        let selection = self.validate_selection(raw);

        let Some(previous) = self.last else {
            return self.get_optimal_view_range(selection);
        };

        let ratio = selection.width() / previous.selection.width().max(1.0);
        let previous_width = previous.view.width();
        let zoomed = if ratio < 0.8 {
            (previous_width * 0.8).max(SLIDE_MIN_ZOOM_IN_WIDTH_MS.min(audio))
        } else if ratio > 1.5 {
            previous_width * 1.2
        } else {
            previous_width
        };
        let width = zoomed.min(audio);

        let anchored = if is_start_adjustment {
            let end = (selection.end_ms + width * SLIDE_ANCHOR_RATIO).min(audio);
            TimeRange::new((end - width).max(0.0), end)
        } else {
            let start = (selection.start_ms - width * SLIDE_ANCHOR_RATIO).max(0.0);
            TimeRange::new(start, (start + width).min(audio))
        };
        let view = self.contain(selection, anchored);

        debug!(
            ratio,
            width,
            is_start_adjustment,
            view_start = view.start_ms,
            view_end = view.end_ms,
            "slide view computed"
        );
        self.remember(selection, view);
        view
    }

    /// Display zoom hint, strictly decreasing in selection duration.
    pub fn calculate_zoom_level(&self, selection: TimeRange) -> f64 {
        match self.validate_selection(selection).width() {
            d if d < 50.0 => 5.0,
            d if d < 100.0 => 4.0,
            d if d < 250.0 => 3.0,
            d if d < 500.0 => 2.5,
            d if d < 1_000.0 => 2.0,
            d if d < 2_000.0 => 1.5,
            _ => 1.0,
        }
    }

    /// Centres a view of a few selection widths on `selection`.
    pub fn zoom_to_fit(&mut self, selection: TimeRange) -> TimeRange {
        let selection = self.validate_selection(selection);
        let duration = selection.width();
        let multiplier = match duration {
            d if d < 200.0 => 5.0,
            d if d < 1_000.0 => 4.0,
            d if d < 5_000.0 => 3.0,
            _ => 2.0,
        };
        let width = (duration * multiplier)
            .max(self.config.min_view_width_ms)
            .min(self.config.max_view_width_ms)
            .min(self.audio_duration_ms);

        let view = self.contain(selection, self.centered(selection, width));

        debug!(
            multiplier,
            view_start = view.start_ms,
            view_end = view.end_ms,
            "zoom to fit computed"
        );
        self.remember(selection, view);
        view
    }

    fn centered(&self, selection: TimeRange, width: f64) -> TimeRange {
        let start = (selection.center() - width / 2.0).max(0.0);
        let end = (start + width).min(self.audio_duration_ms);
        if end - start < width {
            TimeRange::new((end - width).max(0.0), end)
        } else {
            TimeRange::new(start, end)
        }
    }

    /// Grows `view` on the side the selection sticks out of, and by the same
    /// amount on the other side where the timeline allows.
    fn contain(&self, selection: TimeRange, view: TimeRange) -> TimeRange {
        let TimeRange {
            mut start_ms,
            mut end_ms,
        } = view;

        if selection.start_ms < start_ms {
            let deficit = start_ms - selection.start_ms;
            start_ms = selection.start_ms;
            end_ms = (end_ms + deficit).min(self.audio_duration_ms);
        }
        if selection.end_ms > end_ms {
            let deficit = selection.end_ms - end_ms;
            end_ms = selection.end_ms;
            start_ms = (start_ms - deficit).max(0.0);
        }

        TimeRange::new(start_ms, end_ms)
    }

    fn with_margin(&self, selection: TimeRange, view: TimeRange) -> TimeRange {
        let mut margin = (view.width() * MARGIN_RATIO).min(MAX_MARGIN_MS);
        if selection.width() <= self.config.max_view_width_ms {
            let room = (self.config.max_view_width_ms - view.width()).max(0.0);
            margin = margin.min(room / 2.0);
        }

        TimeRange::new(
            (view.start_ms - margin).max(0.0),
            (view.end_ms + margin).min(self.audio_duration_ms),
        )
    }

    fn remember(&mut self, selection: TimeRange, view: TimeRange) {
        let sample = ViewSample { selection, view };
        self.last = Some(sample);
        if self.recent.len() == RECENT_VIEWS {
            self.recent.pop_front();
        }
        self.recent.push_back(sample);
    }
}

fn clamp_time(value: f64, audio_duration_ms: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, audio_duration_ms)
    } else {
        0.0
    }
}
