use align_engine::{TimeRange, ViewConfig, ViewRangeCalculator, validate_range};
use proptest::prelude::*;

const EPSILON: f64 = 1e-6;

fn assert_contains(view: TimeRange, selection: TimeRange, audio_ms: f64) {
    assert!(
        view.start_ms <= selection.start_ms + EPSILON && view.end_ms + EPSILON >= selection.end_ms,
        "view ({}, {}) must contain selection ({}, {})",
        view.start_ms,
        view.end_ms,
        selection.start_ms,
        selection.end_ms
    );
    assert!(view.start_ms >= -EPSILON && view.end_ms <= audio_ms + EPSILON);
}

#[test]
fn short_selection_gets_bounded_context() {
    let mut calculator = ViewRangeCalculator::new(60_000.0, ViewConfig::default());
    let selection = TimeRange::new(10_000.0, 10_100.0);

    let view = calculator.get_optimal_view_range(selection);

    assert_contains(view, selection, 60_000.0);
    assert!(view.width() >= 500.0 - EPSILON);
    assert!(view.width() <= 30_000.0 + EPSILON);
    assert!(view.width() > selection.width());
}

#[test]
fn selection_past_audio_end_is_clamped() {
    let range = validate_range(TimeRange::new(0.0, 5_000.0), 4_000.0, 100.0);
    assert_eq!(range, TimeRange::new(0.0, 4_000.0));

    let calculator = ViewRangeCalculator::new(4_000.0, ViewConfig::default());
    let selection = calculator.validate_selection(TimeRange::new(0.0, 5_000.0));
    assert_eq!(selection, TimeRange::new(0.0, 4_000.0));
}

#[test]
fn dragging_start_keeps_pinned_end_exact() {
    let mut calculator = ViewRangeCalculator::new(60_000.0, ViewConfig::visualization());
    calculator.get_optimal_view_range(TimeRange::new(2_000.0, 3_000.0));

    let view = calculator.calculate_view_range_on_slide(500.0, 3_000.0, true);

    let selection = calculator
        .last_selection()
        .expect("slide should remember its selection");
    assert_eq!(selection, TimeRange::new(500.0, 3_000.0));
    assert_contains(view, selection, 60_000.0);
}

#[test]
fn dragging_start_past_pinned_end_keeps_minimum_width() {
    let mut calculator = ViewRangeCalculator::new(60_000.0, ViewConfig::visualization());
    calculator.get_optimal_view_range(TimeRange::new(2_000.0, 3_000.0));

    calculator.calculate_view_range_on_slide(3_500.0, 3_000.0, true);

    let selection = calculator
        .last_selection()
        .expect("slide should remember its selection");
    assert_eq!(selection, TimeRange::new(2_900.0, 3_000.0));
}

#[test]
fn audio_shorter_than_minimum_view_is_shown_whole() {
    let mut calculator = ViewRangeCalculator::new(300.0, ViewConfig::default());
    let selection = TimeRange::new(100.0, 200.0);

    let view = calculator.get_optimal_view_range(selection);

    assert_contains(view, selection, 300.0);
    assert!((view.width() - 300.0).abs() < EPSILON);
}

#[test]
fn recent_views_keep_the_last_ten() {
    let mut calculator = ViewRangeCalculator::new(60_000.0, ViewConfig::visualization());
    for i in 0..12u32 {
        let start = f64::from(i) * 1_000.0;
        calculator.zoom_to_fit(TimeRange::new(start, start + 500.0));
    }

    let recent: Vec<_> = calculator.recent_views().collect();
    assert_eq!(recent.len(), 10);
    assert_eq!(recent[0].selection.start_ms, 2_000.0);
}

fn config() -> impl Strategy<Value = ViewConfig> {
    prop_oneof![
        Just(ViewConfig::range_manager()),
        Just(ViewConfig::visualization()),
    ]
}

/// Audio duration and a selection inside it at least 100 ms wide.
fn timeline() -> impl Strategy<Value = (f64, TimeRange)> {
    (200.0f64..600_000.0)
        .prop_flat_map(|audio| (Just(audio), 0.0..audio - 100.0))
        .prop_flat_map(|(audio, start)| (Just(audio), Just(start), start + 100.0..=audio))
        .prop_map(|(audio, start, end)| (audio, TimeRange::new(start, end)))
}

fn assert_width_envelope(
    view: TimeRange,
    selection: TimeRange,
    audio_ms: f64,
    config: &ViewConfig,
) -> Result<(), TestCaseError> {
    let width = view.width();
    if selection.width() <= config.max_view_width_ms {
        prop_assert!(width >= config.min_view_width_ms.min(audio_ms) - EPSILON);
        prop_assert!(width <= config.max_view_width_ms + EPSILON);
    } else {
        prop_assert!(width >= selection.width() - EPSILON);
    }
    Ok(())
}

proptest! {
    #[test]
    fn optimal_view_contains_selection_within_width_envelope(
        (audio_ms, selection) in timeline(),
        config in config(),
    ) {
        let mut calculator = ViewRangeCalculator::new(audio_ms, config);

        let view = calculator.get_optimal_view_range(selection);

        prop_assert!(view.start_ms <= selection.start_ms + EPSILON);
        prop_assert!(view.end_ms + EPSILON >= selection.end_ms);
        prop_assert!(view.start_ms >= -EPSILON);
        prop_assert!(view.end_ms <= audio_ms + EPSILON);
        assert_width_envelope(view, selection, audio_ms, &config)?;
    }

    #[test]
    fn zoom_to_fit_contains_selection_within_width_envelope(
        (audio_ms, selection) in timeline(),
        config in config(),
    ) {
        let mut calculator = ViewRangeCalculator::new(audio_ms, config);

        let view = calculator.zoom_to_fit(selection);

        prop_assert!(view.start_ms <= selection.start_ms + EPSILON);
        prop_assert!(view.end_ms + EPSILON >= selection.end_ms);
        prop_assert!(view.start_ms >= -EPSILON);
        prop_assert!(view.end_ms <= audio_ms + EPSILON);
        assert_width_envelope(view, selection, audio_ms, &config)?;
    }

    #[test]
    fn slide_keeps_selection_visible(
        audio_ms in 2_000.0f64..600_000.0,
        drags in prop::collection::vec((0.0f64..1.0, any::<bool>()), 1..10),
    ) {
        let mut calculator = ViewRangeCalculator::new(audio_ms, ViewConfig::default());
        let mut selection = TimeRange::new(audio_ms * 0.4, audio_ms * 0.5);
        calculator.get_optimal_view_range(selection);

        for (fraction, is_start) in drags {
            let new_ms = fraction * audio_ms;
            let view = if is_start {
                calculator.calculate_view_range_on_slide(new_ms, selection.end_ms, true)
            } else {
                calculator.calculate_view_range_on_slide(new_ms, selection.start_ms, false)
            };
            selection = calculator
                .last_selection()
                .expect("slide should remember its selection");

            prop_assert!(selection.width() >= 50.0 - EPSILON);
            prop_assert!(view.start_ms <= selection.start_ms + EPSILON);
            prop_assert!(view.end_ms + EPSILON >= selection.end_ms);
            prop_assert!(view.start_ms >= -EPSILON);
            prop_assert!(view.end_ms <= audio_ms + EPSILON);
        }
    }
}
