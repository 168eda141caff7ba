use anyhow::Result;
use ironpane::testing::*;
use ironpane::*;

const SIZE: i64 = 5_000;

fn engine(allowed_lateness_ms: i64) -> Result<TriggerEngine<u64>> {
    Ok(TriggerEngine::new(
        WindowingStrategy::fixed(SIZE).with_allowed_lateness(allowed_lateness_ms),
    )?)
}

fn w(start: i64) -> Window {
    Window::new(start, start + SIZE)
}

#[test]
fn zero_lateness_fires_one_on_time_pane() -> Result<()> {
    let mut e = engine(0)?;
    let panes = TimelineBuilder::new()
        .elements([(0, 0), (1, 1_000), (2, 2_000)])
        .watermark(5_000)
        .replay(&mut e);

    assert_eq!(panes.len(), 1);
    assert_pane(&panes[0], w(0), PaneTiming::OnTime, 0);
    assert_payload_unordered(&panes[0], &[0, 1, 2]);
    assert!(panes[0].info.is_first);
    // Closed in the same advance that fired it.
    assert!(panes[0].info.is_last);
    assert_eq!(e.open_windows(), 0);

    // Any later element for the window is behind the watermark.
    let outcome = e.process_element(Element::new(3, 3_000))?;
    assert_eq!(
        outcome,
        ElementOutcome::Dropped {
            window: w(0),
            watermark: 5_000
        }
    );
    assert_eq!(e.stats().late_elements_dropped, 1);
    assert_eq!(e.stats().panes_late, 0);
    Ok(())
}

#[test]
fn late_element_within_lateness_fires_late_pane() -> Result<()> {
    let mut e = engine(60_000)?;
    let on_time = TimelineBuilder::new()
        .elements([(0, 0), (1, 1_000)])
        .watermark(5_000)
        .replay(&mut e);
    assert_eq!(on_time.len(), 1);
    assert_pane(&on_time[0], w(0), PaneTiming::OnTime, 0);
    assert_payload_unordered(&on_time[0], &[0, 1]);
    assert!(!on_time[0].info.is_last);

    assert!(e.advance_watermark(50_000)?.is_empty());

    let ElementOutcome::FiredLate(late) = e.process_element(Element::new(2, 2_000))? else {
        panic!("expected a late pane");
    };
    assert_pane(&late, w(0), PaneTiming::Late, 1);
    assert_eq!(late.payload, vec![2]);
    assert!(!late.info.is_first);
    assert!(!late.info.is_last);
    assert_eq!(
        e.window_state(&w(0)).map(WindowState::status),
        Some(FiringStatus::FiredLate(1))
    );

    // Watermark reaches end + lateness: window closes, nothing fires.
    assert!(e.advance_watermark(65_000)?.is_empty());
    assert_eq!(e.open_windows(), 0);
    assert_eq!(e.stats().windows_closed, 1);
    Ok(())
}

#[test]
fn each_late_arrival_fires_its_own_pane() -> Result<()> {
    let mut e = engine(60_000)?;
    let panes = TimelineBuilder::new()
        .element(0, 0)
        .watermark(5_000)
        .element(1, 1_000)
        .watermark(20_000)
        .element(2, 2_000)
        .element(3, 3_000)
        .replay(&mut e);

    assert_eq!(panes.len(), 4);
    assert_pane_indices_increasing(&panes);
    assert_single_on_time(&panes);
    assert_eq!(all_values(&panes), vec![0, 1, 2, 3]);
    assert!(panes[1..].iter().all(|p| p.timing() == PaneTiming::Late));
    Ok(())
}

#[test]
fn duplicate_in_window_appears_once() -> Result<()> {
    let mut e = engine(0)?;
    e.process_element(Element::new(7, 1_000))?;
    let outcome = e.process_element(Element::new(7, 2_000))?;
    assert_eq!(outcome, ElementOutcome::Duplicate { window: w(0) });

    let panes = e.advance_watermark(5_000)?;
    assert_eq!(panes.len(), 1);
    assert_eq!(panes[0].payload, vec![7]);
    assert_eq!(e.stats().duplicates_dropped, 1);
    Ok(())
}

#[test]
fn element_behind_lateness_bound_creates_no_state() -> Result<()> {
    let mut e = engine(10_000)?;
    e.advance_watermark(30_000)?;

    let outcome = e.process_element(Element::new(1, 1_000))?;
    assert!(matches!(outcome, ElementOutcome::Dropped { watermark: 30_000, .. }));
    assert_eq!(e.open_windows(), 0);

    // Exactly at the bound is still admitted.
    let outcome = e.process_element(Element::new(2, 20_000))?;
    assert!(matches!(outcome, ElementOutcome::FiredLate(_)));
    Ok(())
}

#[test]
fn dropped_elements_never_reach_a_pane() -> Result<()> {
    let mut e = engine(2_000)?;
    let mut dropped = Vec::new();
    let mut panes = Vec::new();

    // Elements trail the watermark by a growing gap, so some fall behind the bound.
    for tick in 0..40_i64 {
        let watermark = tick * 1_000;
        panes.extend(e.advance_watermark(watermark)?);
        let ts = (watermark - (tick % 5) * 1_000).max(0);
        let value = u64::try_from(tick)?;
        match e.process_element(Element::new(value, ts))? {
            ElementOutcome::Dropped { .. } => dropped.push(value),
            ElementOutcome::FiredLate(p) => panes.push(p),
            _ => {}
        }
    }
    panes.extend(e.finish());

    assert!(!dropped.is_empty());
    let emitted = all_values(&panes);
    assert!(dropped.iter().all(|v| !emitted.contains(v)));
    assert_eq!(emitted.len() + dropped.len(), 40);
    assert_pane_indices_increasing(&panes);
    assert_single_on_time(&panes);
    assert_last_pane_is_final(&panes);
    Ok(())
}

#[test]
fn resubmitting_admitted_values_changes_nothing() -> Result<()> {
    let timeline = |repeat: usize| {
        let mut b = TimelineBuilder::new();
        for (value, ts) in [(1, 500), (2, 4_000), (3, 6_000)] {
            for _ in 0..repeat {
                b = b.element(value, ts);
            }
        }
        b.watermark(10_000)
            .element(4, 1_000)
            .element(4, 1_000)
            .watermark(40_000)
    };

    let once = timeline(1).replay(&mut engine(30_000)?);
    let thrice = timeline(3).replay(&mut engine(30_000)?);
    assert_eq!(once, thrice);
    Ok(())
}

#[test]
fn late_pane_without_on_time_pane_starts_at_index_zero() -> Result<()> {
    let mut e = engine(60_000)?;
    e.advance_watermark(10_000)?;

    let ElementOutcome::FiredLate(pane) = e.process_element(Element::new(1, 1_000))? else {
        panic!("expected a late pane");
    };
    assert_pane(&pane, w(0), PaneTiming::Late, 0);
    assert!(pane.info.is_first);
    Ok(())
}

#[test]
fn empty_windows_never_fire() -> Result<()> {
    let mut e = engine(0)?;
    let panes = TimelineBuilder::new()
        .elements([(1, 0), (2, 12_000)])
        .watermark(20_000)
        .replay(&mut e);

    let windows: Vec<Window> = panes.iter().map(|p| p.window).collect();
    assert_eq!(windows, vec![w(0), w(10_000)]);
    Ok(())
}

#[test]
fn panes_fire_in_window_order() -> Result<()> {
    let mut e = engine(0)?;
    for (value, ts) in [(3, 14_000), (1, 1_000), (2, 7_000)] {
        e.process_element(Element::new(value, ts))?;
    }
    let panes = e.advance_watermark(15_000)?;
    let starts: Vec<i64> = panes.iter().map(|p| p.window.start).collect();
    assert_eq!(starts, vec![0, 5_000, 10_000]);
    Ok(())
}

#[test]
fn watermark_regression_is_rejected() -> Result<()> {
    let mut e = engine(0)?;
    e.process_element(Element::new(1, 1_000))?;
    e.advance_watermark(4_000)?;

    let err = e.advance_watermark(2_000).unwrap_err();
    assert!(matches!(
        err,
        StreamError::WatermarkRegression {
            current: 4_000,
            attempted: 2_000
        }
    ));
    assert_eq!(e.watermark(), 4_000);
    // Re-asserting the current watermark is fine.
    assert!(e.advance_watermark(4_000)?.is_empty());
    Ok(())
}

#[test]
fn invalid_timestamp_is_rejected_and_counted() -> Result<()> {
    let mut e = engine(0)?;
    let err = e.process_element(Element::new(1, -5)).unwrap_err();
    assert!(matches!(err, StreamError::InvalidTimestamp { ts: -5, .. }));
    assert_eq!(e.stats().invalid_timestamps, 1);
    assert_eq!(e.open_windows(), 0);
    Ok(())
}

#[test]
fn finish_fires_and_closes_everything() -> Result<()> {
    let mut e = engine(60_000)?;
    e.process_element(Element::new(1, 0))?;
    e.process_element(Element::new(2, 7_000))?;

    let panes = e.finish();
    assert_eq!(panes.len(), 2);
    assert!(panes.iter().all(|p| p.timing() == PaneTiming::OnTime && p.info.is_last));
    assert_eq!(e.open_windows(), 0);
    assert_eq!(e.watermark(), END_OF_TIME);
    assert!(e.finish().is_empty());
    Ok(())
}

#[test]
fn accumulating_panes_repeat_earlier_values() -> Result<()> {
    let mut e = TriggerEngine::new(
        WindowingStrategy::fixed(SIZE)
            .with_allowed_lateness(60_000)
            .with_accumulation(AccumulationMode::Accumulating),
    )?;
    let panes = TimelineBuilder::new()
        .elements([("a", 0), ("b", 1_000)])
        .watermark(5_000)
        .element("c", 2_000)
        .replay(&mut e);

    assert_eq!(panes.len(), 2);
    assert_eq!(panes[0].payload, vec!["a", "b"]);
    assert_eq!(panes[1].payload, vec!["a", "b", "c"]);
    Ok(())
}

#[test]
fn pane_scope_forgets_values_after_each_firing() -> Result<()> {
    let timeline = || {
        TimelineBuilder::new()
            .element("x", 0)
            .watermark(5_000)
            .element("x", 1_000)
    };
    let strategy = WindowingStrategy::fixed(SIZE).with_allowed_lateness(60_000);

    let mut pane_scoped = TriggerEngine::new(strategy.with_dedup_scope(DedupScope::Pane))?;
    assert_eq!(timeline().replay(&mut pane_scoped).len(), 2);

    let mut window_scoped = TriggerEngine::new(strategy.with_dedup_scope(DedupScope::Window))?;
    assert_eq!(timeline().replay(&mut window_scoped).len(), 1);
    Ok(())
}

#[test]
fn global_scope_spans_windows() -> Result<()> {
    let strategy = WindowingStrategy::fixed(SIZE).with_dedup_scope(DedupScope::Global);
    let mut e = TriggerEngine::new(strategy)?;
    e.process_element(Element::new("x", 0))?;
    let outcome = e.process_element(Element::new("x", 6_000))?;
    assert_eq!(outcome, ElementOutcome::Duplicate { window: w(5_000) });
    assert_eq!(e.global_dedup_keys(), 1);

    // Global keys outlive the window.
    e.finish();
    assert_eq!(e.global_dedup_keys(), 1);
    Ok(())
}

#[test]
fn invalid_strategies_are_rejected() {
    assert!(TriggerEngine::<u64>::new(WindowingStrategy::fixed(0)).is_err());
    assert!(TriggerEngine::<u64>::new(WindowingStrategy::fixed(SIZE).with_offset(SIZE)).is_err());
    assert!(
        TriggerEngine::<u64>::new(WindowingStrategy::fixed(SIZE).with_allowed_lateness(-1)).is_err()
    );
}
