use ironpane::*;

fn el(value: u64, ts: i64) -> StreamItem<u64> {
    StreamItem::Element(Element::new(value, ts))
}

#[test]
fn each_tick_emits_element_then_watermark() {
    let mut source = SequenceSource::new(SourceConfig::default());

    for seq in 0..3u64 {
        let ts = i64::try_from(seq).unwrap() * 1_000;
        assert_eq!(
            source.next_tick(),
            Some(vec![el(seq, ts), StreamItem::Watermark(ts)])
        );
    }
    assert_eq!(source.produced(), 3);
    assert!(!source.is_finished());
}

#[test]
fn limit_ends_with_end_of_time() {
    let mut source = SequenceSource::new(SourceConfig {
        limit: Some(2),
        ..SourceConfig::default()
    });

    source.next_tick();
    source.next_tick();
    assert_eq!(source.next_tick(), Some(vec![StreamItem::Watermark(END_OF_TIME)]));
    assert!(source.is_finished());
    assert_eq!(source.next_tick(), None);
}

#[test]
fn stragglers_are_released_behind_the_watermark() {
    let mut source = SequenceSource::new(SourceConfig {
        straggler: Some(Straggler {
            every: 3,
            delay_ticks: 2,
        }),
        ..SourceConfig::default()
    });

    let ticks: Vec<_> = source.by_ref().take(5).collect();
    // Element 2 is held back...
    assert_eq!(ticks[2], vec![StreamItem::Watermark(2_000)]);
    // ...and released two ticks later with its original timestamp.
    assert_eq!(
        ticks[4],
        vec![el(2, 2_000), el(4, 4_000), StreamItem::Watermark(4_000)]
    );
}

#[test]
fn stop_flushes_held_elements() {
    let mut source = SequenceSource::new(SourceConfig {
        straggler: Some(Straggler {
            every: 2,
            delay_ticks: 10,
        }),
        ..SourceConfig::default()
    });
    source.next_tick();
    source.next_tick();

    assert_eq!(
        source.stop(),
        vec![el(1, 1_000), StreamItem::Watermark(END_OF_TIME)]
    );
    assert!(source.stop().is_empty());
    assert_eq!(source.next_tick(), None);
}

#[test]
fn iterator_yields_every_tick_plus_the_final_flush() {
    let source = SequenceSource::new(SourceConfig {
        start_ms: 60_000,
        interval_ms: 500,
        limit: Some(5),
        straggler: None,
    });
    let ticks: Vec<_> = source.collect();

    assert_eq!(ticks.len(), 6);
    assert_eq!(ticks[4][0], el(4, 62_000));
}
