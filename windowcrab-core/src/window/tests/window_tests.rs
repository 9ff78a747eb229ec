use super::*;
use proptest::prelude::*;

type Closed = Arc<Mutex<Vec<(WindowKey, Vec<u32>)>>>;

fn recording_table(size: Duration, lateness: Duration) -> (TumblingWindowTable<u32>, Closed) {
    let closed: Closed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&closed);
    let table = TumblingWindowTable::new(
        "test",
        WindowConfig::new(size, lateness),
        move |key: &WindowKey, records: &[u32]| -> anyhow::Result<()> {
            sink.lock().push((key.clone(), records.to_vec()));
            Ok(())
        },
    )
    .unwrap();
    (table, closed)
}

// ── TimeWindow ────────────────────────────────────────────────────────────

#[test]
fn test_time_window_contains() {
    let w = TimeWindow::new(0, 10_000);
    assert!(w.contains(0));
    assert!(w.contains(5_000));
    assert!(!w.contains(10_000)); // end is exclusive
}

#[test]
fn test_time_window_display() {
    let w = TimeWindow::new(0, 10_000);
    assert_eq!(w.to_string(), "TimeWindow([0, 10000))");
}

// ── Tumbling ──────────────────────────────────────────────────────────────

#[test]
fn test_tumbling_assigns_correct_window() {
    let assigner = TumblingEventTimeWindows::of(Duration::from_secs(10));
    // timestamp 3s falls in [0, 10s)
    assert_eq!(assigner.assign_window(3_000), Some(TimeWindow::new(0, 10_000)));
    // timestamp 10s falls in [10s, 20s)
    assert_eq!(
        assigner.assign_window(10_000),
        Some(TimeWindow::new(10_000, 20_000))
    );
    assert_eq!(assigner.window_start(19_999), Some(10_000));
}

#[test]
fn test_tumbling_negative_timestamps_round_down() {
    let assigner = TumblingEventTimeWindows::of(Duration::from_secs(10));
    assert_eq!(assigner.window_start(-1), Some(-10_000));
    assert_eq!(assigner.window_start(-10_000), Some(-10_000));
    assert_eq!(assigner.window_start(-10_001), Some(-20_000));
}

#[test]
fn test_tumbling_extreme_timestamps_have_no_window() {
    let assigner = TumblingEventTimeWindows::of(Duration::from_secs(10));
    // floor(MIN / 10s) * 10s is below i64::MIN.
    assert_eq!(assigner.window_start(i64::MIN), None);
    assert_eq!(assigner.assign_window(i64::MIN), None);
    // The window around MAX starts fine but its end overflows.
    assert!(assigner.window_start(i64::MAX).is_some());
    assert_eq!(assigner.assign_window(i64::MAX), None);
    // A size dividing into MIN exactly still works.
    let unit = TumblingEventTimeWindows::of(Duration::from_millis(1));
    assert_eq!(unit.window_start(i64::MIN), Some(i64::MIN));
}

proptest! {
    #[test]
    fn prop_window_start_contains_timestamp(
        ts in -1_000_000_000_000i64..1_000_000_000_000,
        size_ms in 1u64..10_000_000,
    ) {
        let assigner = TumblingEventTimeWindows::of(Duration::from_millis(size_ms));
        let start = assigner.window_start(ts).unwrap();
        prop_assert!(start <= ts);
        prop_assert!(ts < start + size_ms as i64);
        prop_assert_eq!(start.rem_euclid(size_ms as i64), 0);
        // Same timestamp, same window, regardless of what came before.
        prop_assert_eq!(assigner.window_start(ts), Some(start));
        prop_assert_eq!(assigner.assign_window(ts).map(|w| w.contains(ts)), Some(true));
    }
}

// ── TumblingWindowTable ───────────────────────────────────────────────────

#[test]
fn test_table_rejects_invalid_config() {
    let result = TumblingWindowTable::<u32>::new(
        "bad",
        WindowConfig::new(Duration::ZERO, Duration::ZERO),
        |_: &WindowKey, _: &[u32]| -> anyhow::Result<()> { Ok(()) },
    );
    assert!(matches!(result, Err(WindowError::InvalidConfig(_))));
}

#[test]
fn test_table_expires_at() {
    let (table, _) = recording_table(Duration::from_secs(10), Duration::from_secs(1));
    assert_eq!(table.expires_at(0), 11_000);
    assert_eq!(table.expires_at(10_000), 21_000);
    assert_eq!(
        table.window_for(12_345),
        Some(TimeWindow::new(10_000, 20_000))
    );
}

#[test]
fn test_table_record_buckets_by_key_and_window() {
    let (table, _) = recording_table(Duration::from_secs(10), Duration::from_secs(1));

    assert_eq!(table.record("k1", 2_000, 1).unwrap(), WindowKey::new("k1", 0));
    assert_eq!(table.record("k1", 5_000, 2).unwrap(), WindowKey::new("k1", 0));
    assert_eq!(table.record("k2", 5_000, 3).unwrap(), WindowKey::new("k2", 0));
    assert_eq!(
        table.record("k1", 12_000, 4).unwrap(),
        WindowKey::new("k1", 10_000)
    );

    let w = table.index().get(&WindowKey::new("k1", 0)).unwrap();
    assert_eq!(w.records, vec![1, 2]);
    assert_eq!(w.expires_at, 11_000);
    assert_eq!(table.index().len(), 3);
    assert_eq!(table.watermark(), 11_000);
}

#[test]
fn test_table_rejects_event_time_without_window() {
    let (table, _) = recording_table(Duration::from_secs(10), Duration::from_secs(1));

    let err = table.record("k1", i64::MIN, 1).unwrap_err();
    assert_eq!(
        err,
        WindowError::EventTimeOutOfRange {
            partition_key: "k1".into(),
            event_time: i64::MIN,
        }
    );
    assert!(!err.is_late());

    // Rejected before the watermark moves, so MAX cannot expire everything.
    assert!(matches!(
        table.record("k1", i64::MAX, 2),
        Err(WindowError::EventTimeOutOfRange { .. })
    ));
    assert_eq!(table.watermark(), EVENT_TIME_MIN);
    assert!(table.index().is_empty());

    table.record("k1", 2_000, 3).unwrap();
    assert_eq!(table.watermark(), 1_000);
}

#[test]
fn test_table_huge_lateness_never_runs_watermark_ahead() {
    let config = WindowConfig::new(Duration::from_secs(10), Duration::from_secs(u64::MAX / 2));
    assert!(config.validate().is_err());

    let tracker = WatermarkTracker::new(config.lateness);
    tracker.advance(2_000);
    assert!(tracker.current() <= 2_000);
}

#[test]
fn test_table_out_of_order_within_lateness_is_accepted() {
    let (table, _) = recording_table(Duration::from_secs(10), Duration::from_secs(1));
    table.record("k1", 11_500, 1).unwrap(); // watermark 10_500
    // Window [0, 10s) expires at 11s, still ahead of the watermark.
    assert!(table.record("k1", 9_000, 2).is_ok());
}

#[test]
fn test_table_late_record_is_rejected_without_mutation() {
    let (table, _) = recording_table(Duration::from_secs(10), Duration::from_secs(1));
    table.record("k1", 2_000, 1).unwrap();
    table.record("k2", 13_000, 2).unwrap(); // watermark 12_000 > 11_000

    let before = table.index().get(&WindowKey::new("k1", 0)).unwrap();
    let err = table.record("k1", 3_000, 3).unwrap_err();
    assert_eq!(
        err,
        WindowError::LateRecord {
            partition_key: "k1".into(),
            window_start: 0,
            expires_at: 11_000,
            watermark: 12_000,
        }
    );
    assert!(err.is_late());
    assert_eq!(table.index().get(&WindowKey::new("k1", 0)).unwrap(), before);

    // A late record for a window that never existed creates nothing.
    assert!(table.record("k3", 1_000, 4).is_err());
    assert!(table.index().get(&WindowKey::new("k3", 0)).is_none());
    // And the watermark did not move.
    assert_eq!(table.watermark(), 12_000);
}

#[test]
fn test_table_record_after_sweep_at_exact_expiry_is_unknown_window() {
    let (table, closed) = recording_table(Duration::from_secs(10), Duration::from_secs(1));
    let table = Arc::new(table);
    let driver = ExpirationDriver::new(Arc::clone(&table));

    table.record("k1", 2_000, 1).unwrap();
    table.record("k2", 12_000, 2).unwrap(); // watermark 11_000 == expiry of [0, 10s)
    assert_eq!(driver.sweep().closed, 1);
    assert_eq!(closed.lock().len(), 1);

    // expires_at (11_000) is not < watermark, but the window is already gone.
    let err = table.record("k1", 4_000, 3).unwrap_err();
    assert!(matches!(err, WindowError::UnknownWindow { .. }));
    assert!(!table.index().contains(&WindowKey::new("k1", 0)));
}

#[test]
fn test_table_with_default_factory() {
    let (table, closed) = recording_table(Duration::from_secs(10), Duration::ZERO);
    let table = Arc::new(table.with_default(|| vec![0]));
    table.record("k1", 1_000, 7).unwrap();
    assert_eq!(
        table.index().get(&WindowKey::new("k1", 0)).unwrap().records,
        vec![0, 7]
    );

    table.record("k1", 10_000, 8).unwrap();
    ExpirationDriver::new(Arc::clone(&table)).sweep();
    assert_eq!(closed.lock()[0].1, vec![0, 7]);
}

#[test]
fn test_table_record_keyed() {
    let (table, _) = recording_table(Duration::from_secs(10), Duration::ZERO);
    let key = table
        .record_keyed(KeyedRecord::new("k9", 25_000, 5))
        .unwrap();
    assert_eq!(key, WindowKey::new("k9", 20_000));
}

#[test]
fn test_table_snapshot_and_restore() {
    let (table, _) = recording_table(Duration::from_secs(10), Duration::from_secs(1));
    table.record("k1", 2_000, 1).unwrap();
    table.record("k1", 3_000, 2).unwrap();
    table.record("k2", 15_000, 3).unwrap();
    let bytes = table.snapshot_state().unwrap();

    let (restored, closed) = recording_table(Duration::from_secs(10), Duration::from_secs(1));
    let restored = Arc::new(restored);
    restored.restore_state(&bytes).unwrap();

    assert_eq!(restored.watermark(), 14_000);
    assert_eq!(restored.index().len(), 2);
    assert_eq!(
        restored.index().get(&WindowKey::new("k1", 0)).unwrap().records,
        vec![1, 2]
    );

    // The restored window closes like any other.
    let report = ExpirationDriver::new(Arc::clone(&restored)).sweep();
    assert_eq!(report.closed, 1);
    assert_eq!(closed.lock()[0], (WindowKey::new("k1", 0), vec![1, 2]));
}

#[test]
fn test_table_restore_rejects_different_window_size() {
    let (table, _) = recording_table(Duration::from_secs(10), Duration::from_secs(1));
    table.record("k1", 2_000, 1).unwrap();
    let bytes = table.snapshot_state().unwrap();

    let (other, _) = recording_table(Duration::from_secs(5), Duration::from_secs(1));
    assert!(matches!(
        other.restore_state(&bytes),
        Err(WindowError::State(_))
    ));
}

#[test]
fn test_table_restore_rejects_garbage() {
    let (table, _) = recording_table(Duration::from_secs(10), Duration::from_secs(1));
    assert!(matches!(
        table.restore_state(&[1, 2, 3]),
        Err(WindowError::State(_))
    ));
}
