use std::sync::Arc;
use std::time::{Duration, Instant};

use windowcrab_api::{AggOrder, AppConfig, LateDataPolicy, Order, WindowedApp};
use windowcrab_core::bus::{topic, CollectingSink};
use windowcrab_core::config::WindowConfig;
use windowcrab_core::state::{InMemoryTableStateStore, TableStateStore};

fn test_config() -> AppConfig {
    AppConfig::default().with_window(
        WindowConfig::new(Duration::from_secs(10), Duration::from_secs(1))
            .with_cleanup_interval(Duration::from_millis(10)),
    )
}

fn agg(kitchen: &str, date: i64, count: u64) -> AggOrder {
    AggOrder {
        date,
        kitchen: kitchen.to_string(),
        count,
    }
}

fn wait_for(sink: &CollectingSink<AggOrder>, n: usize) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if sink.len() >= n {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn test_first_window_closes_once_watermark_passes_expiry() {
    let results = CollectingSink::new();
    let app = WindowedApp::new(test_config(), results.clone())
        .unwrap()
        .start()
        .unwrap();
    let source = app.source();

    for date in [2_000, 5_000, 9_000] {
        source.send(Order::new("k1", date, 1)).unwrap();
    }
    source.send(Order::new("k2", 11_000, 2)).unwrap();
    // Watermark 11_500 passes k1@0's expiry (11_000) but not k2@10_000's (21_000).
    source.send(Order::new("k2", 12_500, 3)).unwrap();

    assert!(wait_for(&results, 1), "k1@0 never closed");

    let report = app.shutdown().unwrap();
    assert_eq!(results.items(), vec![agg("k1", 0, 3)]);
    assert_eq!(report.consumed, 5);
    assert_eq!(report.agent.accepted, 5);
    assert_eq!(report.agent.emitted, 1);
    assert_eq!(report.driver.closed, 1);
    assert_eq!(report.open_windows, 1);
}

#[test]
fn test_counts_per_kitchen_and_window() {
    let results = CollectingSink::new();
    let app = WindowedApp::new(test_config(), results.clone())
        .unwrap()
        .start()
        .unwrap();
    let source = app.source();

    for date in [1_000, 3_000, 8_000, 10_500, 19_000] {
        source.send(Order::new("k1", date, 1)).unwrap();
    }
    source.send(Order::new("k2", 12_000, 1)).unwrap();
    // Pushes the watermark past every window above.
    source.send(Order::new("k3", 40_000, 1)).unwrap();

    assert!(wait_for(&results, 3));
    app.shutdown().unwrap();

    let mut items = results.items();
    items.sort_by(|a, b| (a.date, &a.kitchen).cmp(&(b.date, &b.kitchen)));
    assert_eq!(
        items,
        vec![agg("k1", 0, 3), agg("k1", 10_000, 2), agg("k2", 10_000, 1)]
    );
}

#[test]
fn test_results_published_on_sink_topic() {
    let config = test_config();
    let (results_tx, results_rx) = topic::<AggOrder>(&config.sink_topic, 16);
    let app = WindowedApp::new(config, results_tx).unwrap().start().unwrap();
    let source = app.source();

    source.send(Order::new("k1", 4_000, 1)).unwrap();
    source.send(Order::new("k1", 25_000, 1)).unwrap();

    let first = results_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(first, Some(agg("k1", 0, 1)));
    app.shutdown().unwrap();
    assert_eq!(results_rx.topic(), "event-orders-agg");
}

#[test]
fn test_late_orders_are_dead_lettered() {
    let results = CollectingSink::new();
    let dead_letters = CollectingSink::new();
    let config = test_config().with_late_data_policy(LateDataPolicy::DeadLetter);
    let app = WindowedApp::new(config, results.clone())
        .unwrap()
        .with_dead_letter(dead_letters.clone())
        .start()
        .unwrap();
    let source = app.source();

    source.send(Order::new("k1", 25_000, 1)).unwrap();
    source.send(Order::new("k1", 2_000, 4)).unwrap();

    let report = app.shutdown().unwrap();
    assert_eq!(dead_letters.items(), vec![Order::new("k1", 2_000, 4)]);
    assert_eq!(report.agent.late, 1);
    assert_eq!(report.agent.dead_lettered, 1);
    assert!(results.is_empty());
}

#[test]
fn test_dead_letter_policy_requires_sink() {
    let config = test_config().with_late_data_policy(LateDataPolicy::DeadLetter);
    let app = WindowedApp::new(config, CollectingSink::new()).unwrap();
    assert!(app.start().is_err());
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = AppConfig {
        channel_capacity: 0,
        ..test_config()
    };
    assert!(WindowedApp::new(config, CollectingSink::new()).is_err());
}

#[test]
fn test_open_windows_survive_restart() {
    let store: Arc<dyn TableStateStore> = Arc::new(InMemoryTableStateStore::new());
    let results = CollectingSink::new();

    let app = WindowedApp::new(test_config(), results.clone())
        .unwrap()
        .with_state_store(Arc::clone(&store))
        .start()
        .unwrap();
    let source = app.source();
    source.send(Order::new("k2", 11_000, 1)).unwrap();
    source.send(Order::new("k2", 12_500, 1)).unwrap();
    let report = app.shutdown().unwrap();
    assert_eq!(report.open_windows, 1);
    assert!(results.is_empty());
    assert!(store.load("tumbling_table").unwrap().is_some());

    let app = WindowedApp::new(test_config(), results.clone())
        .unwrap()
        .with_state_store(Arc::clone(&store))
        .start()
        .unwrap();
    assert_eq!(app.table().watermark(), 11_500);
    let source = app.source();
    // Orders for windows closed before the restart are still late.
    source.send(Order::new("k2", 500, 1)).unwrap();
    source.send(Order::new("k2", 22_500, 1)).unwrap();

    assert!(wait_for(&results, 1));
    let report = app.shutdown().unwrap();
    assert_eq!(results.items(), vec![agg("k2", 10_000, 2)]);
    assert_eq!(report.agent.late, 1);
}

#[test]
fn test_fs_state_path_round_trip() {
    let dir = std::env::temp_dir().join(format!(
        "windowcrab-app-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    let config = test_config().with_state_path(&dir);

    let app = WindowedApp::new(config.clone(), CollectingSink::new())
        .unwrap()
        .start()
        .unwrap();
    app.source().send(Order::new("k1", 3_000, 1)).unwrap();
    app.shutdown().unwrap();
    assert!(dir.join("tumbling_table.state").is_file());

    let results = CollectingSink::new();
    let app = WindowedApp::new(config, results.clone())
        .unwrap()
        .start()
        .unwrap();
    app.source().send(Order::new("k1", 30_000, 1)).unwrap();
    assert!(wait_for(&results, 1));
    app.shutdown().unwrap();
    assert_eq!(results.items()[0], agg("k1", 0, 1));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_orders_decode_from_json_lines() {
    let order: Order = serde_json::from_str(r#"{"date":2000,"kitchen":"k1","items":3}"#).unwrap();
    assert_eq!(order, Order::new("k1", 2_000, 3));
    let line = serde_json::to_string(&agg("k1", 0, 3)).unwrap();
    assert_eq!(line, r#"{"date":0,"kitchen":"k1","count":3}"#);
}
