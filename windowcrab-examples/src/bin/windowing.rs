//! Drives a window table by hand: records, watermark and sweeps without the
//! ingest and expiry threads.

use std::sync::Arc;
use std::time::Duration;

use windowcrab_core::config::WindowConfig;
use windowcrab_core::types::{AggregateResult, WindowKey};
use windowcrab_core::window::{ExpirationDriver, TumblingWindowTable};

fn main() -> anyhow::Result<()> {
    let config = WindowConfig::new(Duration::from_secs(10), Duration::from_secs(2));
    let table = Arc::new(TumblingWindowTable::new(
        "event-time-windowing",
        config,
        |key: &WindowKey, values: &[i32]| -> anyhow::Result<()> {
            let result = AggregateResult::count_of(key, values);
            let sum: i32 = values.iter().sum();
            println!(
                "closed key={} window_start={} count={} sum={}",
                result.partition_key, result.window_start, result.count, sum
            );
            Ok(())
        },
    )?);
    let driver = ExpirationDriver::new(Arc::clone(&table));

    // (user, ts_ms, value)
    let events = [
        ("u1", 1_000, 1),
        ("u1", 9_000, 2),
        // Out of order but within the 2s lateness.
        ("u1", 8_000, 3),
        ("u2", 10_500, 7),
        // Watermark 12_000 reaches the expiry of [0, 10_000).
        ("u1", 14_000, 10),
        // Too late: its window has expired.
        ("u1", 4_000, 100),
    ];

    for (user, ts, value) in events {
        match table.record(user, ts, value) {
            Ok(key) => println!("ts={ts} -> {key} (watermark {})", table.watermark()),
            Err(err) => println!("ts={ts} rejected: {err}"),
        }
        let report = driver.sweep();
        if report.evicted() > 0 {
            println!("sweep closed {} window(s)", report.closed);
        }
    }

    println!("open windows: {}", table.index().pending());
    Ok(())
}
