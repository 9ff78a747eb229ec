use std::time::Duration;

use windowcrab_api::{AggOrder, AppConfig, Order, WindowedApp};
use windowcrab_core::bus::topic;
use windowcrab_core::config::WindowConfig;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .init();

    let config = AppConfig::default().with_window(
        WindowConfig::new(Duration::from_secs(10), Duration::from_secs(1))
            .with_cleanup_interval(Duration::from_millis(50)),
    );
    let (results_tx, results_rx) = topic::<AggOrder>(&config.sink_topic, config.channel_capacity);
    let app = WindowedApp::new(config, results_tx)?.start()?;
    let source = app.source();

    // (kitchen, event time ms, items)
    let orders = [
        ("k1", 2_000, 1),
        ("k1", 5_000, 3),
        ("k2", 6_000, 2),
        ("k1", 9_000, 1),
        ("k2", 11_000, 5),
        // Advances the watermark to 11.5s, closing [0s, 10s) for both kitchens.
        ("k2", 12_500, 4),
        // Late: [0s, 10s) is gone.
        ("k1", 3_000, 2),
        ("k1", 24_000, 1),
    ];
    for (kitchen, date, items) in orders {
        source.send(Order::new(kitchen, date, items))?;
    }

    let report = app.shutdown()?;

    let mut results = Vec::new();
    // The sink topic closes once the app is gone; drain what it buffered.
    while let Ok(Some(agg)) = results_rx.try_recv() {
        results.push(agg);
    }
    results.sort_by(|a, b| (a.date, &a.kitchen).cmp(&(b.date, &b.kitchen)));
    for agg in results {
        println!("window={}ms kitchen={} count={}", agg.date, agg.kitchen, agg.count);
    }
    println!(
        "accepted={} late={} open_windows={}",
        report.agent.accepted,
        report.agent.late + report.agent.unknown,
        report.open_windows
    );

    Ok(())
}
