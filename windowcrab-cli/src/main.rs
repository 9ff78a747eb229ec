use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::Rng;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use windowcrab_api::{AggOrder, AppConfig, LateDataPolicy, Order, RunningApp, WindowedApp};
use windowcrab_core::bus::{topic, TopicReceiver, TopicSender};
use windowcrab_core::config::WindowConfig;

#[derive(Parser, Debug)]
#[command(name = "windowcrab")]
#[command(about = "Windowed order aggregation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Aggregate JSON orders read line by line from stdin.
    Run {
        #[command(flatten)]
        app: AppArgs,
    },
    /// Aggregate randomly generated orders until Ctrl-C.
    Demo {
        #[command(flatten)]
        app: AppArgs,
        #[arg(long, default_value_t = 500)]
        produce_interval_ms: u64,
    },
}

#[derive(Args, Debug)]
struct AppArgs {
    #[arg(long, default_value = "windowed-agg")]
    app_id: String,
    #[arg(long, env = "WINDOWCRAB_BROKER", default_value = "kafka://localhost:9092")]
    broker: String,
    #[arg(long, default_value = "tumbling_table")]
    table_name: String,
    #[arg(long, default_value_t = 10)]
    window_secs: u64,
    #[arg(long, default_value_t = 1)]
    lateness_secs: u64,
    #[arg(long, default_value_t = 1000)]
    cleanup_interval_ms: u64,
    #[arg(long, default_value_t = 1)]
    partitions: usize,
    #[arg(long, default_value_t = 1024)]
    channel_capacity: usize,
    #[arg(long, default_value_t = LateDataPolicy::Drop)]
    late_data_policy: LateDataPolicy,
    /// Directory for table snapshots; open windows survive restarts.
    #[arg(long)]
    state_path: Option<PathBuf>,
}

impl AppArgs {
    fn into_config(self) -> AppConfig {
        AppConfig {
            app_id: self.app_id,
            broker_address: self.broker,
            table_name: self.table_name,
            channel_capacity: self.channel_capacity,
            late_data_policy: self.late_data_policy,
            window: WindowConfig::new(
                Duration::from_secs(self.window_secs),
                Duration::from_secs(self.lateness_secs),
            )
            .with_cleanup_interval(Duration::from_millis(self.cleanup_interval_ms))
            .with_partitions(self.partitions),
            state_path: self.state_path,
            ..AppConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { app } => {
            let pipeline = Pipeline::start(app.into_config())?;
            let stdin_done = spawn_stdin_reader(pipeline.app.source())?;
            tokio::select! {
                res = stdin_done => {
                    let read = res.context("stdin reader exited")??;
                    info!(read, "stdin closed");
                }
                _ = tokio::signal::ctrl_c() => info!("ctrl-c received, shutting down"),
            }
            pipeline.shutdown().await
        }
        Commands::Demo {
            app,
            produce_interval_ms,
        } => {
            let pipeline = Pipeline::start(app.into_config())?;
            let source = pipeline.app.source();
            tokio::select! {
                res = produce(source, Duration::from_millis(produce_interval_ms)) => res?,
                _ = tokio::signal::ctrl_c() => info!("ctrl-c received, shutting down"),
            }
            pipeline.shutdown().await
        }
    }
}

/// A running app plus the tasks draining its output topics.
struct Pipeline {
    app: RunningApp,
    results: JoinHandle<Result<u64>>,
    dead_letters: Option<JoinHandle<Result<u64>>>,
}

impl Pipeline {
    fn start(config: AppConfig) -> Result<Self> {
        let (results_tx, results_rx) = topic::<AggOrder>(&config.sink_topic, config.channel_capacity);
        let mut app = WindowedApp::new(config.clone(), results_tx)?;

        let dead_letters = match config.late_data_policy {
            LateDataPolicy::DeadLetter => {
                let (dl_tx, dl_rx) =
                    topic::<Order>(&config.dead_letter_topic, config.channel_capacity);
                app = app.with_dead_letter(dl_tx);
                Some(tokio::task::spawn_blocking(move || {
                    drain_json_lines(dl_rx, std::io::stderr())
                }))
            }
            LateDataPolicy::Drop => None,
        };

        let results = tokio::task::spawn_blocking(move || drain_json_lines(results_rx, std::io::stdout()));
        Ok(Self {
            app: app.start()?,
            results,
            dead_letters,
        })
    }

    async fn shutdown(self) -> Result<()> {
        let report = tokio::task::spawn_blocking(move || self.app.shutdown())
            .await
            .context("shutdown task failed")??;
        let written = self.results.await.context("result writer failed")??;
        if let Some(dead_letters) = self.dead_letters {
            let dead = dead_letters.await.context("dead-letter writer failed")??;
            info!(dead_letters = dead, "dead-letter topic drained");
        }
        info!(
            consumed = report.consumed,
            accepted = report.agent.accepted,
            late = report.agent.late + report.agent.unknown,
            windows_closed = report.driver.closed,
            results = written,
            open_windows = report.open_windows,
            "done"
        );
        Ok(())
    }
}

/// Write every value of `rx` as a JSON line until the topic closes.
fn drain_json_lines<T: serde::Serialize>(rx: TopicReceiver<T>, out: impl Write) -> Result<u64> {
    let mut out = std::io::LineWriter::new(out);
    let mut written = 0u64;
    while let Ok(value) = rx.recv() {
        serde_json::to_writer(&mut out, &value).context("failed to encode output record")?;
        out.write_all(b"\n")?;
        written += 1;
    }
    out.flush()?;
    Ok(written)
}

/// Feed stdin into `source` from a plain thread. A blocked tokio stdin read
/// cannot be cancelled and would stall runtime shutdown on Ctrl-C.
fn spawn_stdin_reader(source: TopicSender<Order>) -> Result<oneshot::Receiver<Result<u64>>> {
    let (done_tx, done_rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            let _ = done_tx.send(read_orders(std::io::stdin().lock(), &source));
        })
        .context("failed to spawn stdin reader")?;
    Ok(done_rx)
}

/// Publish every JSON order line of `input`; malformed lines are skipped.
fn read_orders(input: impl BufRead, source: &TopicSender<Order>) -> Result<u64> {
    let mut read = 0u64;
    for line in input.lines() {
        let line = line.context("failed to read stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let order: Order = match serde_json::from_str(line) {
            Ok(order) => order,
            Err(err) => {
                warn!(error = %err, line, "skipping malformed order");
                continue;
            }
        };
        source.send(order)?;
        read += 1;
    }
    Ok(read)
}

/// Publish a random order for `k1` or `k2` at the current time, every `every`.
async fn produce(source: TopicSender<Order>, every: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        let order = {
            let mut rng = rand::thread_rng();
            let kitchen = if rng.gen_bool(0.5) { "k1" } else { "k2" };
            Order::new(kitchen, now_millis(), rng.gen_range(1..=5))
        };
        tokio::task::block_in_place(|| source.send(order))?;
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_orders_skips_blank_and_malformed_lines() {
        let (tx, rx) = topic::<Order>("event-orders", 16);
        let input = Cursor::new(
            "{\"date\":2000,\"kitchen\":\"k1\",\"items\":3}\n\nnot json\n{\"date\":-9223372036854775808,\"kitchen\":\"k2\",\"items\":1}\n",
        );

        assert_eq!(read_orders(input, &tx).unwrap(), 2);
        assert_eq!(rx.try_recv().unwrap(), Some(Order::new("k1", 2_000, 3)));
        assert_eq!(rx.try_recv().unwrap(), Some(Order::new("k2", i64::MIN, 1)));
        assert_eq!(rx.try_recv().unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stdin_reader_reports_through_oneshot() {
        let (tx, rx) = topic::<Order>("event-orders", 16);
        let (done_tx, done_rx) = oneshot::channel();
        std::thread::spawn(move || {
            let input = Cursor::new("{\"date\":1,\"kitchen\":\"k1\",\"items\":1}\n");
            let _ = done_tx.send(read_orders(input, &tx));
        });
        assert_eq!(done_rx.await.unwrap().unwrap(), 1);
        assert_eq!(rx.recv().unwrap().kitchen, "k1");
    }
}
