//! sysmon: a host telemetry probe that samples kernel pseudo-files and republishes
//! the latest values as health-check status reports.
//!
//! This library provides the snapshot parsers for `/proc/cpuinfo`, `/proc/stat`,
//! the mount table, `/proc/loadavg` and `/proc/meminfo`, a collector facade that
//! renders their snapshots as OK/ERROR status reports, and the loop that drives
//! them once per interval.

pub mod collector;
pub mod config;
pub mod error;
pub mod fsutil;
pub mod mounttab;
pub mod report;
pub mod stats;

use std::time::Duration;

use collector::Collector;
use error::ResultOkLogExt;
use mounttab::FsStatProvider;
use report::StatusSink;

/// Runs the sysmon probe.
///
/// Reads the configuration from the environment, then refreshes every parser on
/// each tick and writes the resulting status reports to stdout as JSON lines
/// until Ctrl-C is received.
///
/// # Returns
///
/// Returns `Ok(())` after a clean shutdown, or an error if any component fails.
///
/// # Errors
///
/// Possible errors include:
/// - Invalid configuration variables (e.g., a non-numeric `SYSMON_INTERVAL_SECS`).
/// - A panic inside the blocking collection task.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::from_env()?;
    log::debug!("Configuration: {config:?}");

    let collector = Collector::from_config(&config);
    log::info!(
        "Reporting every {}s as hardware id `{}`",
        config.interval.as_secs(),
        collector.hardware_id()
    );
    let sink = report::JsonLinesSink::new(std::io::stdout());

    run_until(collector, sink, config.interval, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {err}");
        }
        log::info!("Received Ctrl-C, shutting down");
    })
    .await
}

/// Collects and publishes reports once per `period` until `shutdown` completes.
///
/// Collection and publishing both run on the blocking thread pool. `shutdown`
/// is polled across ticks, so a signal raised while a tick is in progress ends
/// the loop before the next one.
///
/// # Errors
///
/// Returns an error if the blocking collection task panics.
pub async fn run_until<S, K>(
    mut collector: Collector<S>,
    mut sink: K,
    period: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<(), Box<dyn std::error::Error>>
where
    S: FsStatProvider + Send + 'static,
    K: StatusSink + Send + 'static,
{
    tokio::pin!(shutdown);
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            biased;
            () = &mut shutdown => break,
            _ = interval.tick() => {}
        }

        (collector, sink) = tokio::task::spawn_blocking(move || {
            let before = std::time::Instant::now();
            let reports = collector.collect();
            let took = before.elapsed();
            log::trace!("collect() took {} nanoseconds", took.as_nanos());
            sink.publish(&reports).ok_log();
            (collector, sink)
        })
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::future;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::task::Poll;

    use super::*;
    use crate::collector::CollectorBuilder;
    use crate::report::StatusReport;

    /// Records report batches and requests shutdown on every publish.
    struct StoppingSink {
        batches: Arc<Mutex<Vec<Vec<String>>>>,
        stop: Arc<AtomicBool>,
    }

    impl StatusSink for StoppingSink {
        fn publish(&mut self, reports: &[StatusReport]) -> report::Result<()> {
            let names = reports.iter().map(|report| report.name.clone()).collect();
            self.batches.lock().unwrap().push(names);
            self.stop.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn collector(dir: &tempfile::TempDir) -> Collector {
        std::fs::write(dir.path().join("loadavg"), "0.10 0.20 0.30 1/200 1234\n").unwrap();
        std::fs::write(dir.path().join("meminfo"), "MemTotal: 1000 kB\n").unwrap();

        let mut builder = CollectorBuilder::new("host-1");
        builder
            .set_cpuinfo_file(dir.path().join("cpuinfo"))
            .set_stat_file(dir.path().join("stat"))
            .set_mount_table(dir.path().join("mtab"))
            .set_loadavg_file(dir.path().join("loadavg"))
            .set_meminfo_file(dir.path().join("meminfo"));
        builder.build()
    }

    fn stopped(stop: Arc<AtomicBool>) -> impl Future<Output = ()> {
        future::poll_fn(move |_| {
            if stop.load(Ordering::SeqCst) {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
    }

    #[tokio::test]
    async fn test_shutdown_during_publish_ends_loop() {
        let dir = tempfile::tempdir().unwrap();
        let batches = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let sink = StoppingSink {
            batches: Arc::clone(&batches),
            stop: Arc::clone(&stop),
        };

        run_until(collector(&dir), sink, Duration::from_millis(1), stopped(stop))
            .await
            .unwrap();

        assert_eq!(
            *batches.lock().unwrap(),
            vec![vec!["Load Average".to_owned(), "Memory".to_owned()]]
        );
    }

    #[tokio::test]
    async fn test_shutdown_before_first_tick_publishes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let batches = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(true));
        let sink = StoppingSink {
            batches: Arc::clone(&batches),
            stop: Arc::clone(&stop),
        };

        run_until(collector(&dir), sink, Duration::from_millis(1), stopped(stop))
            .await
            .unwrap();

        assert!(batches.lock().unwrap().is_empty());
    }
}
