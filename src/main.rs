/// Entry point for the sysmon host telemetry probe.
///
/// Samples processor, CPU time, disk, load and memory state once per interval
/// and prints one JSON status report per monitored entity on stdout.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the collection loop fails.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=debug SYSMON_INTERVAL_SECS=5 cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    sysmon::run().await
}
