//! instance-monitor daemon
//!
//! Runs the monitor in the foreground against a JSON snapshot file and logs
//! every event plus the notifications it would show.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use instance_monitor::{
    InstanceMonitor, JsonFileSource, LogSender, MonitorConfig, NotificationMapper, Notifier,
};

/// Command-line options
struct Args {
    /// Optional JSON config file
    config: Option<PathBuf>,
    /// JSON file holding the current instance snapshot
    snapshots: PathBuf,
    /// Stop after this long; run until killed when absent
    run_for: Option<Duration>,
}

fn usage() {
    println!("instance-monitor - poll instances and report changes");
    println!();
    println!("USAGE:");
    println!("    instance-monitor --snapshots <FILE> [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -s, --snapshots <FILE>    JSON array of instance snapshots (re-read every poll)");
    println!("    -c, --config <FILE>       JSON monitor config [default: built-in defaults]");
    println!("    -t, --run-for <SECS>      Stop after SECS seconds [default: run until killed]");
    println!("    -h, --help                Print help information");
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = std::env::args().collect();
    let mut config = None;
    let mut snapshots = None;
    let mut run_for = None;

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--config" | "-c" => {
                config = Some(PathBuf::from(value.ok_or("--config requires a value")?));
                i += 2;
            }
            "--snapshots" | "-s" => {
                snapshots = Some(PathBuf::from(value.ok_or("--snapshots requires a value")?));
                i += 2;
            }
            "--run-for" | "-t" => {
                let raw = value.ok_or("--run-for requires a value")?;
                let secs: u64 = raw
                    .parse()
                    .map_err(|_| format!("invalid number of seconds: {raw}"))?;
                run_for = Some(Duration::from_secs(secs));
                i += 2;
            }
            "--help" | "-h" => {
                usage();
                std::process::exit(0);
            }
            arg => return Err(format!("unknown argument: {arg}")),
        }
    }

    Ok(Args {
        config,
        snapshots: snapshots.ok_or("--snapshots is required")?,
        run_for,
    })
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("instance_monitor=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("error: {msg}");
            std::process::exit(1);
        }
    };

    init_logging();

    info!(snapshots = %args.snapshots.display(), "starting instance monitor");

    let source = Arc::new(JsonFileSource::new(&args.snapshots));
    let monitor = match &args.config {
        Some(path) => InstanceMonitor::from_config_file(source, path),
        None => InstanceMonitor::new(source, MonitorConfig::default()),
    };
    let monitor = match monitor {
        Ok(monitor) => monitor,
        Err(e) => {
            error!(error = %e, "invalid monitor configuration");
            return Err(e.into());
        }
    };
    let mapper = NotificationMapper::new(monitor.config().notifications.clone());

    let events = monitor.subscribe();
    let notifier = Notifier::spawn(&monitor, mapper, Arc::new(LogSender))?;

    if let Err(e) = monitor.start() {
        error!(error = %e, "monitor failed to start");
        return Err(e.into());
    }

    let deadline = args.run_for.map(|d| Instant::now() + d);
    loop {
        let wait = match deadline {
            Some(at) => {
                let left = at.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    break;
                }
                left
            }
            None => Duration::from_secs(3600),
        };
        match events.recv_timeout(wait) {
            Ok(event) => info!(
                kind = %event.kind(),
                instance = event.instance(),
                severity = %event.severity(),
                "{}",
                event.message()
            ),
            Err(e) if e.is_retryable() => {}
            Err(e) => {
                error!(error = %e, "event stream closed");
                break;
            }
        }
    }

    notifier.stop();
    monitor.stop();
    let stats = monitor.stats();
    info!(
        cycles = stats.cycles,
        fetch_failures = stats.fetch_failures,
        events = stats.events_published,
        "instance monitor exited"
    );
    Ok(())
}
