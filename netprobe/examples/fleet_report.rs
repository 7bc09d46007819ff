//! Many devices: run catalog operations on every host concurrently and
//! print one CSV row per device as reports arrive.
//!
//! # Usage
//!
//! ```bash
//! NETPROBE_PASSWORD=secret NETPROBE_ENABLE=s3cret \
//!     cargo run --example fleet_report -- admin cisco_ios ntp_status 10.0.0.1 10.0.0.2 10.0.0.3
//! ```
//!
//! Secrets come from the environment so they never appear in the process list.

use std::env;
use std::sync::Arc;

use netprobe::driver::{DeviceReport, FleetJob, ReportSink, run_fleet};
use netprobe::transport::SshConnector;
use netprobe::{Credentials, PlatformRegistry, SshConfig};

/// Writes reports as CSV rows to stdout.
struct CsvSink {
    rows: usize,
}

impl CsvSink {
    fn field(text: &str) -> String {
        format!("\"{}\"", text.replace('"', "\"\""))
    }
}

impl ReportSink for CsvSink {
    fn record(&mut self, report: DeviceReport) {
        let status = match report.error_kind() {
            None => "ok".to_string(),
            Some(kind) => format!("{:?}", kind),
        };
        let first_line = report
            .results
            .first()
            .and_then(|r| r.lines().next())
            .unwrap_or_default();
        let completion = report
            .results
            .first()
            .map(|r| format!("{:?}", r.completion))
            .unwrap_or_default();

        println!(
            "{},{},{},{},{:.1}",
            Self::field(&report.host),
            status,
            completion,
            Self::field(first_line),
            report.elapsed.as_secs_f64()
        );
        self.rows += 1;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 4 {
        eprintln!("usage: fleet_report <user> <platform> <operation[,operation...]> <host>...");
        std::process::exit(2);
    }

    let password = env::var("NETPROBE_PASSWORD")?;
    let mut credentials = Credentials::password(&args[0], password);
    if let Ok(secret) = env::var("NETPROBE_ENABLE") {
        credentials = credentials.with_enable_secret(secret);
    }

    let platform = PlatformRegistry::with_builtins().resolve(&args[1])?;
    let job = FleetJob::new(platform, args[2].split(',')).with_max_concurrency(16);
    let connector = Arc::new(SshConnector::new(SshConfig::default()));

    println!("host,status,completion,first_line,seconds");
    let mut sink = CsvSink { rows: 0 };
    let summary = run_fleet(
        connector,
        Arc::new(credentials),
        args[3..].iter().cloned(),
        job,
        &mut sink,
    )
    .await;

    eprintln!(
        "{} rows, {} succeeded, {} failed",
        sink.rows, summary.succeeded, summary.failed
    );
    Ok(())
}
