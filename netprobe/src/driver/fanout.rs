//! Running the same catalog operations against many devices at once.
//!
//! Every host gets its own task, session and deadlines, so one slow or
//! broken device never holds up or fails another. Reports are handed to the
//! [`ReportSink`] by the calling task alone, one at a time, in completion
//! order.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::response::CommandResult;
use super::session::{Session, SessionOptions};
use crate::error::{DriverError, Error, ErrorKind};
use crate::platform::PlatformDefinition;
use crate::transport::{Connector, Credentials};

/// Everything collected from one device.
#[derive(Debug)]
pub struct DeviceReport {
    /// Device identity.
    pub host: String,

    /// Platform name used for the device.
    pub platform: String,

    /// Results of the operations that ran, in order.
    pub results: Vec<CommandResult>,

    /// What stopped the run early, if anything.
    pub error: Option<Error>,

    /// Time from connect to close.
    pub elapsed: Duration,
}

impl DeviceReport {
    /// Whether every operation ran.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Classification of the failure, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(Error::kind)
    }

    /// The result for a command text, if it ran.
    pub fn result(&self, command: &str) -> Option<&CommandResult> {
        self.results.iter().find(|r| r.command == command)
    }
}

/// Destination for device reports (CSV writer, mailer, collector...).
///
/// `record` is only ever called from one task, so implementations need no
/// locking of their own.
pub trait ReportSink: Send {
    /// Accept one finished report.
    fn record(&mut self, report: DeviceReport);
}

impl ReportSink for Vec<DeviceReport> {
    fn record(&mut self, report: DeviceReport) {
        self.push(report);
    }
}

/// What to run on every device.
#[derive(Debug, Clone)]
pub struct FleetJob {
    /// Device family of every host in the run.
    pub platform: Arc<PlatformDefinition>,

    /// Catalog operation names, run in order.
    pub operations: Vec<String>,

    /// Session behavior for each device.
    pub options: SessionOptions,

    /// Maximum devices worked on at the same time.
    pub max_concurrency: usize,
}

impl FleetJob {
    /// A job with default session options and up to 32 devices in parallel.
    pub fn new<S: Into<String>>(
        platform: Arc<PlatformDefinition>,
        operations: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            platform,
            operations: operations.into_iter().map(Into::into).collect(),
            options: SessionOptions::default(),
            max_concurrency: 32,
        }
    }

    /// Set the session options.
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the parallelism limit (at least 1).
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }
}

/// Counts for a finished fleet run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FleetSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Run `job` on every host and deliver one [`DeviceReport`] per host to
/// `sink`.
pub async fn run_fleet<K, H, S>(
    connector: Arc<K>,
    credentials: Arc<Credentials>,
    hosts: impl IntoIterator<Item = H>,
    job: FleetJob,
    sink: &mut S,
) -> FleetSummary
where
    K: Connector + 'static,
    H: Into<String>,
    S: ReportSink + ?Sized,
{
    let limiter = Arc::new(Semaphore::new(job.max_concurrency.max(1)));
    let job = Arc::new(job);
    let mut tasks = JoinSet::new();

    for host in hosts {
        let host: String = host.into();
        let connector = Arc::clone(&connector);
        let credentials = Arc::clone(&credentials);
        let job = Arc::clone(&job);
        let limiter = Arc::clone(&limiter);

        tasks.spawn(async move {
            // The semaphore is never closed
            let _permit = limiter.acquire_owned().await.ok();
            survey(connector.as_ref(), &credentials, host, &job).await
        });
    }
    info!("fleet run started on {} hosts", tasks.len());

    let mut summary = FleetSummary::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(report) => {
                if report.is_success() {
                    summary.succeeded += 1;
                } else {
                    summary.failed += 1;
                }
                sink.record(report);
            }
            Err(e) => {
                error!("device task aborted: {}", e);
                summary.failed += 1;
            }
        }
    }

    info!(
        "fleet run finished: {} succeeded, {} failed",
        summary.succeeded, summary.failed
    );
    summary
}

/// Connect, run every operation, close.
async fn survey<K: Connector>(
    connector: &K,
    credentials: &Credentials,
    host: String,
    job: &FleetJob,
) -> DeviceReport {
    let start = Instant::now();
    let mut report = DeviceReport {
        host: host.clone(),
        platform: job.platform.name.clone(),
        results: Vec::with_capacity(job.operations.len()),
        error: None,
        elapsed: Duration::ZERO,
    };

    let channel = match connector.connect(&host, credentials).await {
        Ok(channel) => channel,
        Err(e) => {
            warn!("{}: connect failed: {}", host, e);
            report.error = Some(e);
            report.elapsed = start.elapsed();
            return report;
        }
    };

    let session = Session::open(
        host.clone(),
        Arc::clone(&job.platform),
        channel,
        credentials.session_enable_secret(),
        job.options.clone(),
    )
    .await;
    let mut session = match session {
        Ok(session) => session,
        Err(e) => {
            report.error = Some(e);
            report.elapsed = start.elapsed();
            return report;
        }
    };

    for operation in &job.operations {
        let outcome = match job.platform.command(operation) {
            Some(spec) => session.execute(&spec.command, spec.timeouts.as_ref()).await,
            None => Err(DriverError::UnknownCommand {
                name: operation.clone(),
                platform: job.platform.name.clone(),
            }
            .into()),
        };
        match outcome {
            Ok(result) => report.results.push(result),
            Err(e) => {
                report.error = Some(e);
                break;
            }
        }
    }

    if let Err(e) = session.close().await {
        debug!("{}: close failed: {}", host, e);
    }
    report.elapsed = start.elapsed();
    report
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;

    use super::*;
    use crate::driver::response::Completion;
    use crate::error::{Result, TransportError};
    use crate::platform::vendors::cisco_ios;
    use crate::transport::ScriptedChannel;

    struct ScriptedConnector {
        devices: Mutex<HashMap<String, ScriptedChannel>>,
    }

    impl ScriptedConnector {
        fn new(devices: Vec<(&str, ScriptedChannel)>) -> Arc<Self> {
            let devices = devices
                .into_iter()
                .map(|(host, channel)| (host.to_string(), channel))
                .collect();
            Arc::new(Self {
                devices: Mutex::new(devices),
            })
        }
    }

    impl Connector for ScriptedConnector {
        type Channel = ScriptedChannel;

        async fn connect(&self, host: &str, _credentials: &Credentials) -> Result<ScriptedChannel> {
            let channel = self.devices.lock().unwrap().remove(host);
            channel.ok_or_else(|| {
                TransportError::ConnectionFailed {
                    host: host.to_string(),
                    port: 22,
                    source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
                }
                .into()
            })
        }
    }

    fn router(name: &str) -> ScriptedChannel {
        ScriptedChannel::new()
            .output_at(Duration::ZERO, &format!("\r\n{name}>"))
            .respond("enable", "Password: ")
            .respond("s3cret", &format!("\r\n{name}#"))
            .respond("terminal length 0", &format!("\r\n{name}#"))
            .respond(
                "show ntp status",
                &format!("Clock is synchronized, stratum 3\r\n{name}#"),
            )
    }

    fn credentials() -> Arc<Credentials> {
        Arc::new(Credentials::password("admin", "hunter2").with_enable_secret("s3cret"))
    }

    fn job() -> FleetJob {
        FleetJob::new(Arc::new(cisco_ios::platform()), ["ntp_status"])
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_isolated() {
        let connector = ScriptedConnector::new(vec![
            ("r1", router("r1")),
            ("r3", ScriptedChannel::new()),
            ("r4", router("r4")),
        ]);
        let mut reports: Vec<DeviceReport> = Vec::new();

        let summary = run_fleet(connector, credentials(), ["r1", "r2", "r3", "r4"], job(), &mut reports).await;

        assert_eq!(summary, FleetSummary { succeeded: 2, failed: 2 });
        assert_eq!(reports.len(), 4);

        let by_host: HashMap<&str, &DeviceReport> =
            reports.iter().map(|r| (r.host.as_str(), r)).collect();
        assert_eq!(by_host["r2"].error_kind(), Some(ErrorKind::ConnectFailure));
        assert_eq!(by_host["r3"].error_kind(), Some(ErrorKind::PromptNotRecognized));
        for host in ["r1", "r4"] {
            let report = by_host[host];
            assert!(report.is_success());
            let ntp = report.result("show ntp status").unwrap();
            assert_eq!(ntp.completion, Completion::Complete);
            assert_eq!(ntp.body, "Clock is synchronized, stratum 3");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_devices_run_concurrently() {
        let connector = ScriptedConnector::new(vec![
            ("s1", ScriptedChannel::new()),
            ("s2", ScriptedChannel::new()),
            ("s3", ScriptedChannel::new()),
        ]);
        let mut reports: Vec<DeviceReport> = Vec::new();

        let start = Instant::now();
        let summary = run_fleet(connector, credentials(), ["s1", "s2", "s3"], job(), &mut reports).await;

        // A silent device costs settle + handshake + echoed nudge (~12s)
        assert_eq!(summary.failed, 3);
        assert!(start.elapsed() < Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_limit() {
        let connector = ScriptedConnector::new(vec![
            ("s1", ScriptedChannel::new()),
            ("s2", ScriptedChannel::new()),
        ]);
        let mut reports: Vec<DeviceReport> = Vec::new();

        let start = Instant::now();
        run_fleet(
            connector,
            credentials(),
            ["s1", "s2"],
            job().with_max_concurrency(1),
            &mut reports,
        )
        .await;

        assert!(start.elapsed() >= Duration::from_secs(23));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_operation_stops_device() {
        let connector = ScriptedConnector::new(vec![("r1", router("r1"))]);
        let mut reports: Vec<DeviceReport> = Vec::new();
        let job = FleetJob::new(Arc::new(cisco_ios::platform()), ["ntp_status", "sshd_config"]);

        run_fleet(connector, credentials(), ["r1"], job, &mut reports).await;

        let report = &reports[0];
        assert_eq!(report.results.len(), 1);
        assert!(matches!(
            report.error,
            Some(Error::Driver(DriverError::UnknownCommand { .. }))
        ));
    }
}
