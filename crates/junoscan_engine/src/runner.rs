use junoscan_drivers::{config, DeviceReply, DynDeviceDriver, RpcRequest, SessionError};
use junoscan_model::{
    ConnectionParameters, DeviceInfo, FailurePolicy, HostOutcome, RunSummary, Variant,
};
use std::io::Write;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{host}: {source}")]
    Session {
        host: String,
        #[source]
        source: SessionError,
    },
    #[error("writing output: {0}")]
    Output(#[from] std::io::Error),
}

/// Reply elements read for each variant: (version, hostname).
pub fn field_paths(variant: Variant) -> (&'static str, &'static str) {
    match variant {
        Variant::SoftwareInfo => (
            "software-information/junos-version",
            "software-information/host-name",
        ),
        Variant::RunningConfig => ("configuration/version", "configuration/system/host-name"),
    }
}

pub fn extract(
    host: String,
    reply: &DeviceReply,
    variant: Variant,
) -> Result<DeviceInfo, SessionError> {
    let (version_path, hostname_path) = field_paths(variant);
    let version = reply.leaf(version_path)?.to_string();
    let hostname = reply.leaf(hostname_path)?.to_string();
    Ok(DeviceInfo {
        host,
        hostname,
        version,
        variant,
    })
}

pub struct SessionRunner {
    driver: DynDeviceDriver,
    timeout: Duration,
    policy: Option<FailurePolicy>,
}

impl SessionRunner {
    pub fn new(driver: DynDeviceDriver) -> Self {
        Self {
            driver,
            timeout: config::session_timeout(),
            policy: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the variant's own failure handling.
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn policy_for(&self, variant: Variant) -> FailurePolicy {
        self.policy.unwrap_or_else(|| variant.default_policy())
    }

    /// Never fails: every error is classified into the outcome.
    pub async fn software_info(&self, params: &ConnectionParameters) -> HostOutcome {
        self.poll(params, Variant::SoftwareInfo).await
    }

    pub async fn running_config(
        &self,
        params: &ConnectionParameters,
    ) -> Result<DeviceInfo, RunnerError> {
        self.fetch_info(params, Variant::RunningConfig).await
    }

    pub async fn poll(&self, params: &ConnectionParameters, variant: Variant) -> HostOutcome {
        let host = params.display_host();
        match self.query(params, variant).await {
            Ok(info) => HostOutcome::Success(info),
            Err(err) => {
                warn!(
                    target: "engine::runner",
                    "{} {:?} failure: {}",
                    host,
                    err.kind(),
                    err
                );
                HostOutcome::failure(err.kind(), host, err.to_string())
            }
        }
    }

    pub async fn fetch_info(
        &self,
        params: &ConnectionParameters,
        variant: Variant,
    ) -> Result<DeviceInfo, RunnerError> {
        self.query(params, variant)
            .await
            .map_err(|source| RunnerError::Session {
                host: params.display_host(),
                source,
            })
    }

    #[instrument(skip_all, fields(host = %params.display_host(), variant = %variant))]
    async fn query(
        &self,
        params: &ConnectionParameters,
        variant: Variant,
    ) -> Result<DeviceInfo, SessionError> {
        let request = RpcRequest::for_variant(variant);
        info!(target: "engine::runner", "querying via {}", self.driver.name());
        let reply = tokio::time::timeout(self.timeout, self.driver.fetch(params, request))
            .await
            .map_err(|_| SessionError::Timeout(self.timeout))??;
        extract(params.display_host(), &reply, variant)
    }

    /// Contacts each host in turn and writes one line per host to `out`.
    /// Under `FailFast` the first failure ends the run with an error.
    pub async fn run<I, W>(
        &self,
        params: I,
        variant: Variant,
        out: &mut W,
    ) -> Result<RunSummary, RunnerError>
    where
        I: IntoIterator<Item = ConnectionParameters>,
        W: Write,
    {
        let policy = self.policy_for(variant);
        let started_at = chrono::Utc::now();
        let mut outcomes = Vec::new();

        for params in params {
            let outcome = match policy {
                FailurePolicy::Continue => self.poll(&params, variant).await,
                FailurePolicy::FailFast => {
                    HostOutcome::Success(self.fetch_info(&params, variant).await?)
                }
            };
            writeln!(out, "{}", outcome)?;
            outcomes.push(outcome);
        }

        let summary = RunSummary {
            variant,
            started_at,
            finished_at: chrono::Utc::now(),
            outcomes,
        };
        info!(
            target: "engine::runner",
            "{} run finished: success={} failed={}",
            variant,
            summary.success_count(),
            summary.failure_count()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connection_parameters, parse_inventory};
    use junoscan_drivers::drivers::{MockBehavior, MockDriver};
    use junoscan_drivers::ReplyError;
    use junoscan_model::{FailureKind, Inventory, ParameterMap, JUNOS_STATIC_PARAMETERS};
    use std::sync::Arc;

    fn three_hosts() -> Inventory {
        parse_inventory(
            "global credentials: {username: lab, password: lab123}\nhosts:\n  - host: r1\n  - host: r2\n  - host: r3\n",
            "test",
        )
        .expect("inventory")
    }

    fn runner(driver: &MockDriver) -> SessionRunner {
        SessionRunner::new(Arc::new(driver.clone())).with_timeout(Duration::from_secs(5))
    }

    fn single(host: &str) -> ConnectionParameters {
        let mut map = ParameterMap::new();
        map.insert("host".into(), host.into());
        ConnectionParameters::new(map)
    }

    #[tokio::test]
    async fn software_info_tolerates_a_failing_host() {
        let driver = MockDriver::new().with_behavior("r2", MockBehavior::TransportFailure);
        let inventory = three_hosts();
        let mut out = Vec::new();

        let summary = runner(&driver)
            .run(
                connection_parameters(&inventory, &JUNOS_STATIC_PARAMETERS),
                Variant::SoftwareInfo,
                &mut out,
            )
            .await
            .expect("run completes");

        assert_eq!(driver.calls(), vec!["r1", "r2", "r3"]);
        assert_eq!(summary.success_count(), 2);
        assert_eq!(
            summary.outcomes[1].failure_kind(),
            Some(FailureKind::Transport)
        );

        let printed = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = printed.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "r1: hostname mock-r1, junos version 21.4R3-S5");
        assert!(lines[1].starts_with("r2: unable to connect"));
        assert_eq!(lines[2], "r3: hostname mock-r3, junos version 21.4R3-S5");
    }

    #[tokio::test]
    async fn failures_are_classified() {
        let driver = MockDriver::new()
            .with_behavior("auth", MockBehavior::AuthFailure)
            .with_behavior("other", MockBehavior::OtherFailure)
            .with_behavior("garbled", MockBehavior::MissingFields);
        let runner = runner(&driver);

        let auth = runner.software_info(&single("auth")).await;
        assert_eq!(auth.failure_kind(), Some(FailureKind::Authentication));
        assert!(auth.to_string().starts_with("auth: authentication failed"));

        let other = runner.software_info(&single("other")).await;
        assert_eq!(other.failure_kind(), Some(FailureKind::Other));

        let garbled = runner.software_info(&single("garbled")).await;
        assert_eq!(garbled.failure_kind(), Some(FailureKind::Other));
        assert!(garbled
            .reason()
            .unwrap_or_default()
            .contains("software-information/junos-version"));
    }

    #[tokio::test]
    async fn running_config_stops_at_first_failure() {
        let driver = MockDriver::new().with_behavior("r2", MockBehavior::TransportFailure);
        let inventory = three_hosts();
        let mut out = Vec::new();

        let err = runner(&driver)
            .run(
                connection_parameters(&inventory, &JUNOS_STATIC_PARAMETERS),
                Variant::RunningConfig,
                &mut out,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RunnerError::Session { ref host, .. } if host == "r2"));
        assert_eq!(driver.calls(), vec!["r1", "r2"]);
        let printed = String::from_utf8(out).expect("utf8");
        assert_eq!(
            printed,
            "r1: system host-name mock-r1, configuration version 21.4R3-S5\n"
        );
    }

    #[tokio::test]
    async fn running_config_can_continue_on_error() {
        let driver = MockDriver::new().with_behavior("r2", MockBehavior::AuthFailure);
        let inventory = three_hosts();
        let mut out = Vec::new();

        let summary = runner(&driver)
            .with_policy(FailurePolicy::Continue)
            .run(
                connection_parameters(&inventory, &JUNOS_STATIC_PARAMETERS),
                Variant::RunningConfig,
                &mut out,
            )
            .await
            .expect("run completes");

        assert_eq!(summary.outcomes.len(), 3);
        assert_eq!(summary.failure_count(), 1);
        assert_eq!(driver.calls(), vec!["r1", "r2", "r3"]);
    }

    #[tokio::test]
    async fn running_config_reads_configuration_fields() {
        let driver = MockDriver::new();
        let info = runner(&driver)
            .running_config(&single("10.0.0.1"))
            .await
            .expect("config");
        assert_eq!(info.hostname, "mock-10-0-0-1");
        assert_eq!(info.version, "21.4R3-S5");
        assert_eq!(info.variant, Variant::RunningConfig);
    }

    #[tokio::test]
    async fn hung_host_times_out_as_transport_failure() {
        let driver = MockDriver::new().with_behavior("slow", MockBehavior::Hang);
        let outcome = SessionRunner::new(Arc::new(driver))
            .with_timeout(Duration::from_millis(50))
            .software_info(&single("slow"))
            .await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::Transport));
        assert!(outcome.reason().unwrap_or_default().contains("no reply within"));
    }

    #[test]
    fn extract_reports_missing_field() {
        let reply = DeviceReply::parse(
            "<rpc-reply><software-information><host-name>r1</host-name></software-information></rpc-reply>",
        )
        .expect("parse");
        let err = extract("r1".into(), &reply, Variant::SoftwareInfo).unwrap_err();
        assert!(matches!(
            err,
            SessionError::MalformedReply(ReplyError::MissingField(_))
        ));
    }
}
