use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type ParameterMap = BTreeMap<String, Value>;

pub const DEFAULT_NETCONF_PORT: u16 = 830;

pub const HOST_KEY: &str = "host";
pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";
pub const PORT_KEY: &str = "port";
pub const PRIVATE_KEY_FILE_KEY: &str = "ssh_private_key_file";
pub const HOSTKEY_VERIFY_KEY: &str = "hostkey_verify";
pub const DEVICE_PARAMS_KEY: &str = "device_params";

/// Parsed inventory document. The credentials key keeps the literal space
/// used by existing inventory files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Inventory {
    #[serde(rename = "global credentials")]
    pub global_credentials: ParameterMap,
    pub hosts: Vec<ParameterMap>,
}

/// Protocol flags applied to every host after the inventory content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticParameters {
    pub hostkey_verify: bool,
    pub device_profile: &'static str,
}

pub const JUNOS_STATIC_PARAMETERS: StaticParameters = StaticParameters {
    hostkey_verify: false,
    device_profile: "junos",
};

impl StaticParameters {
    pub fn to_map(&self) -> ParameterMap {
        let mut device_params = Mapping::new();
        device_params.insert(
            Value::String("name".into()),
            Value::String(self.device_profile.into()),
        );
        let mut map = ParameterMap::new();
        map.insert(HOSTKEY_VERIFY_KEY.into(), Value::Bool(self.hostkey_verify));
        map.insert(DEVICE_PARAMS_KEY.into(), Value::Mapping(device_params));
        map
    }
}

#[derive(Clone, Serialize, PartialEq)]
#[serde(transparent)]
pub struct ConnectionParameters(ParameterMap);

impl ConnectionParameters {
    pub fn new(map: ParameterMap) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_scalar(&self, key: &str) -> Option<String> {
        self.0.get(key).and_then(scalar)
    }

    pub fn host(&self) -> Option<String> {
        self.get_scalar(HOST_KEY)
    }

    /// Host identifier for messages; never empty.
    pub fn display_host(&self) -> String {
        self.host().unwrap_or_else(|| "<unknown host>".into())
    }

    pub fn username(&self) -> Option<String> {
        self.get_scalar(USERNAME_KEY)
    }

    pub fn password(&self) -> Option<String> {
        self.get_scalar(PASSWORD_KEY)
    }

    pub fn ssh_private_key_file(&self) -> Option<String> {
        self.get_scalar(PRIVATE_KEY_FILE_KEY)
    }

    pub fn port(&self) -> u16 {
        match self.0.get(PORT_KEY) {
            Some(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .unwrap_or(DEFAULT_NETCONF_PORT)
    }

    pub fn hostkey_verify(&self) -> bool {
        match self.0.get(HOSTKEY_VERIFY_KEY) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => true,
        }
    }

    pub fn device_profile(&self) -> Option<String> {
        match self.0.get(DEVICE_PARAMS_KEY) {
            Some(Value::Mapping(params)) => params.get("name").and_then(scalar),
            _ => None,
        }
    }

    pub fn into_inner(self) -> ParameterMap {
        self.0
    }
}

impl fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.0 {
            if key == PASSWORD_KEY {
                map.entry(key, &"******");
            } else {
                map.entry(key, value);
            }
        }
        map.finish()
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    #[default]
    SoftwareInfo,
    RunningConfig,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::SoftwareInfo => "software-info",
            Variant::RunningConfig => "running-config",
        }
    }

    /// Failure handling each variant has always had: software-info reports and
    /// moves on, running-config stops the run.
    pub fn default_policy(&self) -> FailurePolicy {
        match self {
            Variant::SoftwareInfo => FailurePolicy::Continue,
            Variant::RunningConfig => FailurePolicy::FailFast,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "software-info" | "software_info" | "softwareinfo" => Ok(Variant::SoftwareInfo),
            "running-config" | "running_config" | "runningconfig" => Ok(Variant::RunningConfig),
            other => Err(format!("unknown variant '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    Continue,
    FailFast,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
    pub host: String,
    pub hostname: String,
    pub version: String,
    pub variant: Variant,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant {
            Variant::SoftwareInfo => write!(
                f,
                "{}: hostname {}, junos version {}",
                self.host, self.hostname, self.version
            ),
            Variant::RunningConfig => write!(
                f,
                "{}: system host-name {}, configuration version {}",
                self.host, self.hostname, self.version
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Authentication,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HostOutcome {
    Success(DeviceInfo),
    TransportFailure { host: String, reason: String },
    AuthFailure { host: String, reason: String },
    OtherFailure { host: String, reason: String },
}

impl HostOutcome {
    pub fn failure(kind: FailureKind, host: String, reason: String) -> Self {
        match kind {
            FailureKind::Transport => HostOutcome::TransportFailure { host, reason },
            FailureKind::Authentication => HostOutcome::AuthFailure { host, reason },
            FailureKind::Other => HostOutcome::OtherFailure { host, reason },
        }
    }

    pub fn host(&self) -> &str {
        match self {
            HostOutcome::Success(info) => &info.host,
            HostOutcome::TransportFailure { host, .. }
            | HostOutcome::AuthFailure { host, .. }
            | HostOutcome::OtherFailure { host, .. } => host,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, HostOutcome::Success(_))
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            HostOutcome::Success(_) => None,
            HostOutcome::TransportFailure { .. } => Some(FailureKind::Transport),
            HostOutcome::AuthFailure { .. } => Some(FailureKind::Authentication),
            HostOutcome::OtherFailure { .. } => Some(FailureKind::Other),
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            HostOutcome::Success(_) => None,
            HostOutcome::TransportFailure { reason, .. }
            | HostOutcome::AuthFailure { reason, .. }
            | HostOutcome::OtherFailure { reason, .. } => Some(reason),
        }
    }
}

impl fmt::Display for HostOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostOutcome::Success(info) => fmt::Display::fmt(info, f),
            HostOutcome::TransportFailure { host, reason } => {
                write!(f, "{}: unable to connect ({})", host, reason)
            }
            HostOutcome::AuthFailure { host, reason } => {
                write!(f, "{}: authentication failed ({})", host, reason)
            }
            HostOutcome::OtherFailure { host, reason } => {
                write!(f, "{}: unexpected error ({})", host, reason)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub variant: Variant,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<HostOutcome>,
}

impl RunSummary {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len().saturating_sub(self.success_count())
    }
}
