use once_cell::sync::Lazy;
use std::time::Duration;

const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 30;

static SESSION_TIMEOUT: Lazy<Duration> = Lazy::new(|| {
    env_duration(
        "JUNOSCAN_SESSION_TIMEOUT_SECS",
        Duration::from_secs(DEFAULT_SESSION_TIMEOUT_SECS),
    )
});

static USE_MOCK_DRIVER: Lazy<bool> = Lazy::new(|| env_flag("JUNOSCAN_USE_MOCK_DRIVER"));

/// Upper bound for one host: connect, hello, rpc and close together.
pub fn session_timeout() -> Duration {
    *SESSION_TIMEOUT
}

pub fn use_mock_driver() -> bool {
    *USE_MOCK_DRIVER
}

fn env_duration(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_flag(var: &str) -> bool {
    std::env::var(var)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
