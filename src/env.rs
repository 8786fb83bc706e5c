/// Environment variable names used by this crate for convenient
/// configuration of adapters from services.
///
/// These are purely helpers; the adapter types remain decoupled from
/// environment access.

/// DSN selecting the adapter, e.g. `udp://127.0.0.1:5140`.
pub const LOG_SINK_DSN_ENV: &str = "LOG_SINK_DSN";

/// Base URL of the CloudWatch Logs endpoint when the DSN does not name one.
pub const LOG_SINK_CLOUDWATCH_ENDPOINT_ENV: &str = "LOG_SINK_CLOUDWATCH_ENDPOINT";

/// Request timeout, in seconds, of the HTTP based adapters.
pub const LOG_SINK_HTTP_TIMEOUT_SECS_ENV: &str = "LOG_SINK_HTTP_TIMEOUT_SECS";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
