use std::time::Duration;

use crate::env::{env_or, LOG_SINK_CLOUDWATCH_ENDPOINT_ENV, LOG_SINK_DSN_ENV, LOG_SINK_HTTP_TIMEOUT_SECS_ENV};
use crate::error::{AdapterError, BoxError};
use crate::sink::LogSink;

/// Supported adapter kinds that can be selected via DSN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    CloudWatch,
    Database,
    Slack,
    Udp,
}

/// Adapter coordinates parsed from a DSN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    CloudWatch {
        /// Falls back to `LOG_SINK_CLOUDWATCH_ENDPOINT`. Building fails when
        /// neither is set.
        endpoint: Option<String>,
        group: String,
        stream: String,
    },
    Database {
        /// sqlx connection URL. File databases carry `mode=rwc` unless the
        /// DSN sets another `mode`.
        url: String,
        table: String,
        name: String,
    },
    Slack {
        token: String,
        channel: String,
    },
    Udp {
        host: String,
        port: u16,
    },
}

impl BackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::CloudWatch { .. } => BackendKind::CloudWatch,
            BackendConfig::Database { .. } => BackendKind::Database,
            BackendConfig::Slack { .. } => BackendKind::Slack,
            BackendConfig::Udp { .. } => BackendKind::Udp,
        }
    }

    /// Parse the DSN found in `LOG_SINK_DSN`.
    pub fn from_env() -> Result<Self, DsnError> {
        let dsn = std::env::var(LOG_SINK_DSN_ENV).map_err(|_| DsnError::MissingEnv(LOG_SINK_DSN_ENV))?;
        parse_dsn(&dsn)
    }
}

/// Error type returned when parsing a DSN.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DsnError {
    #[error("unknown or unsupported DSN scheme")]
    UnknownScheme,

    #[error("DSN is missing the {0}")]
    Missing(&'static str),

    #[error("invalid port {0:?}")]
    InvalidPort(String),

    #[error("DSN component is not valid percent-encoded UTF-8")]
    InvalidEncoding,

    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
}

/// Parse a DSN string into adapter coordinates.
///
/// Examples:
/// - "cloudwatch://my-app/web-1?endpoint=http://127.0.0.1:4566"
/// - "cloudwatch:///aws/lambda/checkout/2024-05-01" (group with slashes)
/// - "sqlite://var/logs.db?table=logs&name=checkout" (file created if missing)
/// - "sqlite::memory:"
/// - "slack://xoxb-token@alerts"
/// - "udp://127.0.0.1:5140"
pub fn parse_dsn(dsn: &str) -> Result<BackendConfig, DsnError> {
    let (location, query) = match dsn.split_once('?') {
        Some((location, query)) => (location, query),
        None => (dsn, ""),
    };
    let params = parse_query(query)?;
    let param = |key: &str| params.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());

    if location.eq_ignore_ascii_case("sqlite::memory:") {
        return Ok(BackendConfig::Database {
            url: "sqlite::memory:".to_string(),
            table: param("table").unwrap_or_else(|| "logs".to_string()),
            name: param("name").unwrap_or_else(|| "app".to_string()),
        });
    }

    let (scheme, rest) = location.split_once("://").ok_or(DsnError::UnknownScheme)?;

    match scheme.to_ascii_lowercase().as_str() {
        "cloudwatch" => {
            let (group, stream) = rest.rsplit_once('/').ok_or(DsnError::Missing("log stream"))?;
            let group = decode(group)?;
            let stream = decode(stream)?;
            if group.is_empty() {
                return Err(DsnError::Missing("log group"));
            }
            if stream.is_empty() {
                return Err(DsnError::Missing("log stream"));
            }
            Ok(BackendConfig::CloudWatch {
                endpoint: param("endpoint"),
                group,
                stream,
            })
        }
        "sqlite" => {
            if rest.is_empty() {
                return Err(DsnError::Missing("database path"));
            }
            Ok(BackendConfig::Database {
                url: format!("sqlite://{}?mode={}", rest, param("mode").unwrap_or_else(|| "rwc".to_string())),
                table: param("table").unwrap_or_else(|| "logs".to_string()),
                name: param("name").unwrap_or_else(|| "app".to_string()),
            })
        }
        "slack" => {
            let (token, channel) = rest.split_once('@').ok_or(DsnError::Missing("channel"))?;
            let token = decode(token)?;
            let channel = decode(channel)?;
            if token.is_empty() {
                return Err(DsnError::Missing("API token"));
            }
            if channel.is_empty() {
                return Err(DsnError::Missing("channel"));
            }
            Ok(BackendConfig::Slack { token, channel })
        }
        "udp" => {
            let (host, port) = rest.rsplit_once(':').ok_or(DsnError::Missing("port"))?;
            let host = host.trim_start_matches('[').trim_end_matches(']');
            if host.is_empty() {
                return Err(DsnError::Missing("host"));
            }
            let port = port
                .trim_end_matches('/')
                .parse::<u16>()
                .map_err(|_| DsnError::InvalidPort(port.to_string()))?;
            Ok(BackendConfig::Udp {
                host: host.to_string(),
                port,
            })
        }
        _ => Err(DsnError::UnknownScheme),
    }
}

fn decode(component: &str) -> Result<String, DsnError> {
    urlencoding::decode(component)
        .map(|s| s.into_owned())
        .map_err(|_| DsnError::InvalidEncoding)
}

fn parse_query(query: &str) -> Result<Vec<(String, String)>, DsnError> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Ok((decode(key)?, decode(value)?))
        })
        .collect()
}

/// Request timeout of the HTTP based adapters, from
/// `LOG_SINK_HTTP_TIMEOUT_SECS` (default 10 seconds).
pub fn http_timeout_from_env() -> Duration {
    let secs = env_or(LOG_SINK_HTTP_TIMEOUT_SECS_ENV, "10").parse::<u64>().unwrap_or(10);
    Duration::from_secs(secs)
}

/// Error type returned when building an adapter from configuration.
#[derive(thiserror::Error, Debug)]
pub enum BackendBuildError {
    #[error("{0:?} support is not enabled in this build")]
    FeatureDisabled(BackendKind),

    #[error("no CloudWatch endpoint: set the DSN `endpoint` parameter or {0}")]
    MissingEndpoint(&'static str),

    #[error("failed to create sink client: {0}")]
    Client(#[source] BoxError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// Create a concrete adapter from a [`BackendConfig`].
///
/// This is the main entry point for applications that want to select an
/// adapter using a single DSN string instead of wiring clients manually.
/// `timeout` applies to the HTTP clients; it is ignored by the other kinds.
pub async fn make_sink_from_config(
    cfg: &BackendConfig,
    timeout: Duration,
) -> Result<Box<dyn LogSink>, BackendBuildError> {
    match cfg {
        BackendConfig::CloudWatch { endpoint, group, stream } => {
            #[cfg(feature = "cloudwatch")]
            {
                use crate::cloudwatch::CloudWatchAdapter;
                use crate::cloudwatch_http::HttpLogsClient;

                let endpoint = endpoint
                    .clone()
                    .or_else(|| std::env::var(LOG_SINK_CLOUDWATCH_ENDPOINT_ENV).ok())
                    .filter(|endpoint| !endpoint.is_empty())
                    .ok_or(BackendBuildError::MissingEndpoint(LOG_SINK_CLOUDWATCH_ENDPOINT_ENV))?;
                let client = HttpLogsClient::new(endpoint, timeout).map_err(BackendBuildError::Client)?;
                let adapter = CloudWatchAdapter::connect(Box::new(client), group.as_str(), stream.as_str()).await?;
                Ok(Box::new(adapter) as Box<dyn LogSink>)
            }

            #[cfg(not(feature = "cloudwatch"))]
            {
                let _ = (endpoint, group, stream, timeout);
                Err(BackendBuildError::FeatureDisabled(BackendKind::CloudWatch))
            }
        }
        BackendConfig::Database { url, table, name } => {
            #[cfg(feature = "sqlite")]
            {
                use crate::database::DatabaseAdapter;
                use crate::sqlite::SqliteExecutor;

                let executor = SqliteExecutor::connect(url).await.map_err(BackendBuildError::Client)?;
                let adapter = DatabaseAdapter::new(Box::new(executor.clone()), name.as_str(), table.as_str())?;
                executor.ensure_log_table(table).await.map_err(BackendBuildError::Client)?;
                Ok(Box::new(adapter) as Box<dyn LogSink>)
            }

            #[cfg(not(feature = "sqlite"))]
            {
                let _ = (url, table, name);
                Err(BackendBuildError::FeatureDisabled(BackendKind::Database))
            }
        }
        BackendConfig::Slack { token, channel } => {
            #[cfg(feature = "slack")]
            {
                use crate::slack::{ReqwestConnector, SlackAdapter};

                let adapter = SlackAdapter::new(
                    Box::new(ReqwestConnector::new(timeout)),
                    token.as_str(),
                    channel.as_str(),
                )?;
                Ok(Box::new(adapter) as Box<dyn LogSink>)
            }

            #[cfg(not(feature = "slack"))]
            {
                let _ = (token, channel);
                Err(BackendBuildError::FeatureDisabled(BackendKind::Slack))
            }
        }
        BackendConfig::Udp { host, port } => {
            use crate::udp::{TokioBinder, UdpAdapter};

            let adapter = UdpAdapter::new(Box::new(TokioBinder::default()), host.as_str(), *port);
            Ok(Box::new(adapter) as Box<dyn LogSink>)
        }
    }
}
