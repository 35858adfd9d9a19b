use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::workflows::pipeline::{ApiScope, RefreshPolicy};

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8080/api";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the pipeline tools.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let show_targets = environment != AppEnvironment::Production;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                show_targets,
            },
            pipeline: PipelineConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub show_targets: bool,
}

/// Where the pipeline talks to and how often it polls.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub api_base_url: String,
    pub scope: ApiScope,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub refresh_policy: RefreshPolicy,
    pub api_token: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            scope: ApiScope::default(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            refresh_policy: RefreshPolicy::default(),
            api_token: None,
        }
    }
}

impl PipelineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_base_url = env::var("PIPELINE_API_BASE_URL")
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(api_base_url));
        }

        let scope = match env::var("PIPELINE_SCOPE") {
            Ok(raw) => ApiScope::parse(&raw).ok_or(ConfigError::InvalidScope(raw))?,
            Err(_) => defaults.scope,
        };

        let poll_interval = match env::var("PIPELINE_POLL_INTERVAL_SECS") {
            Ok(raw) => parse_seconds("PIPELINE_POLL_INTERVAL_SECS", &raw)?,
            Err(_) => defaults.poll_interval,
        };

        let request_timeout = match env::var("PIPELINE_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => parse_seconds("PIPELINE_REQUEST_TIMEOUT_SECS", &raw)?,
            Err(_) => defaults.request_timeout,
        };

        let refresh_policy = match env::var("PIPELINE_REFRESH_POLICY") {
            Ok(raw) => RefreshPolicy::parse(&raw).ok_or(ConfigError::InvalidRefreshPolicy(raw))?,
            Err(_) => defaults.refresh_policy,
        };

        let api_token = env::var("PIPELINE_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        Ok(Self {
            api_base_url,
            scope,
            poll_interval,
            request_timeout,
            refresh_policy,
            api_token,
        })
    }
}

fn parse_seconds(variable: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidDuration {
            variable,
            value: raw.to_string(),
        }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a valid u16")]
    InvalidPort,
    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost { source: std::net::AddrParseError },
    #[error("PIPELINE_API_BASE_URL must be an http(s) URL, got '{0}'")]
    InvalidBaseUrl(String),
    #[error("PIPELINE_SCOPE must be one of company, officer, admin; got '{0}'")]
    InvalidScope(String),
    #[error("{variable} must be a positive number of seconds, got '{value}'")]
    InvalidDuration {
        variable: &'static str,
        value: String,
    },
    #[error("PIPELINE_REFRESH_POLICY must be preserve_in_flight or overwrite; got '{0}'")]
    InvalidRefreshPolicy(String),
}
