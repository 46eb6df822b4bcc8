use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use relay_core::polling::{PollConfig, DEFAULT_ASSET_BASE_URL};
use relay_core::rate_window::RateWindow;
use relay_upstream::api::DEFAULT_BASE_URL;

/// Errors raised while reading configuration. All of them are fatal at
/// startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("SSL_ENABLED is true but {0} is not set")]
    MissingTlsPath(&'static str),
}

/// Origins allowed by the CORS layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CorsOrigins {
    /// `*`: any origin, without credentials.
    Any,
    List(Vec<HeaderValue>),
}

/// PEM files used when serving over TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub key_path: PathBuf,
    pub cert_path: PathBuf,
}

/// Upstream endpoints, credential files, and per-deployment values.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub asset_base_url: String,
    /// File holding the static bearer credential.
    pub authorization_file: PathBuf,
    /// File holding the session cookie.
    pub cookie_file: PathBuf,
    pub location: String,
    pub external_photo_url: Option<String>,
}

/// Fixed-window request budget per client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientRateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for running against the public
/// upstream; only the credential files must exist.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    pub cors_origins: CorsOrigins,
    /// HTTP request timeout in seconds (default: `300`).
    pub request_timeout_secs: u64,
    /// Route jobs through the rate-limited FIFO queue.
    pub use_queue: bool,
    /// Upstream rate window in seconds, before the safety margin.
    pub wait_time_secs: u64,
    /// `Some` when `SSL_ENABLED=true`.
    pub tls: Option<TlsConfig>,
    /// External broker address. Accepted for compatibility; the queue is
    /// always in-process.
    pub queue_broker_url: Option<String>,
    pub upstream: UpstreamConfig,
    pub poll: PollConfig,
    pub client_rate_limit: ClientRateLimitConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                                              |
    /// |---------------------------------|------------------------------------------------------|
    /// | `HOST`                          | `0.0.0.0`                                            |
    /// | `PORT`                          | `3000`                                               |
    /// | `ORIGIN`                        | `*`                                                  |
    /// | `REQUEST_TIMEOUT_SECS`          | `300`                                                |
    /// | `USE_QUEUE`                     | `false`                                              |
    /// | `WAIT_TIME_SECONDS`             | `0`                                                  |
    /// | `SSL_ENABLED`                   | `false`                                              |
    /// | `SSL_KEY_PATH`                  | (required with SSL)                                  |
    /// | `SSL_CERT_PATH`                 | (required with SSL)                                  |
    /// | `QUEUE_BROKER_URL`/`REDIS_URL`  | (unset)                                              |
    /// | `UPSTREAM_BASE_URL`             | `https://ideogram.ai`                                |
    /// | `ASSET_BASE_URL`                | `https://ideogram.ai/assets/image/lossless/response` |
    /// | `AUTHORIZATION_FILE`            | `authorization.txt`                                  |
    /// | `COOKIE_FILE`                   | `cookie.txt`                                         |
    /// | `LOCATION`                      | (empty)                                              |
    /// | `EXTERNAL_PHOTO_URL`            | (unset)                                              |
    /// | `POLL_INTERVAL_MS`              | `2000`                                               |
    /// | `GENERATION_TIMEOUT_SECS`       | `40`                                                 |
    /// | `CLIENT_RATE_LIMIT_MAX`         | `100`                                                |
    /// | `CLIENT_RATE_LIMIT_WINDOW_SECS` | `900`                                                |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".into());
        if IpAddr::from_str(&host).is_err() {
            return Err(ConfigError::Invalid {
                var: "HOST",
                value: host,
                reason: "not an IP address".into(),
            });
        }

        let port: u16 = parse_or("PORT", get("PORT"), 3000)?;
        let cors_origins = parse_origins(get("ORIGIN").as_deref().unwrap_or("*"))?;
        let request_timeout_secs =
            parse_or("REQUEST_TIMEOUT_SECS", get("REQUEST_TIMEOUT_SECS"), 300)?;

        let use_queue = get("USE_QUEUE").as_deref() == Some("true");
        let wait_time_secs = parse_or("WAIT_TIME_SECONDS", get("WAIT_TIME_SECONDS"), 0)?;

        let tls = if get("SSL_ENABLED").as_deref() == Some("true") {
            Some(TlsConfig {
                key_path: get("SSL_KEY_PATH")
                    .map(PathBuf::from)
                    .ok_or(ConfigError::MissingTlsPath("SSL_KEY_PATH"))?,
                cert_path: get("SSL_CERT_PATH")
                    .map(PathBuf::from)
                    .ok_or(ConfigError::MissingTlsPath("SSL_CERT_PATH"))?,
            })
        } else {
            None
        };

        let queue_broker_url = get("QUEUE_BROKER_URL").or_else(|| get("REDIS_URL"));

        let upstream = UpstreamConfig {
            base_url: get("UPSTREAM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            asset_base_url: get("ASSET_BASE_URL").unwrap_or_else(|| DEFAULT_ASSET_BASE_URL.into()),
            authorization_file: get("AUTHORIZATION_FILE")
                .unwrap_or_else(|| "authorization.txt".into())
                .into(),
            cookie_file: get("COOKIE_FILE")
                .unwrap_or_else(|| "cookie.txt".into())
                .into(),
            location: get("LOCATION").unwrap_or_default(),
            external_photo_url: get("EXTERNAL_PHOTO_URL"),
        };

        let defaults = PollConfig::default();
        let interval_ms = parse_or(
            "POLL_INTERVAL_MS",
            get("POLL_INTERVAL_MS"),
            defaults.interval.as_millis() as u64,
        )?;
        let deadline_secs = parse_or(
            "GENERATION_TIMEOUT_SECS",
            get("GENERATION_TIMEOUT_SECS"),
            defaults.deadline.as_secs(),
        )?;
        if interval_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "POLL_INTERVAL_MS",
                value: "0".into(),
                reason: "must be greater than zero".into(),
            });
        }
        let poll = PollConfig {
            interval: Duration::from_millis(interval_ms),
            deadline: Duration::from_secs(deadline_secs),
        };

        let client_rate_limit = ClientRateLimitConfig {
            max_requests: parse_or("CLIENT_RATE_LIMIT_MAX", get("CLIENT_RATE_LIMIT_MAX"), 100)?,
            window: Duration::from_secs(parse_or(
                "CLIENT_RATE_LIMIT_WINDOW_SECS",
                get("CLIENT_RATE_LIMIT_WINDOW_SECS"),
                900,
            )?),
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            use_queue,
            wait_time_secs,
            tls,
            queue_broker_url,
            upstream,
            poll,
            client_rate_limit,
        })
    }

    /// Address to bind. `host` is validated at load time.
    pub fn socket_addr(&self) -> SocketAddr {
        let ip = self.host.parse().unwrap_or(IpAddr::from([0, 0, 0, 0]));
        SocketAddr::new(ip, self.port)
    }

    /// Dispatch spacing for the serialized queue.
    pub fn rate_window(&self) -> RateWindow {
        RateWindow::from_wait_secs(self.wait_time_secs)
    }

    pub fn ssl_enabled(&self) -> bool {
        self.tls.is_some()
    }
}

fn parse_or<T>(var: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value: raw,
        }),
    }
}

fn parse_origins(raw: &str) -> Result<CorsOrigins, ConfigError> {
    let origins: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if origins.is_empty() || origins.contains(&"*") {
        return Ok(CorsOrigins::Any);
    }

    origins
        .into_iter()
        .map(|o| {
            HeaderValue::from_str(o).map_err(|e| ConfigError::Invalid {
                var: "ORIGIN",
                value: o.to_string(),
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(CorsOrigins::List)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_any_variables() {
        let config = load(&[]).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.cors_origins, CorsOrigins::Any);
        assert_eq!(config.request_timeout_secs, 300);
        assert!(!config.use_queue);
        assert_eq!(config.wait_time_secs, 0);
        assert!(config.tls.is_none());
        assert!(config.queue_broker_url.is_none());
        assert_eq!(config.upstream.base_url, "https://ideogram.ai");
        assert_eq!(config.upstream.asset_base_url, DEFAULT_ASSET_BASE_URL);
        assert_eq!(config.upstream.authorization_file, PathBuf::from("authorization.txt"));
        assert_eq!(config.upstream.cookie_file, PathBuf::from("cookie.txt"));
        assert_eq!(config.upstream.external_photo_url, None);
        assert_eq!(config.poll, PollConfig::default());
        assert_eq!(config.client_rate_limit.max_requests, 100);
        assert_eq!(config.client_rate_limit.window, Duration::from_secs(900));
        assert_eq!(config.socket_addr().port(), 3000);
    }

    #[test]
    fn queue_only_enabled_by_literal_true() {
        assert!(load(&[("USE_QUEUE", "true")]).unwrap().use_queue);
        assert!(!load(&[("USE_QUEUE", "TRUE")]).unwrap().use_queue);
        assert!(!load(&[("USE_QUEUE", "1")]).unwrap().use_queue);
    }

    #[test]
    fn rate_window_includes_margin() {
        let config = load(&[("WAIT_TIME_SECONDS", "10")]).unwrap();
        assert_eq!(config.rate_window().spacing(), Duration::from_secs(11));
    }

    #[test]
    fn ssl_requires_both_paths() {
        assert_matches!(
            load(&[("SSL_ENABLED", "true"), ("SSL_CERT_PATH", "cert.pem")]),
            Err(ConfigError::MissingTlsPath("SSL_KEY_PATH"))
        );
        assert_matches!(
            load(&[("SSL_ENABLED", "true"), ("SSL_KEY_PATH", "key.pem")]),
            Err(ConfigError::MissingTlsPath("SSL_CERT_PATH"))
        );

        let config = load(&[
            ("SSL_ENABLED", "true"),
            ("SSL_KEY_PATH", "key.pem"),
            ("SSL_CERT_PATH", "cert.pem"),
        ])
        .unwrap();
        assert!(config.ssl_enabled());
        assert_eq!(config.tls.unwrap().cert_path, PathBuf::from("cert.pem"));
    }

    #[test]
    fn ssl_paths_ignored_when_disabled() {
        let config = load(&[("SSL_KEY_PATH", "key.pem")]).unwrap();
        assert!(!config.ssl_enabled());
    }

    #[test]
    fn redis_url_is_broker_alias() {
        let config = load(&[("REDIS_URL", "redis://localhost:6379")]).unwrap();
        assert_eq!(config.queue_broker_url.as_deref(), Some("redis://localhost:6379"));
    }

    #[test]
    fn explicit_origins_are_parsed() {
        let config = load(&[("ORIGIN", "https://a.example, https://b.example")]).unwrap();
        assert_matches!(config.cors_origins, CorsOrigins::List(ref list) if list.len() == 2);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        assert_matches!(
            load(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { var: "PORT", .. })
        );
        assert_matches!(
            load(&[("POLL_INTERVAL_MS", "0")]),
            Err(ConfigError::Invalid { var: "POLL_INTERVAL_MS", .. })
        );
    }

    #[test]
    fn invalid_host_is_rejected() {
        assert_matches!(
            load(&[("HOST", "not a host")]),
            Err(ConfigError::Invalid { var: "HOST", .. })
        );
    }

    #[test]
    fn poll_settings_override_defaults() {
        let config =
            load(&[("POLL_INTERVAL_MS", "500"), ("GENERATION_TIMEOUT_SECS", "90")]).unwrap();
        assert_eq!(config.poll.interval, Duration::from_millis(500));
        assert_eq!(config.poll.deadline, Duration::from_secs(90));
    }
}
