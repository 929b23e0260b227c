use rust_decimal::Decimal;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub review: ReviewConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let timeout_ms = env::var("APP_VERIFICATION_TIMEOUT_MS")
            .unwrap_or_else(|_| "10000".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidVerificationTimeout)?;

        let recent_applications = env::var("APP_RECENT_APPLICATIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidRecentLimit)?;

        let auto_approve_confidence = match env::var("APP_AUTO_APPROVE_CONFIDENCE") {
            Ok(raw) if !raw.trim().is_empty() => {
                let value = Decimal::from_str(raw.trim())
                    .map_err(|_| ConfigError::InvalidConfidence { value: raw.clone() })?;
                if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
                    return Err(ConfigError::InvalidConfidence { value: raw });
                }
                Some(value)
            }
            _ => None,
        };

        let reviewer_tokens = env::var("APP_REVIEWER_TOKENS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                include_targets: environment != AppEnvironment::Production,
                ansi: false,
            },
            review: ReviewConfig {
                verification_timeout: Duration::from_millis(timeout_ms),
                recent_applications,
                auto_approve_confidence,
                reviewer_tokens,
            },
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
    pub include_targets: bool,
    pub ansi: bool,
}

/// Knobs for the review workflow: collaborator timeouts, dashboard sizes and routing.
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    pub verification_timeout: Duration,
    pub recent_applications: usize,
    /// When set, complete verifications at or above this confidence skip manual review.
    pub auto_approve_confidence: Option<Decimal>,
    pub reviewer_tokens: Vec<String>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            verification_timeout: Duration::from_secs(10),
            recent_applications: 5,
            auto_approve_confidence: None,
            reviewer_tokens: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidVerificationTimeout,
    InvalidRecentLimit,
    InvalidConfidence { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidVerificationTimeout => {
                write!(f, "APP_VERIFICATION_TIMEOUT_MS must be a whole number of milliseconds")
            }
            ConfigError::InvalidRecentLimit => {
                write!(f, "APP_RECENT_APPLICATIONS must be a non-negative integer")
            }
            ConfigError::InvalidConfidence { value } => write!(
                f,
                "APP_AUTO_APPROVE_CONFIDENCE must be a percentage between 0 and 100, got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidVerificationTimeout
            | ConfigError::InvalidRecentLimit
            | ConfigError::InvalidConfidence { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_VERIFICATION_TIMEOUT_MS",
            "APP_RECENT_APPLICATIONS",
            "APP_AUTO_APPROVE_CONFIDENCE",
            "APP_REVIEWER_TOKENS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.review.verification_timeout, Duration::from_secs(10));
        assert_eq!(config.review.recent_applications, 5);
        assert!(config.review.auto_approve_confidence.is_none());
        assert!(config.review.reviewer_tokens.is_empty());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn parses_reviewer_tokens_and_confidence() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_REVIEWER_TOKENS", " alpha, ,beta ");
        env::set_var("APP_AUTO_APPROVE_CONFIDENCE", "92.5");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.review.reviewer_tokens, vec!["alpha", "beta"]);
        assert_eq!(
            config.review.auto_approve_confidence,
            Some(Decimal::new(925, 1))
        );
        reset_env();
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_AUTO_APPROVE_CONFIDENCE", "140");
        match AppConfig::load() {
            Err(ConfigError::InvalidConfidence { value }) => assert_eq!(value, "140"),
            other => panic!("expected confidence error, got {other:?}"),
        }
        reset_env();
    }
}
