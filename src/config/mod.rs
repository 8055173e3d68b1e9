use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

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

/// How post-commit side effects are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffectMode {
    /// Queued onto a background worker; the request returns before they run.
    Deferred,
    /// Run on the request path; failures are returned to the caller as warnings.
    Inline,
}

impl SideEffectMode {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "deferred" | "async" => Ok(Self::Deferred),
            "inline" | "sync" => Ok(Self::Inline),
            _ => Err(ConfigError::InvalidSideEffectMode {
                value: value.to_string(),
            }),
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub events: EventConfig,
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

        let upload_dir = env::var("APP_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));

        let broadcast_capacity = positive_capacity("APP_BROADCAST_CAPACITY", 64)?;
        let effect_queue_capacity = positive_capacity("APP_EFFECT_QUEUE_CAPACITY", 256)?;

        let side_effects = SideEffectMode::parse(
            &env::var("APP_SIDE_EFFECTS").unwrap_or_else(|_| "deferred".to_string()),
        )?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage: StorageConfig { upload_dir },
            events: EventConfig {
                broadcast_capacity,
                effect_queue_capacity,
                side_effects,
            },
        })
    }
}

fn positive_capacity(variable: &'static str, default: usize) -> Result<usize, ConfigError> {
    let Ok(raw) = env::var(variable) else {
        return Ok(default);
    };
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|capacity| *capacity > 0)
        .ok_or(ConfigError::InvalidCapacity {
            variable,
            value: raw,
        })
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where uploaded report images are written.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
}

/// Realtime fan-out and side-effect execution settings.
#[derive(Debug, Clone)]
pub struct EventConfig {
    pub broadcast_capacity: usize,
    /// Batches the deferred worker may have waiting before new ones are dropped.
    pub effect_queue_capacity: usize,
    pub side_effects: SideEffectMode,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidCapacity {
        variable: &'static str,
        value: String,
    },
    InvalidSideEffectMode { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidCapacity { variable, value } => {
                write!(f, "{variable} must be a positive integer, got '{value}'")
            }
            ConfigError::InvalidSideEffectMode { value } => write!(
                f,
                "APP_SIDE_EFFECTS must be 'deferred' or 'inline', got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidCapacity { .. }
            | ConfigError::InvalidSideEffectMode { .. } => None,
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
            "APP_UPLOAD_DIR",
            "APP_BROADCAST_CAPACITY",
            "APP_EFFECT_QUEUE_CAPACITY",
            "APP_SIDE_EFFECTS",
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
        assert_eq!(config.storage.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.events.broadcast_capacity, 64);
        assert_eq!(config.events.effect_queue_capacity, 256);
        assert_eq!(config.events.side_effects, SideEffectMode::Deferred);
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
    fn rejects_zero_broadcast_capacity() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_BROADCAST_CAPACITY", "0");
        match AppConfig::load() {
            Err(ConfigError::InvalidCapacity { variable, value }) => {
                assert_eq!(variable, "APP_BROADCAST_CAPACITY");
                assert_eq!(value, "0");
            }
            other => panic!("expected capacity error, got {other:?}"),
        }

        reset_env();
        env::set_var("APP_EFFECT_QUEUE_CAPACITY", "lots");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidCapacity {
                variable: "APP_EFFECT_QUEUE_CAPACITY",
                ..
            })
        ));
        reset_env();
    }

    #[test]
    fn side_effect_mode_is_configurable() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_SIDE_EFFECTS", "Inline");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.events.side_effects, SideEffectMode::Inline);

        env::set_var("APP_SIDE_EFFECTS", "eventually");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidSideEffectMode { .. })
        ));
        reset_env();
    }
}
