//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `STACKSAFE_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::CacheConfig;
use crate::interactions::EngineConfig;
use crate::maintenance::MaintenanceConfig;
use crate::router::RouterConfig;

/// Model used for delegated analysis when `STACKSAFE_ANALYSIS_MODEL` is not set.
pub const DEFAULT_ANALYSIS_MODEL: &str = "gpt-4o-mini";

/// Server configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `STACKSAFE_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Directory for the persisted response cache. Default: `./.data`.
    pub storage_path: PathBuf,

    /// Persist the response cache under `storage_path`. Default: `false`.
    pub persist_cache: bool,

    /// Model name handed to the analysis client.
    pub analysis_model: String,

    /// Base URL of the remote rule tables. Built-in tables only when unset.
    pub rules_url: Option<String>,

    /// Start in offline mode (never call the analyzer).
    pub offline: bool,

    pub cache: CacheConfig,
    pub router: RouterConfig,
    pub engine: EngineConfig,
    pub maintenance: MaintenanceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            storage_path: PathBuf::from("./.data"),
            persist_cache: false,
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            rules_url: None,
            offline: false,
            cache: CacheConfig::default(),
            router: RouterConfig::default(),
            engine: EngineConfig::default(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "STACKSAFE_PORT";
    const ENV_BIND_ADDR: &'static str = "STACKSAFE_BIND_ADDR";
    const ENV_STORAGE_PATH: &'static str = "STACKSAFE_STORAGE_PATH";
    const ENV_PERSIST_CACHE: &'static str = "STACKSAFE_PERSIST_CACHE";
    const ENV_CACHE_MAX_BYTES: &'static str = "STACKSAFE_CACHE_MAX_BYTES";
    const ENV_CACHE_TTL_SECS: &'static str = "STACKSAFE_CACHE_TTL_SECS";
    const ENV_ANALYSIS_MODEL: &'static str = "STACKSAFE_ANALYSIS_MODEL";
    const ENV_ANALYSIS_TIMEOUT_MS: &'static str = "STACKSAFE_ANALYSIS_TIMEOUT_MS";
    const ENV_RULES_URL: &'static str = "STACKSAFE_RULES_URL";
    const ENV_MAINTENANCE_INTERVAL_SECS: &'static str = "STACKSAFE_MAINTENANCE_INTERVAL_SECS";
    const ENV_OFFLINE: &'static str = "STACKSAFE_OFFLINE";

    /// Every variable [`from_env`](Self::from_env) reads.
    pub const ENV_VARS: [&'static str; 11] = [
        Self::ENV_PORT,
        Self::ENV_BIND_ADDR,
        Self::ENV_STORAGE_PATH,
        Self::ENV_PERSIST_CACHE,
        Self::ENV_CACHE_MAX_BYTES,
        Self::ENV_CACHE_TTL_SECS,
        Self::ENV_ANALYSIS_MODEL,
        Self::ENV_ANALYSIS_TIMEOUT_MS,
        Self::ENV_RULES_URL,
        Self::ENV_MAINTENANCE_INTERVAL_SECS,
        Self::ENV_OFFLINE,
    ];

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let storage_path = Self::parse_path_from_env(Self::ENV_STORAGE_PATH, defaults.storage_path);
        let persist_cache = Self::parse_bool_from_env(Self::ENV_PERSIST_CACHE, defaults.persist_cache);
        let analysis_model =
            Self::parse_string_from_env(Self::ENV_ANALYSIS_MODEL, defaults.analysis_model);
        let rules_url = Self::parse_optional_string_from_env(Self::ENV_RULES_URL);
        let offline = Self::parse_bool_from_env(Self::ENV_OFFLINE, defaults.offline);

        let mut cache = defaults.cache;
        if let Some(bytes) = Self::parse_u64_from_env(Self::ENV_CACHE_MAX_BYTES)? {
            cache = cache.max_size_bytes(bytes as usize);
        }
        if let Some(secs) = Self::parse_u64_from_env(Self::ENV_CACHE_TTL_SECS)? {
            cache = cache.default_ttl(Duration::from_secs(secs));
        }

        let mut router = defaults.router;
        if let Some(ms) = Self::parse_u64_from_env(Self::ENV_ANALYSIS_TIMEOUT_MS)? {
            router = router.analysis_timeout(Duration::from_millis(ms));
        }

        let mut maintenance = defaults.maintenance;
        if let Some(secs) = Self::parse_u64_from_env(Self::ENV_MAINTENANCE_INTERVAL_SECS)? {
            maintenance = if secs == 0 {
                maintenance.disabled()
            } else {
                maintenance.interval(Duration::from_secs(secs))
            };
        }

        Ok(Self {
            port,
            bind_addr,
            storage_path,
            persist_cache,
            analysis_model,
            rules_url,
            offline,
            cache,
            router,
            engine: defaults.engine,
            maintenance,
        })
    }

    /// Validates paths and sub-configs (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_path.exists() && !self.storage_path.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.storage_path.clone(),
            });
        }

        self.cache.validate().map_err(|e| ConfigError::Invalid {
            section: "cache",
            reason: e.to_string(),
        })?;

        self.maintenance.validate().map_err(|e| ConfigError::Invalid {
            section: "maintenance",
            reason: e.to_string(),
        })?;

        if self.router.analysis_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                section: "router",
                reason: "analysis timeout must be > 0".to_string(),
            });
        }

        if self.analysis_model.trim().is_empty() {
            return Err(ConfigError::Invalid {
                section: "router",
                reason: "analysis model must not be empty".to_string(),
            });
        }

        if let Some(url) = &self.rules_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid {
                section: "rules",
                reason: format!("rules URL must be http(s): {url}"),
            });
        }

        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(default)
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_bool_from_env(var_name: &str, default: bool) -> bool {
        env::var(var_name)
            .map(|s| {
                let s = s.trim().to_ascii_lowercase();
                !s.is_empty() && s != "false" && s != "0" && s != "no"
            })
            .unwrap_or(default)
    }

    fn parse_u64_from_env(var_name: &'static str) -> Result<Option<u64>, ConfigError> {
        let Ok(value) = env::var(var_name) else {
            return Ok(None);
        };
        match value.trim().parse::<u64>() {
            Ok(n) => Ok(Some(n)),
            Err(_) => Err(ConfigError::InvalidNumber {
                name: var_name,
                value,
            }),
        }
    }
}
