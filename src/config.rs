//! Gateway configuration with layered loading.
//!
//! Loading precedence (highest wins):
//! 1. `PORT` environment variable
//! 2. Environment variables (`A3S_GATEWAY_*`, nested keys split on `__`)
//! 3. TOML config file (explicit path, or `A3S_GATEWAY_CONFIG`)
//! 4. Built-in defaults
//!
//! The loaded value is immutable for the life of the process.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::cache::EvictionPolicy;
use crate::error::ConfigError;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "A3S_GATEWAY_";

/// Environment variable naming a TOML config file.
pub const CONFIG_FILE_ENV: &str = "A3S_GATEWAY_CONFIG";

/// Top-level gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding `index.html`, `tos.html`, `privacy.html`, `404.html`
    /// and optionally `500.html`.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Search provider shortcut.
    #[serde(default = "default_engine")]
    pub engine: String,

    /// User-Agent for upstream fetches.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upper bound on a single upstream fetch, in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Share one upstream fetch between concurrent misses of the same query.
    #[serde(default)]
    pub dedupe_inflight: bool,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub tunnel: TunnelConfig,
}

/// Credential gate settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Require HTTP Basic credentials on application routes.
    #[serde(default)]
    pub challenge: bool,

    /// Realm announced in the challenge.
    #[serde(default)]
    pub realm: Option<String>,

    /// Username to secret.
    ///
    /// Names set through `A3S_GATEWAY_AUTH__USERS__*` are lowercased; use the
    /// TOML file for mixed-case usernames.
    #[serde(default)]
    pub users: BTreeMap<String, String>,
}

/// Result cache settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached pages; unset means unbounded.
    #[serde(default)]
    pub max_entries: Option<usize>,

    /// Interval of the expired-entry sweep; unset disables the sweep.
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

/// Tunnel namespace settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Path prefix reserved for tunneled traffic.
    #[serde(default = "default_tunnel_prefix")]
    pub prefix: String,

    /// Backend that tunneled requests are forwarded to.
    #[serde(default)]
    pub upstream: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_engine() -> String {
    "duckduckgo".into()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; a3s-gateway/0.1)".into()
}

fn default_fetch_timeout_secs() -> u64 {
    15
}

fn default_tunnel_prefix() -> String {
    "/fq/".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            engine: default_engine(),
            user_agent: default_user_agent(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            dedupe_inflight: false,
            auth: AuthConfig::default(),
            cache: CacheConfig::default(),
            tunnel: TunnelConfig::default(),
        }
    }
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            prefix: default_tunnel_prefix(),
            upstream: None,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// `file` takes priority over `A3S_GATEWAY_CONFIG`. A missing file is an
    /// error only when it was named explicitly.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let file = file
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from));
        if let Some(path) = file {
            if !path.exists() {
                return Err(ConfigError::LoadFailed(format!(
                    "config file {} not found",
                    path.display()
                )));
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = figment
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["CONFIG"]).split("__"))
            .merge(Env::raw().only(&["PORT"]));

        let config: Self = figment
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values after loading.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::invalid("port", "must not be 0"));
        }

        if crate::engines::by_shortcut(&self.engine).is_none() {
            return Err(ConfigError::invalid(
                "engine",
                format!("unknown engine {:?}", self.engine),
            ));
        }

        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::invalid("fetch_timeout_secs", "must be greater than 0"));
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::invalid("user_agent", "must not be empty"));
        }

        if self.cache.max_entries == Some(0) {
            return Err(ConfigError::invalid("cache.max_entries", "must be greater than 0"));
        }

        if self.cache.sweep_interval_secs == Some(0) {
            return Err(ConfigError::invalid(
                "cache.sweep_interval_secs",
                "must be greater than 0",
            ));
        }

        let prefix = &self.tunnel.prefix;
        if prefix.len() < 2 || !prefix.starts_with('/') || !prefix.ends_with('/') {
            return Err(ConfigError::invalid(
                "tunnel.prefix",
                "must start and end with '/' and name a directory",
            ));
        }
        if prefix == crate::query::SEARCH_PREFIX {
            return Err(ConfigError::invalid("tunnel.prefix", "collides with the search route"));
        }

        if let Some(upstream) = &self.tunnel.upstream {
            let url = url::Url::parse(upstream)
                .map_err(|e| ConfigError::invalid("tunnel.upstream", e.to_string()))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::invalid("tunnel.upstream", "must be an http(s) URL"));
            }
        }

        if self.auth.challenge && self.auth.users.is_empty() {
            tracing::warn!("Credential challenge enabled with no users; every request will be refused");
        }

        Ok(())
    }

    /// Upstream fetch timeout as a Duration.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Eviction policy for the result cache.
    pub fn eviction_policy(&self) -> EvictionPolicy {
        EvictionPolicy::from_max_entries(self.cache.max_entries)
    }

    /// Sweep interval for the result cache, if any.
    pub fn sweep_interval(&self) -> Option<Duration> {
        self.cache.sweep_interval_secs.map(Duration::from_secs)
    }

    /// Address to bind, as `host:port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
