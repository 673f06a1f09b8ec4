//! Declarative configuration loading from YAML, TOML, and environment variables.
//!
//! File formats deserialize into the serde mirror [`FileConfig`], which is
//! then converted into [`ClientConfig`](crate::config::ClientConfig) through
//! the builder API, so both paths share the same validation.
//!
//! # Example YAML
//!
//! ```yaml
//! network:
//!   provider-url: "failover:round-robin:ejbd://10.0.0.1:4201,ejbd://10.0.0.2:4201"
//!   connect-timeout-ms: 5000
//! async-pool:
//!   core-threads: 4
//!   max-threads: 16
//!   queue-size: 1024
//! serialization:
//!   include: ["com.acme.*", "java.lang.*"]
//!   exclude: ["com.acme.internal.*"]
//! security:
//!   username: alice
//!   password: secret
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{ClientConfig, ClientConfigBuilder, ConfigError};

/// Top-level file-based configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileConfig {
    /// Network configuration.
    pub network: Option<FileNetworkConfig>,
    /// Asynchronous pool configuration.
    pub async_pool: Option<FileAsyncPoolConfig>,
    /// Deserialization guard configuration.
    pub serialization: Option<FileSerializationConfig>,
    /// Security configuration.
    pub security: Option<FileSecurityConfig>,
}

/// File-based network configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileNetworkConfig {
    /// Provider URL.
    pub provider_url: Option<String>,
    /// Default connection strategy name.
    pub connection_strategy: Option<String>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Read timeout in milliseconds.
    pub read_timeout_ms: Option<u64>,
    /// Maximum frame length in bytes.
    pub max_frame_length: Option<usize>,
}

/// File-based asynchronous pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileAsyncPoolConfig {
    /// Always-running workers.
    pub core_threads: Option<usize>,
    /// Upper bound of workers.
    pub max_threads: Option<usize>,
    /// Queue capacity.
    pub queue_size: Option<usize>,
    /// Re-enqueue wait in milliseconds.
    pub offer_timeout_ms: Option<u64>,
}

/// File-based deserialization guard configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileSerializationConfig {
    /// Include patterns.
    pub include: Option<Vec<String>>,
    /// Exclude patterns.
    pub exclude: Option<Vec<String>>,
    /// Maximum object graph depth.
    pub max_depth: Option<usize>,
}

/// File-based security configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileSecurityConfig {
    /// User name.
    pub username: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Security realm.
    pub realm: Option<String>,
    /// Identity resolver name.
    pub identity_resolver: Option<String>,
}

impl TryFrom<FileConfig> for ClientConfig {
    type Error = ConfigError;

    fn try_from(file: FileConfig) -> Result<Self, Self::Error> {
        let mut builder = ClientConfigBuilder::new();

        if let Some(net) = file.network {
            builder = builder.network(|mut n| {
                if let Some(url) = net.provider_url {
                    n = n.provider_url(url);
                }
                if let Some(strategy) = net.connection_strategy {
                    n = n.connection_strategy(strategy);
                }
                if let Some(ms) = net.connect_timeout_ms {
                    n = n.connect_timeout(Duration::from_millis(ms));
                }
                if let Some(ms) = net.read_timeout_ms {
                    n = n.read_timeout(Duration::from_millis(ms));
                }
                if let Some(len) = net.max_frame_length {
                    n = n.max_frame_length(len);
                }
                n
            });
        }

        if let Some(pool) = file.async_pool {
            builder = builder.async_pool(|mut p| {
                if let Some(n) = pool.core_threads {
                    p = p.core_threads(n);
                }
                if let Some(n) = pool.max_threads {
                    p = p.max_threads(n);
                }
                if let Some(n) = pool.queue_size {
                    p = p.queue_size(n);
                }
                if let Some(ms) = pool.offer_timeout_ms {
                    p = p.offer_timeout(Duration::from_millis(ms));
                }
                p
            });
        }

        if let Some(ser) = file.serialization {
            builder = builder.serialization(|mut s| {
                for pattern in ser.include.unwrap_or_default() {
                    s = s.include(pattern);
                }
                for pattern in ser.exclude.unwrap_or_default() {
                    s = s.exclude(pattern);
                }
                if let Some(depth) = ser.max_depth {
                    s = s.max_depth(depth);
                }
                s
            });
        }

        if let Some(sec) = file.security {
            builder = builder.security(|mut s| {
                if let Some(user) = sec.username {
                    s = s.username(user);
                }
                if let Some(password) = sec.password {
                    s = s.password(password);
                }
                if let Some(realm) = sec.realm {
                    s = s.realm(realm);
                }
                if let Some(resolver) = sec.identity_resolver {
                    s = s.identity_resolver(resolver);
                }
                s
            });
        }

        builder.build()
    }
}

fn env_millis(name: &str) -> Result<Option<u64>, ConfigError> {
    env_parse::<u64>(name)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::new(format!("invalid value for {}: {}", name, val))),
        Err(_) => Ok(None),
    }
}

fn split_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl ClientConfig {
    /// Loads configuration from a YAML file.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_yaml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("failed to read YAML config file: {e}")))?;
        let file_config: FileConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("failed to parse YAML config: {e}")))?;
        file_config.try_into()
    }

    /// Loads configuration from a TOML file.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("failed to read TOML config file: {e}")))?;
        let file_config: FileConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("failed to parse TOML config: {e}")))?;
        file_config.try_into()
    }

    /// Loads configuration from environment variables.
    ///
    /// | Variable | Maps to |
    /// |----------|---------|
    /// | `EJB_PROVIDER_URL` | provider URL |
    /// | `EJB_CONNECTION_STRATEGY` | default connection strategy |
    /// | `EJB_CONNECT_TIMEOUT_MS` | connect timeout |
    /// | `EJB_READ_TIMEOUT_MS` | read timeout |
    /// | `EJB_IDENTITY_RESOLVER` | identity resolver name |
    /// | `EJB_ASYNC_CORE_THREADS` | async pool core workers |
    /// | `EJB_ASYNC_MAX_THREADS` | async pool max workers |
    /// | `EJB_ASYNC_QUEUE_SIZE` | async pool queue capacity |
    /// | `EJB_ASYNC_OFFER_TIMEOUT_MS` | async pool re-enqueue wait |
    /// | `EJB_SERIALIZATION_INCLUDE` | comma-separated include patterns |
    /// | `EJB_SERIALIZATION_EXCLUDE` | comma-separated exclude patterns |
    /// | `EJB_USERNAME` / `EJB_PASSWORD` / `EJB_REALM` | login |
    ///
    /// Malformed numbers are reported instead of being ignored.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut file_config = FileConfig::default();

        {
            let net = file_config.network.get_or_insert_with(Default::default);
            net.provider_url = std::env::var("EJB_PROVIDER_URL").ok();
            net.connection_strategy = std::env::var("EJB_CONNECTION_STRATEGY").ok();
            net.connect_timeout_ms = env_millis("EJB_CONNECT_TIMEOUT_MS")?;
            net.read_timeout_ms = env_millis("EJB_READ_TIMEOUT_MS")?;
        }

        {
            let pool = file_config.async_pool.get_or_insert_with(Default::default);
            pool.core_threads = env_parse("EJB_ASYNC_CORE_THREADS")?;
            pool.max_threads = env_parse("EJB_ASYNC_MAX_THREADS")?;
            pool.queue_size = env_parse("EJB_ASYNC_QUEUE_SIZE")?;
            pool.offer_timeout_ms = env_millis("EJB_ASYNC_OFFER_TIMEOUT_MS")?;
        }

        {
            let ser = file_config.serialization.get_or_insert_with(Default::default);
            ser.include = std::env::var("EJB_SERIALIZATION_INCLUDE")
                .ok()
                .map(|v| split_list(&v));
            ser.exclude = std::env::var("EJB_SERIALIZATION_EXCLUDE")
                .ok()
                .map(|v| split_list(&v));
        }

        {
            let sec = file_config.security.get_or_insert_with(Default::default);
            sec.username = std::env::var("EJB_USERNAME").ok();
            sec.password = std::env::var("EJB_PASSWORD").ok();
            sec.realm = std::env::var("EJB_REALM").ok();
            sec.identity_resolver = std::env::var("EJB_IDENTITY_RESOLVER").ok();
        }

        file_config.try_into()
    }
}

/// Loads a configuration file, picking the format by extension.
///
/// Supports `.yaml`, `.yml`, and `.toml`. Requires the `config-file` feature.
#[cfg(feature = "config-file")]
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> Result<ClientConfig, ConfigError> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => ClientConfig::from_yaml(path),
        Some("toml") => ClientConfig::from_toml(path),
        Some(ext) => Err(ConfigError::new(format!(
            "unsupported config file extension: .{ext} (expected .yaml, .yml, or .toml)"
        ))),
        None => Err(ConfigError::new(
            "config file has no extension; expected .yaml, .yml, or .toml",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_config_defaults_produce_valid_client_config() {
        let config: ClientConfig = FileConfig::default().try_into().unwrap();
        assert_eq!(config.network().connection_strategy(), "sticky");
    }

    #[test]
    fn test_file_config_with_network() {
        let file_config = FileConfig {
            network: Some(FileNetworkConfig {
                provider_url: Some("ejbd://127.0.0.1:4201".to_string()),
                connection_strategy: Some("random".to_string()),
                connect_timeout_ms: Some(2_000),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config: ClientConfig = file_config.try_into().unwrap();
        assert_eq!(config.network().provider_url(), Some("ejbd://127.0.0.1:4201"));
        assert_eq!(config.network().connection_strategy(), "random");
        assert_eq!(config.network().connect_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_file_config_with_pool_and_filter() {
        let file_config = FileConfig {
            async_pool: Some(FileAsyncPoolConfig {
                core_threads: Some(2),
                max_threads: Some(4),
                queue_size: Some(8),
                offer_timeout_ms: Some(5),
            }),
            serialization: Some(FileSerializationConfig {
                exclude: Some(vec!["org.evil.*".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config: ClientConfig = file_config.try_into().unwrap();
        assert_eq!(config.async_pool().queue_size(), 8);
        assert_eq!(config.async_pool().offer_timeout(), Duration::from_millis(5));
        assert!(!config.serialization().filter().accepts("org.evil.Gadget"));
    }

    #[test]
    fn test_file_config_invalid_pool_rejected() {
        let file_config = FileConfig {
            async_pool: Some(FileAsyncPoolConfig {
                core_threads: Some(5),
                max_threads: Some(1),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(ClientConfig::try_from(file_config).is_err());
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("EJB_PROVIDER_URL", "ejbd://env-host:4201");
        std::env::set_var("EJB_ASYNC_QUEUE_SIZE", "77");
        std::env::set_var("EJB_SERIALIZATION_EXCLUDE", "org.evil.*, com.bad.Type");
        let config = ClientConfig::from_env().unwrap();
        std::env::remove_var("EJB_PROVIDER_URL");
        std::env::remove_var("EJB_ASYNC_QUEUE_SIZE");
        std::env::remove_var("EJB_SERIALIZATION_EXCLUDE");

        assert_eq!(config.network().provider_url(), Some("ejbd://env-host:4201"));
        assert_eq!(config.async_pool().queue_size(), 77);
        assert!(!config.serialization().filter().accepts("com.bad.Type"));
        assert!(config.serialization().filter().accepts("com.good.Type"));
    }

    #[test]
    fn test_env_parse_reports_malformed_numbers() {
        std::env::set_var("EJB_TEST_MALFORMED_NUMBER", "ten");
        let result = env_parse::<usize>("EJB_TEST_MALFORMED_NUMBER");
        std::env::remove_var("EJB_TEST_MALFORMED_NUMBER");
        assert!(result.is_err());
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn test_yaml_round_trip() {
        let file_config = FileConfig {
            network: Some(FileNetworkConfig {
                provider_url: Some("ejbd://yaml:4201".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&file_config).unwrap();
        let parsed: FileConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            parsed.network.unwrap().provider_url.as_deref(),
            Some("ejbd://yaml:4201")
        );
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn test_toml_round_trip() {
        let file_config = FileConfig {
            async_pool: Some(FileAsyncPoolConfig {
                queue_size: Some(128),
                ..Default::default()
            }),
            ..Default::default()
        };
        let toml_str = toml::to_string(&file_config).unwrap();
        let parsed: FileConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.async_pool.unwrap().queue_size, Some(128));
    }
}
