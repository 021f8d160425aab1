//! Service configuration with validation.
//!
//! Loaded from an optional TOML file; every section falls back to its
//! defaults when absent.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stepmesh_kernel::TessellationParams;
use thiserror::Error;

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listener
    pub http: HttpConfig,
    /// Scratch storage and upload limits
    pub storage: StorageConfig,
    /// Mesh quality
    pub tessellation: TessellationConfig,
    /// Kernel invocation limits
    pub conversion: ConversionConfig,
    /// Expiry of unclaimed scratch files
    pub reaper: ReaperConfig,
    /// CORS
    pub cors: CorsConfig,
}

impl ServiceConfig {
    /// Read a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tessellation_params()?;

        if self.storage.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_upload_bytes cannot be 0".into(),
            ));
        }

        if self.conversion.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(
                "conversion timeout cannot be 0".into(),
            ));
        }

        if self.reaper.enabled {
            if self.reaper.interval_secs == 0 || self.reaper.max_age_secs == 0 {
                return Err(ConfigError::InvalidTimeout(
                    "reaper interval and max age must be positive".into(),
                ));
            }
            // A file in use by a running conversion must not look stale.
            if self.reaper.max_age_secs <= self.conversion.timeout_secs {
                return Err(ConfigError::InvalidTimeout(format!(
                    "reaper max_age_secs ({}) must exceed conversion timeout_secs ({})",
                    self.reaper.max_age_secs, self.conversion.timeout_secs
                )));
            }
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    /// Kernel parameters built from the tessellation section.
    pub fn tessellation_params(&self) -> Result<TessellationParams, ConfigError> {
        TessellationParams::new(
            self.tessellation.linear_tolerance,
            self.tessellation.angular_tolerance,
        )
        .map_err(|e| ConfigError::InvalidTessellation(e.to_string()))
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 5000, 0 picks an ephemeral port)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 5000,
        }
    }
}

/// Scratch directory and upload cap
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding uploads and converted meshes
    pub scratch_dir: PathBuf,
    /// Largest accepted request body
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir().join("stepmesh"),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Tessellation tolerances applied to every request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TessellationConfig {
    /// Maximum chord deviation, in millimetres
    pub linear_tolerance: f64,
    /// Maximum angle between adjacent segments, in radians
    pub angular_tolerance: f64,
}

impl Default for TessellationConfig {
    fn default() -> Self {
        let params = TessellationParams::default();
        Self {
            linear_tolerance: params.linear_tolerance,
            angular_tolerance: params.angular_tolerance,
        }
    }
}

/// Kernel call limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Hard limit on one conversion
    pub timeout_secs: u64,
}

impl ConversionConfig {
    /// The limit as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

/// Background removal of stale scratch files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Run the reaper
    pub enabled: bool,
    /// Files older than this are removed
    pub max_age_secs: u64,
    /// Time between sweeps
    pub interval_secs: u64,
}

impl ReaperConfig {
    /// Maximum file age as a duration.
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    /// Sweep interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_secs: 60 * 60,
            interval_secs: 5 * 60,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins (`*` allows any)
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid tessellation settings: {0}")]
    InvalidTessellation(String),

    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.tessellation.linear_tolerance, 0.1);
        assert_eq!(config.tessellation.angular_tolerance, 0.5);
        assert_eq!(config.reaper.max_age(), Duration::from_secs(3600));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServiceConfig::from_toml(
            r#"
            [http]
            port = 8080

            [tessellation]
            linear_tolerance = 0.01
            "#,
        )
        .unwrap();
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.tessellation.linear_tolerance, 0.01);
        assert_eq!(config.tessellation.angular_tolerance, 0.5);
        assert_eq!(config.conversion.timeout_secs, 120);
        assert_eq!(config.cors.allowed_origins, vec!["*".to_string()]);
    }

    #[test]
    fn test_rejects_non_positive_tolerance() {
        let mut config = ServiceConfig::default();
        config.tessellation.linear_tolerance = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTessellation(_))
        ));

        let mut config = ServiceConfig::default();
        config.tessellation.angular_tolerance = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_limits() {
        let mut config = ServiceConfig::default();
        config.storage.max_upload_bytes = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLimit(_))));

        let mut config = ServiceConfig::default();
        config.conversion.timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn test_reaper_age_must_exceed_timeout() {
        let mut config = ServiceConfig::default();
        config.conversion.timeout_secs = 600;
        config.reaper.max_age_secs = 600;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout(_))
        ));

        config.reaper.max_age_secs = 601;
        assert!(config.validate().is_ok());

        // Without a reaper nothing is expired, so any age is fine.
        config.reaper.enabled = false;
        config.reaper.max_age_secs = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_zero_allowed() {
        let mut config = ServiceConfig::default();
        config.http.port = 0;
        assert!(config.validate().is_ok());
        assert_eq!(config.http_addr().port(), 0);
    }

    #[test]
    fn test_malformed_toml_is_error() {
        assert!(matches!(
            ServiceConfig::from_toml("[http]\nport = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
