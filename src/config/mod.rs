use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl ApiConfig {
    pub fn load() -> Result<Self> {
        let configured_path =
            std::env::var("NQP_API_CONFIG").unwrap_or_else(|_| "config/api.toml".to_string());
        assert!(
            !configured_path.is_empty(),
            "Configuration path must be non-empty"
        );
        assert!(
            configured_path.len() < 4096,
            "Configuration path length exceeds hard limit"
        );

        let mut builder = Config::builder()
            .add_source(File::new(&configured_path, FileFormat::Toml).required(true));

        if let Ok(env_override) = std::env::var("NQP_API_ENV") {
            if !env_override.is_empty() {
                let env_file = format!("config/api.{}.toml", env_override);
                if Path::new(&env_file).exists() {
                    builder = builder.add_source(File::new(&env_file, FileFormat::Toml));
                }
            }
        }

        // NQP__DATABASE__URL=... overrides [database] url
        builder = builder.add_source(
            Environment::with_prefix("NQP")
                .prefix_separator("__")
                .separator("__"),
        );

        let settings = builder
            .build()
            .map_err(|err| map_config_error(err, &configured_path))?;
        let mut config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize API configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<()> {
        assert!(
            !self.database.url.is_empty(),
            "Database URL must be specified"
        );
        assert!(
            self.server.port > 0,
            "Server port must be greater than zero"
        );
        self.cache.ensure_bounds()?;
        self.ranking.ensure_bounds()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Option<IpAddr>,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> SocketAddr {
        let host = self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(self.port != 0, "HTTP port cannot be zero");
        assert!(self.port < 65535, "HTTP port must be below 65535");
        SocketAddr::new(host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub analytics_max_capacity: u64,
    pub analytics_ttl_seconds: u64,
    pub categories_ttl_seconds: u64,
}

impl CacheConfig {
    fn ensure_bounds(&self) -> Result<()> {
        assert!(
            self.analytics_max_capacity >= 10,
            "Analytics cache capacity must be at least 10"
        );
        assert!(
            self.analytics_ttl_seconds <= 3_600,
            "Analytics cache TTL cannot exceed one hour"
        );
        assert!(
            self.categories_ttl_seconds <= 86_400,
            "Category cache TTL cannot exceed one day"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "RankingConfig::default_trending_window_hours")]
    pub trending_window_hours: i64,
    #[serde(default = "RankingConfig::default_trending_gravity")]
    pub trending_gravity: f64,
    #[serde(default = "RankingConfig::default_controversy_min_votes")]
    pub controversy_min_votes: i64,
    #[serde(default = "RankingConfig::default_barometer_window_days")]
    pub barometer_window_days: i64,
}

impl RankingConfig {
    pub fn trending_window(&self) -> chrono::Duration {
        assert!(
            self.trending_window_hours > 0,
            "Trending window must be positive"
        );
        chrono::Duration::hours(self.trending_window_hours)
    }

    pub fn barometer_window(&self) -> chrono::Duration {
        assert!(
            self.barometer_window_days > 0,
            "Barometer window must be positive"
        );
        chrono::Duration::days(self.barometer_window_days)
    }

    pub fn ensure_bounds(&self) -> Result<()> {
        assert!(
            (1..=24 * 90).contains(&self.trending_window_hours),
            "Trending window must be between one hour and 90 days"
        );
        assert!(
            self.trending_gravity > 0.0 && self.trending_gravity <= 4.0,
            "Trending gravity must be in (0, 4]"
        );
        assert!(
            self.controversy_min_votes >= 1,
            "Controversy threshold must be at least one vote"
        );
        assert!(
            (1..=3_650).contains(&self.barometer_window_days),
            "Barometer window must be between one day and ten years"
        );
        Ok(())
    }

    const fn default_trending_window_hours() -> i64 {
        72
    }

    const fn default_trending_gravity() -> f64 {
        1.5
    }

    const fn default_controversy_min_votes() -> i64 {
        3
    }

    const fn default_barometer_window_days() -> i64 {
        30
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            trending_window_hours: Self::default_trending_window_hours(),
            trending_gravity: Self::default_trending_gravity(),
            controversy_min_votes: Self::default_controversy_min_votes(),
            barometer_window_days: Self::default_barometer_window_days(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "AuditConfig::default_enabled")]
    pub enabled: bool,
}

impl AuditConfig {
    const fn default_enabled() -> bool {
        true
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
        }
    }
}

/// Connection pool acquire timeout.
pub const DATABASE_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

fn map_config_error(err: ConfigError, path: &str) -> ConfigError {
    match err {
        ConfigError::NotFound(_) => ConfigError::NotFound(path.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_defaults_are_within_bounds() {
        let ranking = RankingConfig::default();
        assert!(ranking.ensure_bounds().is_ok());
        assert_eq!(ranking.trending_window(), chrono::Duration::hours(72));
        assert_eq!(ranking.barometer_window(), chrono::Duration::days(30));
    }

    #[test]
    fn sections_deserialize_from_toml() {
        let raw = r#"
            [server]
            port = 8080

            [database]
            url = "postgres://localhost/nqp"
            max_connections = 16

            [cache]
            analytics_max_capacity = 256
            analytics_ttl_seconds = 30
            categories_ttl_seconds = 600

            [ranking]
            trending_window_hours = 24
        "#;
        let config: ApiConfig = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.address().port(), 8080);
        assert_eq!(config.ranking.trending_window_hours, 24);
        assert_eq!(config.ranking.controversy_min_votes, 3);
        assert!(config.audit.enabled);
    }
}
