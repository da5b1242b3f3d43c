//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use transcendence::{SeedingPolicy, db::DatabaseConfig};

/// Default bind address when neither `--bind` nor `SERVER_BIND` is given
pub const DEFAULT_BIND: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000);

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Keep all state in memory instead of PostgreSQL
    pub memory: bool,
    /// Tournament defaults configuration
    pub tournament_defaults: TournamentDefaultsConfig,
}

/// Defaults applied to newly created tournaments
#[derive(Debug, Clone)]
pub struct TournamentDefaultsConfig {
    /// Capacity when a create request names none
    pub max_players: u32,
    /// First-round seeding for generated brackets
    pub seeding: SeedingPolicy,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `memory` - Use the in-memory store (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        memory: bool,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => match std::env::var("SERVER_BIND") {
                Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
                    var: "SERVER_BIND".to_string(),
                    reason: format!("'{value}' is not an IP:PORT address"),
                })?,
                Err(_) => DEFAULT_BIND,
            },
        };

        let mut database = DatabaseConfig::from_env().unwrap_or_default();
        if let Some(url) = database_url_override {
            database = database.with_url(url);
        }

        let seeding = match std::env::var("SEEDING") {
            Ok(value) => value
                .parse::<SeedingPolicy>()
                .map_err(|reason| ConfigError::Invalid {
                    var: "SEEDING".to_string(),
                    reason,
                })?,
            Err(_) => SeedingPolicy::default(),
        };

        let tournament_defaults = TournamentDefaultsConfig {
            max_players: parse_env_or("TOURNAMENT_DEFAULT_MAX_PLAYERS", 8),
            seeding,
        };

        Ok(ServerConfig {
            bind,
            database,
            memory,
            tournament_defaults,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tournament_defaults.max_players < 2 {
            return Err(ConfigError::Invalid {
                var: "TOURNAMENT_DEFAULT_MAX_PLAYERS".to_string(),
                reason: "Must be at least 2".to_string(),
            });
        }

        if !self.memory && self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.database.max_connections
                ),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            database: DatabaseConfig::development().with_url("test"),
            memory: false,
            tournament_defaults: TournamentDefaultsConfig {
                max_players: 8,
                seeding: SeedingPolicy::Random,
            },
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            var: "SEEDING".to_string(),
            reason: "unknown seeding policy: best".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("SEEDING"));
        assert!(msg.contains("best"));
    }

    #[test]
    fn test_default_bind() {
        assert_eq!(DEFAULT_BIND.to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn test_config_validation_ok() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_max_players_too_small() {
        let mut config = sample_config();
        config.tournament_defaults.max_players = 1;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var, .. } if var == "TOURNAMENT_DEFAULT_MAX_PLAYERS"));
    }

    #[test]
    fn test_config_validation_pool_bounds() {
        let mut config = sample_config();
        config.database.min_connections = 50;
        config.database.max_connections = 10;
        assert!(config.validate().is_err());

        // Pool settings are irrelevant without a database
        config.memory = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_env_or_falls_back() {
        assert_eq!(parse_env_or("TR_SERVER_SURELY_UNSET_VARIABLE", 42u32), 42);
    }
}
