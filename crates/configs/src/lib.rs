//! # configs
//!
//! Environment-driven application configuration. Every knob reads from a
//! `SHUTTERCLUB_`-prefixed environment variable (a local `.env` file is
//! honored in development); connection URLs are held behind `secrecy` so
//! they never land in debug output or logs.

use secrecy::SecretString;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub log_level: String,
    /// `memory` or `postgres`.
    pub record_backend: String,
    /// `memory` or `redis`; covers both the quota counter and sessions.
    pub counter_backend: String,
    pub database_url: SecretString,
    pub database_max_connections: u32,
    pub redis_url: SecretString,
    /// Queue depth of the dispatcher intake channel.
    pub dispatch_buffer: usize,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let cfg = config::Config::builder()
            .set_default("app_env", "development")?
            .set_default("log_level", "info")?
            .set_default("record_backend", "memory")?
            .set_default("counter_backend", "memory")?
            .set_default("database_url", "postgres://localhost:5432/shutterclub")?
            .set_default("database_max_connections", 8)?
            .set_default("redis_url", "redis://127.0.0.1:6379")?
            .set_default("dispatch_buffer", 256)?
            .add_source(config::Environment::with_prefix("SHUTTERCLUB"))
            .build()?;
        cfg.try_deserialize()
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn defaults_cover_every_field() {
        let cfg = AppConfig::load().expect("defaults must satisfy the schema");
        assert_eq!(cfg.record_backend, "memory");
        assert_eq!(cfg.counter_backend, "memory");
        assert_eq!(cfg.dispatch_buffer, 256);
        assert!(!cfg.is_production());
        assert!(cfg.redis_url.expose_secret().starts_with("redis://"));
    }
}
