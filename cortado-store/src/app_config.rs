use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    3
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Environment-specific overrides, optional.
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in.
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `CORTADO__DATABASE__URL=...`
            .add_source(config::Environment::with_prefix("CORTADO").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
