use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

/// Settings shared by every job: how and where it logs.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_json")]
    pub log_json: bool,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_json() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: default_log_json(),
            otlp_endpoint: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mut loaded: Self = config.try_deserialize()?;
        if loaded
            .otlp_endpoint
            .as_deref()
            .is_some_and(|endpoint| endpoint.trim().is_empty())
        {
            loaded.otlp_endpoint = None;
        }
        Ok(loaded)
    }
}
