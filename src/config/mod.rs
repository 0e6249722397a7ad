use serde::{Deserialize, Serialize};

use crate::shortcode::{DEFAULT_CODE_LENGTH, DEFAULT_MAX_ATTEMPTS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub redirect_server: ServerConfig,
    pub short_code_length: usize,
    pub generation_max_attempts: u32,
    pub cache_max_entries: u64,
    pub click_queue_capacity: usize,
    pub click_flush_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());
        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./snaplink.db".to_string());

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 5),
            },
            api_server: ServerConfig {
                host: std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: env_parse("API_PORT", 8080),
            },
            redirect_server: ServerConfig {
                host: std::env::var("REDIRECT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: env_parse("REDIRECT_PORT", 3000),
            },
            short_code_length: env_parse("SHORT_CODE_LENGTH", DEFAULT_CODE_LENGTH),
            generation_max_attempts: env_parse("GENERATION_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
            cache_max_entries: env_parse("CACHE_MAX_ENTRIES", 10_000),
            click_queue_capacity: env_parse("CLICK_QUEUE_CAPACITY", 10_000),
            click_flush_interval_secs: env_parse("CLICK_FLUSH_INTERVAL_SECS", 5),
        })
    }
}
