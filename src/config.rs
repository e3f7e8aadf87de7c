use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub identity_url: String,
    pub identity_api_key: String,
    pub public_url: String,
    pub client_secret_path: String,
    pub dev_delay: bool,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("CHIRP_PORT", "8080"),
            database_url: try_load("DATABASE_URL", "sqlite://chirp.db?mode=rwc"),
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1:6379"),
            identity_url: try_load("IDENTITY_API_URL", "https://api.identity.local/v1"),
            identity_api_key: required("IDENTITY_API_KEY"),
            public_url: try_load("PUBLIC_URL", "http://localhost:8080"),
            client_secret_path: try_load("CLIENT_SECRET_PATH", "client_secret.json"),
            dev_delay: try_load("CHIRP_DEV_DELAY", "false"),
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

fn required(key: &str) -> String {
    env::var(key)
        .map_err(|_| {
            warn!("Required environment variable {key} is missing");
        })
        .expect("Environment misconfigured!")
}
