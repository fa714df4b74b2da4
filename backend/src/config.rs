use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::{env, net::SocketAddr, str::FromStr};

use crate::db::connection::PoolConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/tx_middleware".to_string());

        let bind_addr = parse_var("BIND_ADDR", env::var("BIND_ADDR").ok(), "0.0.0.0:3000")?;
        let db_max_connections =
            parse_var("DB_MAX_CONNECTIONS", env::var("DB_MAX_CONNECTIONS").ok(), "10")?;
        let db_min_connections =
            parse_var("DB_MIN_CONNECTIONS", env::var("DB_MIN_CONNECTIONS").ok(), "0")?;
        let db_acquire_timeout_secs = parse_var(
            "DB_ACQUIRE_TIMEOUT_SECS",
            env::var("DB_ACQUIRE_TIMEOUT_SECS").ok(),
            "5",
        )?;

        Ok(Config {
            database_url,
            bind_addr,
            db_max_connections,
            db_min_connections,
            db_acquire_timeout_secs,
        })
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_connections: self.db_max_connections,
            min_connections: self.db_min_connections,
            acquire_timeout_secs: self.db_acquire_timeout_secs,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, value: Option<String>, default: &str) -> anyhow::Result<T> {
    let raw = value.unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .map_err(|_| anyhow!("Invalid {} value: {}", name, raw))
}
