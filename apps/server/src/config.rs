use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use vnmarket_core::CacheConfig;

pub struct Config {
    pub listen_addr: SocketAddr,
    pub db_path: String,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub cache: CacheConfig,
}

impl Config {
    /// Read `VNM_*` variables, after loading a `.env` file if one exists.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let listen_addr: SocketAddr = std::env::var("VNM_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8765".to_string())
            .parse()
            .context("Invalid VNM_LISTEN_ADDR")?;
        let db_path = std::env::var("VNM_DB_PATH").unwrap_or_else(|_| "./db/assets.db".into());
        let cors_allow = std::env::var("VNM_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = std::env::var("VNM_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|_| "60000".into())
            .parse()
            .unwrap_or(60000);
        let cache = match std::env::var("VNM_CONFIG_JSON") {
            Ok(json) if !json.trim().is_empty() => {
                CacheConfig::from_json(&json).context("Invalid VNM_CONFIG_JSON")?
            }
            _ => CacheConfig::default(),
        };

        Ok(Self {
            listen_addr,
            db_path,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            cache,
        })
    }
}
