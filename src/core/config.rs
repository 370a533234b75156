use std::str::FromStr;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub realtime: RealtimeConfig,
    pub chat: ChatConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Capacity of the broadcast channel backing the change feed.
    pub channel_capacity: usize,
    /// How often the outbox dispatcher polls for pending events.
    pub dispatch_interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub gateway_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub retention_days: i64,
    pub purge_interval_secs: u64,
}

pub fn load() -> Result<Config> {
    Ok(Config {
        server: ServerConfig {
            host: env_or("HOST", "0.0.0.0".to_string())?,
            port: env_or("PORT", 3000)?,
        },
        database: DatabaseConfig {
            url: std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
        },
        realtime: RealtimeConfig {
            channel_capacity: env_or("REALTIME_CHANNEL_CAPACITY", 1024)?,
            dispatch_interval_ms: env_or("OUTBOX_DISPATCH_INTERVAL_MS", 250)?,
        },
        chat: ChatConfig {
            gateway_url: std::env::var("AI_GATEWAY_URL").ok(),
            api_key: std::env::var("AI_GATEWAY_API_KEY").ok(),
            model: env_or("AI_GATEWAY_MODEL", "google/gemini-2.5-flash".to_string())?,
        },
        audit: AuditConfig {
            retention_days: env_or("AUDIT_RETENTION_DAYS", 90)?,
            purge_interval_secs: env_or("AUDIT_PURGE_INTERVAL_SECS", 3600)?,
        },
    })
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("Invalid value for {key}")),
        Err(_) => Ok(default),
    }
}
