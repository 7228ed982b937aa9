use anyhow::Context;
use std::{path::PathBuf, str::FromStr, time::Duration};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub nats_url: Option<String>,
    pub event_topic: String,
    pub inventory_url: Option<String>,
    pub inventory_timeout: Duration,
    pub image_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Ok(Self {
            port: parse_or(&var, "PORT", 8080)?,
            database_url: var("DATABASE_URL"),
            db_max_connections: parse_or(&var, "DATABASE_MAX_CONNECTIONS", 5)?,
            nats_url: var("NATS_URL"),
            event_topic: var("EVENT_TOPIC").unwrap_or_else(|| "products".to_string()),
            inventory_url: var("INVENTORY_URL"),
            inventory_timeout: Duration::from_millis(parse_or(&var, "INVENTORY_TIMEOUT_MS", 2000)?),
            image_dir: var("IMAGE_DIR").map(PathBuf::from),
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_to_in_memory_backends() {
        let c = config(&[]).unwrap();
        assert_eq!(c.port, 8080);
        assert_eq!(c.db_max_connections, 5);
        assert_eq!(c.event_topic, "products");
        assert_eq!(c.inventory_timeout, Duration::from_millis(2000));
        assert!(c.database_url.is_none() && c.nats_url.is_none());
        assert!(c.inventory_url.is_none() && c.image_dir.is_none());
    }

    #[test]
    fn reads_overrides_and_ignores_blank_values() {
        let c = config(&[
            ("PORT", "3000"),
            ("DATABASE_URL", "postgres://localhost/catalog"),
            ("NATS_URL", "  "),
            ("IMAGE_DIR", "/tmp/images"),
        ])
        .unwrap();
        assert_eq!(c.port, 3000);
        assert_eq!(c.database_url.as_deref(), Some("postgres://localhost/catalog"));
        assert!(c.nats_url.is_none());
        assert_eq!(c.image_dir, Some(PathBuf::from("/tmp/images")));
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let err = config(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("invalid PORT"));
    }
}
