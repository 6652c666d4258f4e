use anyhow::{Context, bail};

use crate::prelude::*;

#[derive(Debug, Clone)]
pub struct Config {
  pub database_url: String,
  pub backend_url: String,
  pub backend_token: Option<String>,
  pub analytics_ws_url: Option<String>,
  pub port: u16,
  /// How long fetched referral rows and settings are served from cache.
  pub cache_ttl: Duration,
  /// Background cache warm-up period, zero disables it.
  pub refresh_interval: Duration,
  pub reconnect_delay: Duration,
  pub telegram_token: Option<String>,
  pub admins: HashSet<i64>,
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  pub fn from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
  ) -> anyhow::Result<Self> {
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let duration = |key: &str, default: &str| -> anyhow::Result<Duration> {
      let raw = var(key).unwrap_or_else(|| default.to_string());
      humantime::parse_duration(raw.trim())
        .with_context(|| format!("Invalid duration in {key}: '{raw}'"))
    };

    let backend_url = var("BACKEND_URL").context("BACKEND_URL not set")?;
    if !backend_url.starts_with("http://") && !backend_url.starts_with("https://")
    {
      bail!("BACKEND_URL must be an http(s) URL, got '{backend_url}'");
    }

    let port = match var("PORT") {
      Some(p) => p.trim().parse().with_context(|| format!("Invalid PORT '{p}'"))?,
      None => 3000,
    };

    let admins = var("ADMIN_IDS")
      .unwrap_or_default()
      .split(',')
      .filter(|s| !s.trim().is_empty())
      .map(|id| {
        id.trim()
          .parse()
          .with_context(|| format!("Invalid admin id '{}'", id.trim()))
      })
      .collect::<anyhow::Result<HashSet<i64>>>()?;

    Ok(Self {
      database_url: var("DATABASE_URL")
        .unwrap_or_else(|| "sqlite:admin.db?mode=rwc".into()),
      backend_url: backend_url.trim_end_matches('/').to_string(),
      backend_token: var("BACKEND_TOKEN"),
      analytics_ws_url: var("ANALYTICS_WS_URL"),
      port,
      cache_ttl: duration("CACHE_TTL", "30s")?,
      refresh_interval: duration("REFRESH_INTERVAL", "5m")?,
      reconnect_delay: duration("ANALYTICS_RECONNECT", "5s")?,
      telegram_token: var("TELOXIDE_TOKEN"),
      admins,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    move |key| map.get(key).cloned()
  }

  #[test]
  fn test_defaults() {
    let config =
      Config::from_lookup(lookup(&[("BACKEND_URL", "https://api.test/v1/")]))
        .unwrap();

    assert_eq!(config.backend_url, "https://api.test/v1");
    assert_eq!(config.database_url, "sqlite:admin.db?mode=rwc");
    assert_eq!(config.port, 3000);
    assert_eq!(config.cache_ttl, Duration::from_secs(30));
    assert_eq!(config.refresh_interval, Duration::from_secs(300));
    assert_eq!(config.reconnect_delay, Duration::from_secs(5));
    assert!(config.telegram_token.is_none());
    assert!(config.analytics_ws_url.is_none());
    assert!(config.admins.is_empty());
  }

  #[test]
  fn test_backend_url_required() {
    assert!(Config::from_lookup(lookup(&[])).is_err());
    assert!(
      Config::from_lookup(lookup(&[("BACKEND_URL", "ftp://api.test")]))
        .is_err()
    );
  }

  #[test]
  fn test_overrides() {
    let config = Config::from_lookup(lookup(&[
      ("BACKEND_URL", "http://localhost:8080"),
      ("PORT", "8081"),
      ("CACHE_TTL", "2m"),
      ("REFRESH_INTERVAL", "0s"),
      ("ADMIN_IDS", "1, 2,,3"),
      ("TELOXIDE_TOKEN", "token"),
    ]))
    .unwrap();

    assert_eq!(config.port, 8081);
    assert_eq!(config.cache_ttl, Duration::from_secs(120));
    assert!(config.refresh_interval.is_zero());
    assert_eq!(config.admins, HashSet::from([1, 2, 3]));
    assert_eq!(config.telegram_token.as_deref(), Some("token"));
  }

  #[test]
  fn test_invalid_values() {
    assert!(
      Config::from_lookup(lookup(&[
        ("BACKEND_URL", "http://localhost"),
        ("ADMIN_IDS", "1,abc"),
      ]))
      .is_err()
    );
    assert!(
      Config::from_lookup(lookup(&[
        ("BACKEND_URL", "http://localhost"),
        ("CACHE_TTL", "soon"),
      ]))
      .is_err()
    );
  }
}
