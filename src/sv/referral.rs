use std::time::Instant;

use tokio::sync::RwLock;

use crate::{
  api::{Backend, ReferralLevelReward, ReferralSettings},
  entity::AuditAction,
  prelude::*,
  sv::{Audit, cascade},
};

#[derive(Debug, Clone)]
struct Cached<T> {
  value: T,
  fetched_at: Instant,
}

impl<T: Clone> Cached<T> {
  fn fresh(&self, ttl: Duration) -> Option<T> {
    (self.fetched_at.elapsed() < ttl).then(|| self.value.clone())
  }
}

/// Last known referral rows and settings.
///
/// Only ever replaced with data read back from the backend, so a failed write
/// leaves it untouched.
pub struct ReferralCache {
  ttl: Duration,
  rewards: RwLock<Option<Cached<Vec<ReferralLevelReward>>>>,
  settings: RwLock<Option<Cached<ReferralSettings>>>,
}

impl ReferralCache {
  pub fn new(ttl: Duration) -> Self {
    Self { ttl, rewards: RwLock::new(None), settings: RwLock::new(None) }
  }

  async fn rewards(&self) -> Option<Vec<ReferralLevelReward>> {
    self.rewards.read().await.as_ref().and_then(|c| c.fresh(self.ttl))
  }

  async fn set_rewards(&self, rewards: Vec<ReferralLevelReward>) {
    *self.rewards.write().await =
      Some(Cached { value: rewards, fetched_at: Instant::now() });
  }

  async fn settings(&self) -> Option<ReferralSettings> {
    self.settings.read().await.as_ref().and_then(|c| c.fresh(self.ttl))
  }

  async fn set_settings(&self, settings: ReferralSettings) {
    *self.settings.write().await =
      Some(Cached { value: settings, fetched_at: Instant::now() });
  }

  pub async fn invalidate(&self) {
    *self.rewards.write().await = None;
    *self.settings.write().await = None;
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
  /// Submitted value equals the stored one, nothing was written.
  Unchanged(T),
  Updated(T),
}

impl<T> Outcome<T> {
  pub fn into_inner(self) -> T {
    match self {
      Outcome::Unchanged(value) | Outcome::Updated(value) => value,
    }
  }

  pub fn is_updated(&self) -> bool {
    matches!(self, Outcome::Updated(_))
  }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralOverview {
  pub levels: Vec<ReferralLevelReward>,
  pub max_level: u32,
  pub active_levels: usize,
}

pub struct Referral<'a> {
  backend: &'a dyn Backend,
  cache: &'a ReferralCache,
  db: &'a DatabaseConnection,
}

impl<'a> Referral<'a> {
  pub fn new(
    backend: &'a dyn Backend,
    cache: &'a ReferralCache,
    db: &'a DatabaseConnection,
  ) -> Self {
    Self { backend, cache, db }
  }

  /// All reward rows sorted by level, served from cache while fresh.
  pub async fn levels(&self) -> Result<Vec<ReferralLevelReward>> {
    if let Some(rewards) = self.cache.rewards().await {
      return Ok(rewards);
    }
    self.refresh_levels().await
  }

  pub async fn settings(&self) -> Result<ReferralSettings> {
    if let Some(settings) = self.cache.settings().await {
      return Ok(settings);
    }
    self.refresh_settings().await
  }

  pub async fn refresh_levels(&self) -> Result<Vec<ReferralLevelReward>> {
    let mut rewards = self.backend.fetch_level_rewards().await?;
    rewards.sort_by_key(|r| r.level);
    self.cache.set_rewards(rewards.clone()).await;
    Ok(rewards)
  }

  pub async fn refresh_settings(&self) -> Result<ReferralSettings> {
    let settings = self.backend.fetch_referral_settings().await?;
    self.cache.set_settings(settings).await;
    Ok(settings)
  }

  pub async fn overview(&self) -> Result<ReferralOverview> {
    let (levels, settings) =
      futures::try_join!(self.levels(), self.settings())?;
    let active_levels = cascade::active_levels(&levels).len();

    Ok(ReferralOverview {
      levels,
      max_level: settings.max_level,
      active_levels,
    })
  }

  /// Validates and persists a new percentage for `level`.
  ///
  /// Validation runs against rows fetched right before the write. After a
  /// successful write every row is read back and replaces the cache.
  pub async fn set_level_percentage(
    &self,
    actor: &str,
    level: u32,
    percentage: f64,
  ) -> Result<Outcome<ReferralLevelReward>> {
    let rewards = self.refresh_levels().await?;

    let Some(change) = cascade::check_percentage(level, percentage, &rewards)?
    else {
      debug!("level {} already pays {}%, skipping update", level, percentage);
      let row = cascade::level_row(&rewards, level)
        .cloned()
        .ok_or(Error::LevelNotFound(level))?;
      return Ok(Outcome::Unchanged(row));
    };

    let written = self
      .backend
      .update_level_reward(change.id, change.to)
      .await
      .map_err(|e| {
        warn!("update of level {} rejected: {}", level, e);
        e.into_persistence()
      })?;

    let refreshed = match self.refresh_levels().await {
      Ok(rows) => {
        rows.into_iter().find(|r| r.id == change.id).unwrap_or(written)
      }
      Err(e) => {
        warn!("refetch after level update failed: {}", e);
        self.cache.invalidate().await;
        written
      }
    };

    info!(
      "{} changed level {} from {}% to {}%",
      actor, level, change.from, refreshed.percentage
    );
    Audit::new(self.db)
      .record_applied(
        actor,
        AuditAction::LevelPercentage,
        format!("level {level}"),
        Some(change.from.to_string()),
        refreshed.percentage.to_string(),
      )
      .await;

    Ok(Outcome::Updated(refreshed))
  }

  /// Validates and persists the number of levels applied to payouts.
  pub async fn set_max_level(
    &self,
    actor: &str,
    max_level: i64,
  ) -> Result<Outcome<ReferralSettings>> {
    let (rewards, current) =
      futures::try_join!(self.refresh_levels(), self.refresh_settings())?;
    let available = cascade::active_levels(&rewards).len();

    let Some(change) =
      cascade::check_max_level(max_level, current.max_level, available)?
    else {
      return Ok(Outcome::Unchanged(current));
    };

    let written = self
      .backend
      .update_referral_settings(change.to)
      .await
      .map_err(|e| {
        warn!("update of max level rejected: {}", e);
        e.into_persistence()
      })?;

    let refreshed = match self.refresh_settings().await {
      Ok(settings) => settings,
      Err(e) => {
        warn!("refetch after settings update failed: {}", e);
        self.cache.invalidate().await;
        written
      }
    };

    info!(
      "{} changed max level from {} to {}",
      actor, change.from, refreshed.max_level
    );
    Audit::new(self.db)
      .record_applied(
        actor,
        AuditAction::MaxLevel,
        "max level",
        Some(change.from.to_string()),
        refreshed.max_level.to_string(),
      )
      .await;

    Ok(Outcome::Updated(refreshed))
  }
}
