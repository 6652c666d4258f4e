use std::sync::Arc;

use async_trait::async_trait;
use tokio::time;

use crate::{plugins::Plugin, prelude::*, state::AppState};

/// Keeps the referral cache warm and drops expired affiliate trees.
pub struct CacheRefresh;

#[async_trait]
impl Plugin for CacheRefresh {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let period = app.config.refresh_interval;
    if period.is_zero() {
      info!("Cache refresh disabled via config (0 interval)");
      return Ok(());
    }

    info!(
      "Cache refresh started (interval: {})",
      humantime::format_duration(period)
    );

    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
      interval.tick().await;
      refresh(&app).await;
    }
  }
}

async fn refresh(app: &AppState) {
  let sv = app.sv();

  match futures::try_join!(
    sv.referral.refresh_levels(),
    sv.referral.refresh_settings()
  ) {
    Ok((levels, settings)) => debug!(
      "referral cache refreshed: {} levels, max level {}",
      levels.len(),
      settings.max_level
    ),
    Err(e) => warn!("referral cache refresh failed: {}", e),
  }

  app.tree_cache.gc();
}
