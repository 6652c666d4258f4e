//! Referral percentage cascade rules.
//!
//! Active reward levels must pay non-increasing percentages: level `k` never
//! pays more than level `k - 1`. The max-level setting must stay within the
//! number of active levels. Both checks run before any write is attempted.

use crate::{api::ReferralLevelReward, prelude::*};

pub const MIN_PERCENTAGE: f64 = 0.0;
pub const MAX_PERCENTAGE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentageChange {
  pub id: i64,
  pub level: u32,
  pub from: f64,
  pub to: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxLevelChange {
  pub from: u32,
  pub to: u32,
}

/// Active rows sorted ascending by level.
pub fn active_levels(
  rewards: &[ReferralLevelReward],
) -> Vec<&ReferralLevelReward> {
  let mut active: Vec<_> = rewards.iter().filter(|r| r.is_active).collect();
  active.sort_by_key(|r| r.level);
  active
}

fn active_at(
  rewards: &[ReferralLevelReward],
  level: u32,
) -> Option<&ReferralLevelReward> {
  rewards.iter().find(|r| r.is_active && r.level == level)
}

/// The row an edit of `level` applies to: the active one, else the first row
/// with that level.
pub fn level_row(
  rewards: &[ReferralLevelReward],
  level: u32,
) -> Option<&ReferralLevelReward> {
  active_at(rewards, level).or_else(|| rewards.iter().find(|r| r.level == level))
}

/// Checks an edit of one level's percentage against the active rows.
///
/// Returns `Ok(None)` when the value is unchanged and nothing must be written.
pub fn check_percentage(
  level: u32,
  percentage: f64,
  rewards: &[ReferralLevelReward],
) -> Result<Option<PercentageChange>> {
  if !percentage.is_finite()
    || !(MIN_PERCENTAGE..=MAX_PERCENTAGE).contains(&percentage)
  {
    return Err(Error::OutOfRange {
      what: "percentage",
      value: percentage,
      min: MIN_PERCENTAGE,
      max: MAX_PERCENTAGE,
    });
  }

  let row = level_row(rewards, level).ok_or(Error::LevelNotFound(level))?;

  if row.percentage == percentage {
    return Ok(None);
  }

  if let Some(previous) =
    level.checked_sub(1).and_then(|l| active_at(rewards, l))
    && previous.percentage < percentage
  {
    return Err(Error::ExceedsPreviousLevel {
      level,
      value: percentage,
      previous: previous.percentage,
    });
  }

  if let Some(next) =
    level.checked_add(1).and_then(|l| active_at(rewards, l))
    && next.percentage > percentage
  {
    return Err(Error::BelowNextLevel {
      level,
      value: percentage,
      next: next.percentage,
    });
  }

  Ok(Some(PercentageChange {
    id: row.id,
    level,
    from: row.percentage,
    to: percentage,
  }))
}

/// Checks a new max-level setting. `max_available` is the number of active
/// reward rows.
pub fn check_max_level(
  max_level: i64,
  current: u32,
  max_available: usize,
) -> Result<Option<MaxLevelChange>> {
  if max_level < 1 || max_level > max_available as i64 {
    return Err(Error::OutOfRange {
      what: "max level",
      value: max_level as f64,
      min: 1.0,
      max: max_available as f64,
    });
  }

  let to = max_level as u32;
  if to == current {
    return Ok(None);
  }

  Ok(Some(MaxLevelChange { from: current, to }))
}
