//! Wire types exchanged with the platform backend.

use chrono::{DateTime as UtcDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One member of an affiliate tree. `parent_wallet_id` is `None` for the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateNode {
  pub node_id: i64,
  pub wallet_id: i64,
  pub parent_wallet_id: Option<i64>,
  pub commission_percent: f64,
  pub effective_from: UtcDateTime<Utc>,
  #[serde(default = "active")]
  pub is_active: bool,
}

fn active() -> bool {
  true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateTreeDetail {
  pub root_id: i64,
  #[serde(default)]
  pub name: Option<String>,
  pub nodes: Vec<AffiliateNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateTreeSummary {
  pub id: i64,
  #[serde(default)]
  pub name: Option<String>,
  pub root_wallet_id: i64,
  #[serde(default)]
  pub member_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralLevelReward {
  pub id: i64,
  pub level: u32,
  pub percentage: f64,
  pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralSettings {
  pub max_level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
  Pending,
  Approved,
  Rejected,
}

impl WithdrawalStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      WithdrawalStatus::Pending => "pending",
      WithdrawalStatus::Approved => "approved",
      WithdrawalStatus::Rejected => "rejected",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardWithdrawal {
  pub id: i64,
  pub wallet_id: i64,
  /// Decimal string as returned by the backend, never parsed to a float.
  pub amount: String,
  pub asset: String,
  pub status: WithdrawalStatus,
  pub requested_at: UtcDateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewStats {
  pub total_users: u64,
  pub total_wallets: u64,
  pub affiliate_trees: u64,
  pub swap_investors: u64,
  #[serde(default)]
  pub token_categories: u64,
}

/// Error body the backend sends with non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ApiError {
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct PercentageUpdate {
  pub percentage: f64,
}

#[derive(Debug, Serialize)]
pub(super) struct StatusUpdate {
  pub status: WithdrawalStatus,
}
