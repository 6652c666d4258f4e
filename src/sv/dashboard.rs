use serde::Serialize;

use crate::{
  api::{Backend, OverviewStats, RewardWithdrawal, WithdrawalStatus},
  entity::AuditAction,
  prelude::*,
  sv::Audit,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
  pub stats: OverviewStats,
  pub pending_withdrawals: Vec<RewardWithdrawal>,
}

pub struct Dashboard<'a> {
  backend: &'a dyn Backend,
  db: &'a DatabaseConnection,
}

impl<'a> Dashboard<'a> {
  pub fn new(backend: &'a dyn Backend, db: &'a DatabaseConnection) -> Self {
    Self { backend, db }
  }

  pub async fn overview(&self) -> Result<Overview> {
    let (stats, pending_withdrawals) = futures::try_join!(
      self.backend.fetch_overview_stats(),
      self.backend.list_withdrawals(Some(WithdrawalStatus::Pending)),
    )?;
    Ok(Overview { stats, pending_withdrawals })
  }

  pub async fn withdrawals(
    &self,
    status: Option<WithdrawalStatus>,
  ) -> Result<Vec<RewardWithdrawal>> {
    self.backend.list_withdrawals(status).await
  }

  /// Approves or rejects a reward withdrawal.
  pub async fn set_withdrawal_status(
    &self,
    actor: &str,
    id: i64,
    status: WithdrawalStatus,
  ) -> Result<RewardWithdrawal> {
    if status == WithdrawalStatus::Pending {
      return Err(Error::InvalidArgs(
        "A withdrawal can only be approved or rejected".into(),
      ));
    }

    let updated = self
      .backend
      .update_withdrawal_status(id, status)
      .await
      .map_err(|e| {
        warn!("withdrawal {} status update rejected: {}", id, e);
        e.into_persistence()
      })?;

    info!("{} set withdrawal {} to {}", actor, id, status.as_str());
    Audit::new(self.db)
      .record_applied(
        actor,
        AuditAction::WithdrawalStatus,
        format!("withdrawal {id}"),
        None,
        updated.status.as_str(),
      )
      .await;

    Ok(updated)
  }
}
