use sea_orm::ActiveValue::NotSet;

use crate::{
  entity::{AuditAction, audit_log},
  prelude::*,
};

/// Local record of every mutation confirmed by the backend.
pub struct Audit<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Audit<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn record(
    &self,
    actor: &str,
    action: AuditAction,
    subject: impl Into<String>,
    old_value: Option<String>,
    new_value: impl Into<String>,
  ) -> Result<audit_log::Model> {
    let now = Utc::now().naive_utc();
    let entry = audit_log::ActiveModel {
      id: NotSet,
      actor: Set(actor.to_string()),
      action: Set(action),
      subject: Set(subject.into()),
      old_value: Set(old_value),
      new_value: Set(new_value.into()),
      created_at: Set(now),
    }
    .insert(self.db)
    .await?;

    debug!(
      "audit: {} {:?} {} -> {}",
      entry.actor, entry.action, entry.subject, entry.new_value
    );
    Ok(entry)
  }

  /// Records a mutation the backend already applied. A local failure is
  /// logged and does not fail the caller.
  pub async fn record_applied(
    &self,
    actor: &str,
    action: AuditAction,
    subject: impl Into<String>,
    old_value: Option<String>,
    new_value: impl Into<String>,
  ) {
    let subject = subject.into();
    if let Err(e) = self
      .record(actor, action, subject.clone(), old_value, new_value)
      .await
    {
      warn!("audit entry for {} by {} not stored: {}", subject, actor, e);
    }
  }

  pub async fn recent(&self, limit: u64) -> Result<Vec<audit_log::Model>> {
    Ok(
      audit_log::Entity::find()
        .order_by_desc(audit_log::Column::Id)
        .limit(limit)
        .all(self.db)
        .await?,
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::test_utils::test_db;

  #[tokio::test]
  async fn test_record_and_recent() {
    let db = test_db::setup().await;
    let audit = Audit::new(&db);

    audit
      .record("tg:1", AuditAction::MaxLevel, "settings", Some("2".into()), "3")
      .await
      .unwrap();
    audit
      .record("http", AuditAction::LevelPercentage, "level 2", None, "40")
      .await
      .unwrap();

    let entries = audit.recent(10).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, AuditAction::LevelPercentage);
    assert_eq!(entries[1].old_value.as_deref(), Some("2"));

    assert_eq!(audit.recent(1).await.unwrap().len(), 1);
  }
}
