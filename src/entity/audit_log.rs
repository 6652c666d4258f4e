use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
  #[sea_orm(string_value = "level_percentage")]
  LevelPercentage,
  #[sea_orm(string_value = "max_level")]
  MaxLevel,
  #[sea_orm(string_value = "withdrawal_status")]
  WithdrawalStatus,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_log")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub actor: String,
  pub action: AuditAction,
  pub subject: String,
  pub old_value: Option<String>,
  pub new_value: String,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
