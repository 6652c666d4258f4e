use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(AuditLog::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(AuditLog::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(AuditLog::Actor).string().not_null())
          .col(ColumnDef::new(AuditLog::Action).string().not_null())
          .col(ColumnDef::new(AuditLog::Subject).string().not_null())
          .col(ColumnDef::new(AuditLog::OldValue).string().null())
          .col(ColumnDef::new(AuditLog::NewValue).string().not_null())
          .col(ColumnDef::new(AuditLog::CreatedAt).date_time().not_null())
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_audit_log_created_at")
          .table(AuditLog::Table)
          .col(AuditLog::CreatedAt)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(AuditLog::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum AuditLog {
  Table,
  Id,
  Actor,
  Action,
  Subject,
  OldValue,
  NewValue,
  CreatedAt,
}
