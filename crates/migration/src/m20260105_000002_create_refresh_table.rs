//! Migration creating the `refresh` table: one row per live refresh token,
//! keyed by the encoded JWT and owned by an identity row.

use sea_orm_migration::prelude::*;

use crate::m20260105_000001_create_identity_table::Identity;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Refresh::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Refresh::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Refresh::Owner).integer().not_null())
                    .col(
                        ColumnDef::new(Refresh::Jwt)
                            .text()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Refresh::Expiration).big_integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_refresh_owner")
                            .from(Refresh::Table, Refresh::Owner)
                            .to(Identity::Table, Identity::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Expiry sweeps scan by expiration; keep that cheap.
        manager
            .create_index(
                Index::create()
                    .name("idx_refresh_expiration")
                    .table(Refresh::Table)
                    .col(Refresh::Expiration)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Refresh::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Refresh {
    Table,
    Id,
    Owner,
    Jwt,
    Expiration,
}
