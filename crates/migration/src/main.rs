use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    cli::run_cli(consent_migration::Migrator).await;
}
