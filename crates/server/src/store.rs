//! SQLite persistence for identities and refresh tokens.
//!
//! The service layer depends on the [`IdentityStore`] and [`RefreshStore`]
//! traits; [`SqlStore`] implements both over a SeaORM connection.

use async_trait::async_trait;
use consent_tokens::RefreshToken;
use sea_orm::{
    ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr,
    EntityTrait, QueryFilter, Set, SqlErr, Statement,
};
use thiserror::Error;

use crate::entity::{identity, refresh};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,
    #[error("unique constraint violation")]
    UniqueViolation,
    /// The statement resolved no owner row (unknown handle).
    #[error("constraint failure: no matching owner")]
    Constraint,
    #[error(transparent)]
    Db(#[from] DbErr),
}

/// Persistence of user identity data.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn insert_identity(&self, handle: &str, secret: &[u8]) -> Result<(), StoreError>;
    async fn get_secret(&self, handle: &str) -> Result<Vec<u8>, StoreError>;
}

/// Persistence of active refresh tokens.
#[async_trait]
pub trait RefreshStore: Send + Sync {
    async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<(), StoreError>;
    async fn get_refresh_token_owner(&self, jwt: &str) -> Result<String, StoreError>;
    /// Returns true iff exactly one row was removed. This is the single-use
    /// consume primitive: of N concurrent deletes for the same jwt, exactly
    /// one observes `true`.
    async fn delete_refresh_token(&self, jwt: &str) -> Result<bool, StoreError>;
    /// Remove rows whose expiration is before `now`; returns the count.
    async fn delete_expired(&self, now: i64) -> Result<u64, StoreError>;
}

pub struct SqlStore {
    db: DatabaseConnection,
}

impl SqlStore {
    /// Connect and enable foreign keys. A single pooled connection keeps
    /// SQLite writes serialized.
    pub async fn connect(database_url: &str) -> Result<Self, DbErr> {
        let mut options = ConnectOptions::new(database_url);
        options.max_connections(1);
        let db = Database::connect(options).await?;
        db.execute_unprepared("PRAGMA foreign_keys = ON;").await?;
        Ok(SqlStore { db })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl IdentityStore for SqlStore {
    async fn insert_identity(&self, handle: &str, secret: &[u8]) -> Result<(), StoreError> {
        let row = identity::ActiveModel {
            handle: Set(handle.to_owned()),
            secret: Set(secret.to_vec()),
            ..Default::default()
        };
        match identity::Entity::insert(row).exec(&self.db).await {
            Ok(_) => Ok(()),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(StoreError::UniqueViolation)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_secret(&self, handle: &str) -> Result<Vec<u8>, StoreError> {
        let row = identity::Entity::find()
            .filter(identity::Column::Handle.eq(handle))
            .one(&self.db)
            .await?;
        match row {
            Some(row) => Ok(row.secret),
            None => Err(StoreError::NotFound),
        }
    }
}

#[async_trait]
impl RefreshStore for SqlStore {
    async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<(), StoreError> {
        // Resolve the owner by handle in the same statement; an unknown
        // handle inserts nothing and surfaces as a constraint failure.
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DbBackend::Sqlite,
                r#"INSERT INTO refresh (owner, jwt, expiration)
                   SELECT i.id, ?, ?
                   FROM identity i
                   WHERE i.handle = ?"#,
                [
                    token.encoded().into(),
                    token.expiration().unix_timestamp().into(),
                    token.subject().into(),
                ],
            ))
            .await;

        match result {
            Ok(res) if res.rows_affected() == 0 => Err(StoreError::Constraint),
            Ok(_) => Ok(()),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(StoreError::UniqueViolation)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_refresh_token_owner(&self, jwt: &str) -> Result<String, StoreError> {
        let row = refresh::Entity::find()
            .filter(refresh::Column::Jwt.eq(jwt))
            .find_also_related(identity::Entity)
            .one(&self.db)
            .await?;
        match row {
            Some((_, Some(owner))) => Ok(owner.handle),
            _ => Err(StoreError::NotFound),
        }
    }

    async fn delete_refresh_token(&self, jwt: &str) -> Result<bool, StoreError> {
        let result = refresh::Entity::delete_many()
            .filter(refresh::Column::Jwt.eq(jwt))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn delete_expired(&self, now: i64) -> Result<u64, StoreError> {
        let result = refresh::Entity::delete_many()
            .filter(refresh::Column::Expiration.lt(now))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
