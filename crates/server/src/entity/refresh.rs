//! Refresh entity - one row per live refresh token, keyed by the encoded
//! JWT. Deleting the row is what consumes the token.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "refresh")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub owner: i32,
    #[sea_orm(unique, column_type = "Text")]
    pub jwt: String,
    /// Unix seconds after which the token is no longer honored. Sweeps use
    /// this; validation itself happens against the token's `exp` claim.
    pub expiration: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::identity::Entity",
        from = "Column::Owner",
        to = "super::identity::Column::Id"
    )]
    Identity,
}

impl Related<super::identity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Identity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
