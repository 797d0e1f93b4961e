//! Identity entity - one row per registered handle.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "identity")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub handle: String,
    /// bcrypt hash of the password. The clear text is never stored.
    #[sea_orm(column_type = "Blob")]
    pub secret: Vec<u8>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::refresh::Entity")]
    Refresh,
}

impl Related<super::refresh::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Refresh.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
