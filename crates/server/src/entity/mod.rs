//! SeaORM entities for the identity and refresh tables.

pub mod identity;
pub mod refresh;
