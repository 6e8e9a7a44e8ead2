//! blocks entity
//! Content attached to a location or to an instance page

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "blocks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_id: String,  // location id or instance id
    pub context: String,
    pub block_type: String,
    pub ordering: i32,
    #[sea_orm(column_type = "JsonBinary")]
    pub data: Json,
    pub points: i32,
    pub validation_required: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
