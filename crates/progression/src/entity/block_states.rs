//! block_states entity
//! A team's progress on one block

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "block_states")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub block_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub team_code: String,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub player_data: Option<Json>,
    pub is_complete: bool,
    pub points_awarded: i32,
    #[sea_orm(column_type = "TimestampWithTimeZone")]
    pub created_at: DateTimeUtc,
    #[sea_orm(column_type = "TimestampWithTimeZone")]
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
