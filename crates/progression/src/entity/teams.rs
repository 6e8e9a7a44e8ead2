//! teams entity

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "teams")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub code: String,  // uppercase
    pub instance_id: String,
    pub name: String,
    pub has_started: bool,
    pub points: i32,
    pub must_check_out: String,  // location id, empty when free to move
    #[sea_orm(column_type = "JsonBinary")]
    pub skipped_group_ids: Json,  // array of group ids
    #[sea_orm(column_type = "TimestampWithTimeZone")]
    pub created_at: DateTimeUtc,
    #[sea_orm(column_type = "TimestampWithTimeZone")]
    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn skipped_groups(&self) -> Vec<String> {
        serde_json::from_value(self.skipped_group_ids.clone()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
