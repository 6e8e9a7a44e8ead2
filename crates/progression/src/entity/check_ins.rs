//! check_ins entity
//! The composite key makes a (team, location) visit unique

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "check_ins")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub team_code: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub location_id: String,
    pub instance_id: String,
    #[sea_orm(column_type = "TimestampWithTimeZone")]
    pub time_in: DateTimeUtc,
    #[sea_orm(column_type = "TimestampWithTimeZone", nullable)]
    pub time_out: Option<DateTimeUtc>,
    pub must_check_out: bool,
    pub points: i32,
    pub blocks_completed: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
