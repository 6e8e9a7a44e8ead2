//! credit_purchases entity

use sea_orm::entity::prelude::*;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "credit_purchases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub credits: i32,
    pub amount_paid: i32,  // cents
    #[sea_orm(unique)]
    pub external_session_id: String,
    pub external_customer_id: Option<String>,
    pub external_payment_id: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub receipt_url: Option<String>,
    pub status: String,  // pending, completed, failed
    #[sea_orm(column_type = "TimestampWithTimeZone")]
    pub created_at: DateTimeUtc,
    #[sea_orm(column_type = "TimestampWithTimeZone")]
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
