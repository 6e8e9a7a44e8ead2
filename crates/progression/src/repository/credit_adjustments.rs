use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

use crate::entity::credit_adjustments;
use crate::error::Result;

pub async fn insert<C: ConnectionTrait>(
    db: &C,
    adjustment: credit_adjustments::Model,
) -> Result<credit_adjustments::Model> {
    let active: credit_adjustments::ActiveModel = adjustment.into();
    Ok(active.insert(db).await?)
}

/// A user's adjustments, newest first.
pub async fn find_by_user<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    limit: Option<u64>,
    offset: u64,
) -> Result<Vec<credit_adjustments::Model>> {
    let mut query = credit_adjustments::Entity::find()
        .filter(credit_adjustments::Column::UserId.eq(user_id))
        .order_by_desc(credit_adjustments::Column::CreatedAt)
        .order_by_desc(credit_adjustments::Column::Id);
    if let Some(limit) = limit {
        query = query.limit(limit).offset(offset);
    }
    Ok(query.all(db).await?)
}

/// Most recent adjustment whose reason starts with `prefix`.
pub async fn latest_with_prefix<C: ConnectionTrait>(
    db: &C,
    prefix: &str,
) -> Result<Option<credit_adjustments::Model>> {
    Ok(credit_adjustments::Entity::find()
        .filter(credit_adjustments::Column::Reason.starts_with(prefix))
        .order_by_desc(credit_adjustments::Column::CreatedAt)
        .one(db)
        .await?)
}

pub async fn delete_by_user<C: ConnectionTrait>(db: &C, user_id: &str) -> Result<u64> {
    let result = credit_adjustments::Entity::delete_many()
        .filter(credit_adjustments::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub fn new_adjustment(
    user_id: impl Into<String>,
    credits: i32,
    reason: impl Into<String>,
    purchase_id: Option<String>,
    now: DateTime<Utc>,
) -> credit_adjustments::Model {
    credit_adjustments::Model {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user_id.into(),
        credits,
        reason: reason.into(),
        purchase_id,
        created_at: now,
    }
}
