use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::entity::credit_purchases::{self, STATUS_COMPLETED, STATUS_FAILED, STATUS_PENDING};
use crate::error::{Error, Result};

pub async fn insert<C: ConnectionTrait>(
    db: &C,
    purchase: credit_purchases::Model,
) -> Result<credit_purchases::Model> {
    let active: credit_purchases::ActiveModel = purchase.into();
    Ok(active.insert(db).await?)
}

pub async fn find_by_session<C: ConnectionTrait>(
    db: &C,
    session_id: &str,
) -> Result<Option<credit_purchases::Model>> {
    Ok(credit_purchases::Entity::find()
        .filter(credit_purchases::Column::ExternalSessionId.eq(session_id))
        .one(db)
        .await?)
}

pub async fn get_by_session<C: ConnectionTrait>(db: &C, session_id: &str) -> Result<credit_purchases::Model> {
    find_by_session(db, session_id)
        .await?
        .ok_or_else(|| Error::not_found("CreditPurchase", session_id))
}

/// The single terminal transition to `completed`. Zero rows means another
/// delivery of the same event already won.
pub async fn mark_completed<C: ConnectionTrait>(
    db: &C,
    purchase_id: &str,
    payment_id: Option<String>,
    receipt_url: Option<String>,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = credit_purchases::Entity::update_many()
        .col_expr(credit_purchases::Column::Status, Expr::value(STATUS_COMPLETED))
        .col_expr(credit_purchases::Column::ExternalPaymentId, Expr::value(payment_id))
        .col_expr(credit_purchases::Column::ReceiptUrl, Expr::value(receipt_url))
        .col_expr(credit_purchases::Column::UpdatedAt, Expr::value(now))
        .filter(credit_purchases::Column::Id.eq(purchase_id))
        .filter(credit_purchases::Column::Status.ne(STATUS_COMPLETED))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Only a pending purchase can fail.
pub async fn mark_failed<C: ConnectionTrait>(db: &C, purchase_id: &str, now: DateTime<Utc>) -> Result<bool> {
    let result = credit_purchases::Entity::update_many()
        .col_expr(credit_purchases::Column::Status, Expr::value(STATUS_FAILED))
        .col_expr(credit_purchases::Column::UpdatedAt, Expr::value(now))
        .filter(credit_purchases::Column::Id.eq(purchase_id))
        .filter(credit_purchases::Column::Status.eq(STATUS_PENDING))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Delete pending and failed purchases created before `cutoff`.
pub async fn delete_stale<C: ConnectionTrait>(db: &C, cutoff: DateTime<Utc>) -> Result<u64> {
    let result = credit_purchases::Entity::delete_many()
        .filter(credit_purchases::Column::Status.is_in([STATUS_PENDING, STATUS_FAILED]))
        .filter(credit_purchases::Column::CreatedAt.lt(cutoff))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn delete_by_user<C: ConnectionTrait>(db: &C, user_id: &str) -> Result<u64> {
    let result = credit_purchases::Entity::delete_many()
        .filter(credit_purchases::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
