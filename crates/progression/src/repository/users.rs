use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};

use crate::entity::users;
use crate::error::{Error, Result};

/// Which counter a credit movement touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditBucket {
    Free,
    Paid,
}

pub async fn find<C: ConnectionTrait>(db: &C, user_id: &str) -> Result<Option<users::Model>> {
    Ok(users::Entity::find_by_id(user_id.to_string()).one(db).await?)
}

pub async fn get<C: ConnectionTrait>(db: &C, user_id: &str) -> Result<users::Model> {
    find(db, user_id)
        .await?
        .ok_or_else(|| Error::not_found("User", user_id))
}

pub async fn insert<C: ConnectionTrait>(db: &C, user: users::Model) -> Result<users::Model> {
    let active: users::ActiveModel = user.into();
    Ok(active.insert(db).await?)
}

/// Take one credit, free first. The WHERE clause is the guard: a row is only
/// updated while the counter is positive, so concurrent callers can never
/// drive it below zero. Returns `None` when both counters are empty.
pub async fn deduct_one_credit<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<CreditBucket>> {
    let free = users::Entity::update_many()
        .col_expr(users::Column::FreeCredits, Expr::col(users::Column::FreeCredits).sub(1))
        .col_expr(users::Column::UpdatedAt, Expr::value(now))
        .filter(users::Column::Id.eq(user_id))
        .filter(users::Column::FreeCredits.gt(0))
        .exec(db)
        .await?;
    if free.rows_affected == 1 {
        return Ok(Some(CreditBucket::Free));
    }

    let paid = users::Entity::update_many()
        .col_expr(users::Column::PaidCredits, Expr::col(users::Column::PaidCredits).sub(1))
        .col_expr(users::Column::UpdatedAt, Expr::value(now))
        .filter(users::Column::Id.eq(user_id))
        .filter(users::Column::PaidCredits.gt(0))
        .exec(db)
        .await?;
    if paid.rows_affected == 1 {
        return Ok(Some(CreditBucket::Paid));
    }

    Ok(None)
}

/// Add to both counters in one statement.
pub async fn add_credits<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    free: i32,
    paid: i32,
    now: DateTime<Utc>,
) -> Result<()> {
    let result = users::Entity::update_many()
        .col_expr(users::Column::FreeCredits, Expr::col(users::Column::FreeCredits).add(free))
        .col_expr(users::Column::PaidCredits, Expr::col(users::Column::PaidCredits).add(paid))
        .col_expr(users::Column::UpdatedAt, Expr::value(now))
        .filter(users::Column::Id.eq(user_id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("User", user_id));
    }
    Ok(())
}

/// Users of one class holding exactly `free_credits`, locked for update.
pub async fn lock_with_free_credits<C: ConnectionTrait>(
    db: &C,
    is_educator: bool,
    free_credits: i32,
) -> Result<Vec<users::Model>> {
    Ok(users::Entity::find()
        .filter(users::Column::IsEducator.eq(is_educator))
        .filter(users::Column::FreeCredits.eq(free_credits))
        .lock_exclusive()
        .all(db)
        .await?)
}

/// Raise the listed users' free credits to `ceiling`. The filter on the old
/// value keeps a concurrent debit from being overwritten.
pub async fn raise_free_credits<C: ConnectionTrait>(
    db: &C,
    user_ids: Vec<String>,
    from: i32,
    ceiling: i32,
    now: DateTime<Utc>,
) -> Result<u64> {
    if user_ids.is_empty() {
        return Ok(0);
    }
    let result = users::Entity::update_many()
        .col_expr(users::Column::FreeCredits, Expr::value(ceiling))
        .col_expr(users::Column::UpdatedAt, Expr::value(now))
        .filter(users::Column::Id.is_in(user_ids))
        .filter(users::Column::FreeCredits.eq(from))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn delete<C: ConnectionTrait>(db: &C, user_id: &str) -> Result<u64> {
    let result = users::Entity::delete_by_id(user_id.to_string()).exec(db).await?;
    Ok(result.rows_affected)
}

pub fn new_user(
    id: impl Into<String>,
    email: impl Into<String>,
    name: impl Into<String>,
    is_educator: bool,
    now: DateTime<Utc>,
) -> users::Model {
    users::Model {
        id: id.into(),
        email: email.into(),
        name: name.into(),
        free_credits: 0,
        paid_credits: 0,
        monthly_credit_limit: 0,
        is_educator,
        created_at: now,
        updated_at: now,
    }
}
