use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};

use crate::entity::check_ins;
use crate::error::{Error, Result};

pub async fn find<C: ConnectionTrait>(
    db: &C,
    team_code: &str,
    location_id: &str,
) -> Result<Option<check_ins::Model>> {
    Ok(
        check_ins::Entity::find_by_id((team_code.to_string(), location_id.to_string()))
            .one(db)
            .await?,
    )
}

pub async fn get<C: ConnectionTrait>(
    db: &C,
    team_code: &str,
    location_id: &str,
) -> Result<check_ins::Model> {
    find(db, team_code, location_id)
        .await?
        .ok_or_else(|| Error::not_found("CheckIn", format!("{team_code}/{location_id}")))
}

/// A team's check-ins, oldest first.
pub async fn find_by_team<C: ConnectionTrait>(db: &C, team_code: &str) -> Result<Vec<check_ins::Model>> {
    Ok(check_ins::Entity::find()
        .filter(check_ins::Column::TeamCode.eq(team_code))
        .order_by_asc(check_ins::Column::TimeIn)
        .all(db)
        .await?)
}

/// Insert a visit. The composite primary key is the uniqueness guard, so a
/// racing duplicate surfaces as [`Error::AlreadyCheckedIn`].
pub async fn insert<C: ConnectionTrait>(db: &C, check_in: check_ins::Model) -> Result<check_ins::Model> {
    let active: check_ins::ActiveModel = check_in.into();
    active.insert(db).await.map_err(|e| {
        if Error::is_unique_violation(&e) {
            Error::AlreadyCheckedIn
        } else {
            e.into()
        }
    })
}

/// Close an open visit and add the base points.
pub async fn check_out<C: ConnectionTrait>(
    db: &C,
    team_code: &str,
    location_id: &str,
    points: i32,
    time_out: DateTime<Utc>,
) -> Result<()> {
    let result = check_ins::Entity::update_many()
        .col_expr(check_ins::Column::TimeOut, Expr::value(Some(time_out)))
        .col_expr(check_ins::Column::Points, Expr::col(check_ins::Column::Points).add(points))
        .col_expr(check_ins::Column::MustCheckOut, Expr::value(false))
        .filter(check_ins::Column::TeamCode.eq(team_code))
        .filter(check_ins::Column::LocationId.eq(location_id))
        .filter(check_ins::Column::TimeOut.is_null())
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("CheckIn", format!("{team_code}/{location_id}")));
    }
    Ok(())
}

/// Flag a visit's blocks as finished. Idempotent.
pub async fn complete_blocks<C: ConnectionTrait>(db: &C, team_code: &str, location_id: &str) -> Result<()> {
    check_ins::Entity::update_many()
        .col_expr(check_ins::Column::BlocksCompleted, Expr::value(true))
        .filter(check_ins::Column::TeamCode.eq(team_code))
        .filter(check_ins::Column::LocationId.eq(location_id))
        .filter(check_ins::Column::BlocksCompleted.eq(false))
        .exec(db)
        .await?;
    Ok(())
}

/// Teams still inside `location_id`.
pub async fn count_open_at<C: ConnectionTrait>(db: &C, location_id: &str) -> Result<u64> {
    Ok(check_ins::Entity::find()
        .filter(check_ins::Column::LocationId.eq(location_id))
        .filter(check_ins::Column::MustCheckOut.eq(true))
        .filter(check_ins::Column::TimeOut.is_null())
        .count(db)
        .await?)
}

pub async fn delete_by_teams<C: ConnectionTrait>(db: &C, team_codes: Vec<String>) -> Result<u64> {
    if team_codes.is_empty() {
        return Ok(0);
    }
    let result = check_ins::Entity::delete_many()
        .filter(check_ins::Column::TeamCode.is_in(team_codes))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn delete_by_locations<C: ConnectionTrait>(db: &C, location_ids: Vec<String>) -> Result<u64> {
    if location_ids.is_empty() {
        return Ok(0);
    }
    let result = check_ins::Entity::delete_many()
        .filter(check_ins::Column::LocationId.is_in(location_ids))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn delete_by_instances<C: ConnectionTrait>(db: &C, instance_ids: Vec<String>) -> Result<u64> {
    if instance_ids.is_empty() {
        return Ok(0);
    }
    let result = check_ins::Entity::delete_many()
        .filter(check_ins::Column::InstanceId.is_in(instance_ids))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
