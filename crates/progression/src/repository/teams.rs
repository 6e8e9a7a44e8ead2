use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde_json::json;

use crate::entity::teams;
use crate::error::{Error, Result};

/// Team codes are case-insensitive on the way in.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub async fn find_by_code<C: ConnectionTrait>(db: &C, code: &str) -> Result<Option<teams::Model>> {
    Ok(teams::Entity::find()
        .filter(teams::Column::Code.eq(normalize_code(code)))
        .one(db)
        .await?)
}

pub async fn get_by_code<C: ConnectionTrait>(db: &C, code: &str) -> Result<teams::Model> {
    let code = normalize_code(code);
    find_by_code(db, &code)
        .await?
        .ok_or_else(|| Error::not_found("Team", code))
}

pub async fn find_by_instance<C: ConnectionTrait>(db: &C, instance_id: &str) -> Result<Vec<teams::Model>> {
    Ok(teams::Entity::find()
        .filter(teams::Column::InstanceId.eq(instance_id))
        .order_by_asc(teams::Column::Code)
        .all(db)
        .await?)
}

pub async fn find_by_instances<C: ConnectionTrait>(
    db: &C,
    instance_ids: Vec<String>,
) -> Result<Vec<teams::Model>> {
    if instance_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(teams::Entity::find()
        .filter(teams::Column::InstanceId.is_in(instance_ids))
        .all(db)
        .await?)
}

pub async fn find_in_instance_by_codes<C: ConnectionTrait>(
    db: &C,
    instance_id: &str,
    codes: Vec<String>,
) -> Result<Vec<teams::Model>> {
    if codes.is_empty() {
        return Ok(Vec::new());
    }
    Ok(teams::Entity::find()
        .filter(teams::Column::InstanceId.eq(instance_id))
        .filter(teams::Column::Code.is_in(codes))
        .all(db)
        .await?)
}

/// Which of `codes` are already taken, by any instance.
pub async fn existing_codes<C: ConnectionTrait>(db: &C, codes: Vec<String>) -> Result<Vec<String>> {
    if codes.is_empty() {
        return Ok(Vec::new());
    }
    Ok(teams::Entity::find()
        .select_only()
        .column(teams::Column::Code)
        .filter(teams::Column::Code.is_in(codes))
        .into_tuple::<String>()
        .all(db)
        .await?)
}

pub async fn insert<C: ConnectionTrait>(db: &C, team: teams::Model) -> Result<teams::Model> {
    let code = team.code.clone();
    let active: teams::ActiveModel = team.into();
    active.insert(db).await.map_err(|e| {
        if Error::is_unique_violation(&e) {
            Error::DuplicateTeamCode(code)
        } else {
            e.into()
        }
    })
}

/// Add (or with a negative value, remove) points.
pub async fn add_points<C: ConnectionTrait>(
    db: &C,
    code: &str,
    points: i32,
    now: DateTime<Utc>,
) -> Result<()> {
    let result = teams::Entity::update_many()
        .col_expr(teams::Column::Points, Expr::col(teams::Column::Points).add(points))
        .col_expr(teams::Column::UpdatedAt, Expr::value(now))
        .filter(teams::Column::Code.eq(code))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("Team", code));
    }
    Ok(())
}

/// Set or clear (`""`) the location the team must check out of.
pub async fn set_must_check_out<C: ConnectionTrait>(
    db: &C,
    code: &str,
    location_id: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    teams::Entity::update_many()
        .col_expr(teams::Column::MustCheckOut, Expr::value(location_id))
        .col_expr(teams::Column::UpdatedAt, Expr::value(now))
        .filter(teams::Column::Code.eq(code))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn set_skipped_groups<C: ConnectionTrait>(
    db: &C,
    code: &str,
    group_ids: &[String],
    now: DateTime<Utc>,
) -> Result<()> {
    teams::Entity::update_many()
        .col_expr(teams::Column::SkippedGroupIds, Expr::value(json!(group_ids)))
        .col_expr(teams::Column::UpdatedAt, Expr::value(now))
        .filter(teams::Column::Code.eq(code))
        .exec(db)
        .await?;
    Ok(())
}

/// Free every team that is waiting to check out of `location_id`.
pub async fn clear_must_check_out_at<C: ConnectionTrait>(
    db: &C,
    location_id: &str,
    now: DateTime<Utc>,
) -> Result<u64> {
    let result = teams::Entity::update_many()
        .col_expr(teams::Column::MustCheckOut, Expr::value(""))
        .col_expr(teams::Column::UpdatedAt, Expr::value(now))
        .filter(teams::Column::MustCheckOut.eq(location_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Flip `has_started` once. Returns false when another request got there first.
pub async fn mark_started<C: ConnectionTrait>(db: &C, team_id: &str, now: DateTime<Utc>) -> Result<bool> {
    let result = teams::Entity::update_many()
        .col_expr(teams::Column::HasStarted, Expr::value(true))
        .col_expr(teams::Column::UpdatedAt, Expr::value(now))
        .filter(teams::Column::Id.eq(team_id))
        .filter(teams::Column::HasStarted.eq(false))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Return teams to their dormant state.
pub async fn reset<C: ConnectionTrait>(db: &C, codes: Vec<String>, now: DateTime<Utc>) -> Result<u64> {
    if codes.is_empty() {
        return Ok(0);
    }
    let result = teams::Entity::update_many()
        .col_expr(teams::Column::Points, Expr::value(0))
        .col_expr(teams::Column::HasStarted, Expr::value(false))
        .col_expr(teams::Column::MustCheckOut, Expr::value(""))
        .col_expr(teams::Column::SkippedGroupIds, Expr::value(json!([])))
        .col_expr(teams::Column::UpdatedAt, Expr::value(now))
        .filter(teams::Column::Code.is_in(codes))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn delete_by_codes<C: ConnectionTrait>(db: &C, codes: Vec<String>) -> Result<u64> {
    if codes.is_empty() {
        return Ok(0);
    }
    let result = teams::Entity::delete_many()
        .filter(teams::Column::Code.is_in(codes))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub fn new_team(
    id: impl Into<String>,
    code: &str,
    instance_id: impl Into<String>,
    now: DateTime<Utc>,
) -> teams::Model {
    teams::Model {
        id: id.into(),
        code: normalize_code(code),
        instance_id: instance_id.into(),
        name: String::new(),
        has_started: false,
        points: 0,
        must_check_out: String::new(),
        skipped_group_ids: json!([]),
        created_at: now,
        updated_at: now,
    }
}
