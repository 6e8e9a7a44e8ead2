use ::blocks::PlayerState;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::entity::block_states::{ActiveModel, Column, Entity, Model};
use crate::error::Result;

pub fn to_state(model: Model) -> PlayerState {
    PlayerState {
        block_id: model.block_id,
        team_code: model.team_code,
        data: model.player_data,
        complete: model.is_complete,
        points_awarded: model.points_awarded,
    }
}

pub async fn find<C: ConnectionTrait>(db: &C, block_id: &str, team_code: &str) -> Result<Option<PlayerState>> {
    Ok(Entity::find_by_id((block_id.to_string(), team_code.to_string()))
        .one(db)
        .await?
        .map(to_state))
}

/// A team's states for the given blocks.
pub async fn find_for_team<C: ConnectionTrait>(
    db: &C,
    team_code: &str,
    block_ids: Vec<String>,
) -> Result<Vec<PlayerState>> {
    if block_ids.is_empty() {
        return Ok(Vec::new());
    }
    let models = Entity::find()
        .filter(Column::TeamCode.eq(team_code))
        .filter(Column::BlockId.is_in(block_ids))
        .all(db)
        .await?;
    Ok(models.into_iter().map(to_state).collect())
}

pub async fn insert<C: ConnectionTrait>(db: &C, state: &PlayerState, now: DateTime<Utc>) -> Result<()> {
    let active: ActiveModel = Model {
        block_id: state.block_id.clone(),
        team_code: state.team_code.clone(),
        player_data: state.data.clone(),
        is_complete: state.complete,
        points_awarded: state.points_awarded,
        created_at: now,
        updated_at: now,
    }
    .into();
    active.insert(db).await?;
    Ok(())
}

/// Save a state that has not completed yet. A completed state is immutable, so
/// zero rows (returned as false) means a concurrent request completed it first.
pub async fn update_if_incomplete<C: ConnectionTrait>(
    db: &C,
    state: &PlayerState,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = Entity::update_many()
        .col_expr(Column::PlayerData, Expr::value(state.data.clone()))
        .col_expr(Column::IsComplete, Expr::value(state.complete))
        .col_expr(Column::PointsAwarded, Expr::value(state.points_awarded))
        .col_expr(Column::UpdatedAt, Expr::value(now))
        .filter(Column::BlockId.eq(state.block_id.as_str()))
        .filter(Column::TeamCode.eq(state.team_code.as_str()))
        .filter(Column::IsComplete.eq(false))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

pub async fn delete_by_blocks<C: ConnectionTrait>(db: &C, block_ids: Vec<String>) -> Result<u64> {
    if block_ids.is_empty() {
        return Ok(0);
    }
    let result = Entity::delete_many()
        .filter(Column::BlockId.is_in(block_ids))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

pub async fn delete_by_teams<C: ConnectionTrait>(db: &C, team_codes: Vec<String>) -> Result<u64> {
    if team_codes.is_empty() {
        return Ok(0);
    }
    let result = Entity::delete_many()
        .filter(Column::TeamCode.is_in(team_codes))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
