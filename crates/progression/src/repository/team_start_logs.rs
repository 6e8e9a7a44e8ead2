use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
};

use crate::entity::team_start_logs;
use crate::error::Result;

pub async fn insert<C: ConnectionTrait>(
    db: &C,
    log: team_start_logs::Model,
) -> Result<team_start_logs::Model> {
    let active: team_start_logs::ActiveModel = log.into();
    Ok(active.insert(db).await?)
}

/// A user's starts, newest first, optionally narrowed to an instance and a time range.
pub async fn find<C: ConnectionTrait>(
    db: &C,
    user_id: &str,
    instance_id: Option<&str>,
    range: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> Result<Vec<team_start_logs::Model>> {
    let mut query = team_start_logs::Entity::find()
        .filter(team_start_logs::Column::UserId.eq(user_id))
        .order_by_desc(team_start_logs::Column::CreatedAt);
    if let Some(instance_id) = instance_id {
        query = query.filter(team_start_logs::Column::InstanceId.eq(instance_id));
    }
    if let Some((start, end)) = range {
        query = query
            .filter(team_start_logs::Column::CreatedAt.gte(start))
            .filter(team_start_logs::Column::CreatedAt.lte(end));
    }
    Ok(query.all(db).await?)
}

pub async fn delete_by_user<C: ConnectionTrait>(db: &C, user_id: &str) -> Result<u64> {
    let result = team_start_logs::Entity::delete_many()
        .filter(team_start_logs::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
