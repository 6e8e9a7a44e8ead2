use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use serde_json::Value;

use crate::entity::instances;
use crate::error::{Error, Result};

pub async fn find<C: ConnectionTrait>(db: &C, instance_id: &str) -> Result<Option<instances::Model>> {
    Ok(instances::Entity::find_by_id(instance_id.to_string()).one(db).await?)
}

pub async fn get<C: ConnectionTrait>(db: &C, instance_id: &str) -> Result<instances::Model> {
    find(db, instance_id)
        .await?
        .ok_or_else(|| Error::not_found("Instance", instance_id))
}

pub async fn find_by_user<C: ConnectionTrait>(db: &C, user_id: &str) -> Result<Vec<instances::Model>> {
    Ok(instances::Entity::find()
        .filter(instances::Column::UserId.eq(user_id))
        .all(db)
        .await?)
}

pub async fn insert<C: ConnectionTrait>(db: &C, instance: instances::Model) -> Result<instances::Model> {
    let active: instances::ActiveModel = instance.into();
    Ok(active.insert(db).await?)
}

pub async fn update_structure<C: ConnectionTrait>(
    db: &C,
    instance_id: &str,
    structure: Value,
    now: DateTime<Utc>,
) -> Result<()> {
    let active = instances::ActiveModel {
        id: Set(instance_id.to_string()),
        game_structure: Set(Some(structure)),
        updated_at: Set(now),
        ..Default::default()
    };
    active.update(db).await?;
    Ok(())
}

pub async fn delete_many<C: ConnectionTrait>(db: &C, instance_ids: Vec<String>) -> Result<u64> {
    if instance_ids.is_empty() {
        return Ok(0);
    }
    let result = instances::Entity::delete_many()
        .filter(instances::Column::Id.is_in(instance_ids))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
