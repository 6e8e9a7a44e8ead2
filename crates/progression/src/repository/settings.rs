use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::entity::instance_settings;
use crate::error::{Error, Result};

pub async fn get<C: ConnectionTrait>(db: &C, instance_id: &str) -> Result<instance_settings::Model> {
    instance_settings::Entity::find_by_id(instance_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("InstanceSettings", instance_id))
}

pub async fn insert<C: ConnectionTrait>(
    db: &C,
    settings: instance_settings::Model,
) -> Result<instance_settings::Model> {
    let active: instance_settings::ActiveModel = settings.into();
    Ok(active.insert(db).await?)
}

pub async fn delete_many<C: ConnectionTrait>(db: &C, instance_ids: Vec<String>) -> Result<u64> {
    if instance_ids.is_empty() {
        return Ok(0);
    }
    let result = instance_settings::Entity::delete_many()
        .filter(instance_settings::Column::InstanceId.is_in(instance_ids))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Default settings row for a new instance.
pub fn defaults(instance_id: impl Into<String>) -> instance_settings::Model {
    instance_settings::Model {
        instance_id: instance_id.into(),
        must_check_out: false,
        enable_points: true,
        enable_bonus_points: false,
        show_leaderboard: true,
    }
}
