use std::collections::HashMap;

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

use crate::entity::locations;
use crate::error::{Error, Result};

pub async fn find<C: ConnectionTrait>(db: &C, location_id: &str) -> Result<Option<locations::Model>> {
    Ok(locations::Entity::find_by_id(location_id.to_string()).one(db).await?)
}

pub async fn get<C: ConnectionTrait>(db: &C, location_id: &str) -> Result<locations::Model> {
    find(db, location_id)
        .await?
        .ok_or_else(|| Error::not_found("Location", location_id))
}

/// Resolve a scanned marker code inside one instance.
pub async fn find_by_instance_and_marker<C: ConnectionTrait>(
    db: &C,
    instance_id: &str,
    marker_code: &str,
) -> Result<Option<locations::Model>> {
    Ok(locations::Entity::find()
        .filter(locations::Column::InstanceId.eq(instance_id))
        .filter(locations::Column::MarkerId.eq(marker_code))
        .one(db)
        .await?)
}

/// Same as [`find_by_instance_and_marker`], holding a row lock until the
/// transaction ends so visit ordinals are read consistently.
pub async fn lock_by_instance_and_marker<C: ConnectionTrait>(
    db: &C,
    instance_id: &str,
    marker_code: &str,
) -> Result<Option<locations::Model>> {
    Ok(locations::Entity::find()
        .filter(locations::Column::InstanceId.eq(instance_id))
        .filter(locations::Column::MarkerId.eq(marker_code))
        .lock_exclusive()
        .one(db)
        .await?)
}

pub async fn find_by_instance<C: ConnectionTrait>(
    db: &C,
    instance_id: &str,
) -> Result<Vec<locations::Model>> {
    Ok(locations::Entity::find()
        .filter(locations::Column::InstanceId.eq(instance_id))
        .order_by_asc(locations::Column::Ordering)
        .all(db)
        .await?)
}

pub async fn ids_by_instances<C: ConnectionTrait>(
    db: &C,
    instance_ids: Vec<String>,
) -> Result<Vec<String>> {
    if instance_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(locations::Entity::find()
        .select_only()
        .column(locations::Column::Id)
        .filter(locations::Column::InstanceId.is_in(instance_ids))
        .into_tuple::<String>()
        .all(db)
        .await?)
}

/// Locations in the order of `ids`. Unknown ids are skipped.
pub async fn find_by_ids<C: ConnectionTrait>(db: &C, ids: &[String]) -> Result<Vec<locations::Model>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut by_id: HashMap<String, locations::Model> = locations::Entity::find()
        .filter(locations::Column::Id.is_in(ids.to_vec()))
        .all(db)
        .await?
        .into_iter()
        .map(|location| (location.id.clone(), location))
        .collect();
    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

pub async fn insert<C: ConnectionTrait>(db: &C, location: locations::Model) -> Result<locations::Model> {
    let active: locations::ActiveModel = location.into();
    Ok(active.insert(db).await?)
}

/// A team arrived: both counters go up.
pub async fn record_arrival<C: ConnectionTrait>(db: &C, location_id: &str) -> Result<()> {
    let result = locations::Entity::update_many()
        .col_expr(
            locations::Column::TotalVisits,
            Expr::col(locations::Column::TotalVisits).add(1),
        )
        .col_expr(
            locations::Column::CurrentCount,
            Expr::col(locations::Column::CurrentCount).add(1),
        )
        .filter(locations::Column::Id.eq(location_id))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::not_found("Location", location_id));
    }
    Ok(())
}

/// A team left: fold the stay into the running average and drop the head count.
pub async fn record_departure<C: ConnectionTrait>(
    db: &C,
    location: &locations::Model,
    stay_secs: f64,
) -> Result<()> {
    let visits = f64::from(location.total_visits);
    let avg_duration = (location.avg_duration * visits + stay_secs) / (visits + 1.0);
    locations::Entity::update_many()
        .col_expr(locations::Column::AvgDuration, Expr::value(avg_duration))
        .filter(locations::Column::Id.eq(location.id.as_str()))
        .exec(db)
        .await?;
    // A recount may already have released this team's slot.
    locations::Entity::update_many()
        .col_expr(
            locations::Column::CurrentCount,
            Expr::col(locations::Column::CurrentCount).sub(1),
        )
        .filter(locations::Column::Id.eq(location.id.as_str()))
        .filter(locations::Column::CurrentCount.gt(0))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn set_current_count<C: ConnectionTrait>(
    db: &C,
    location_id: &str,
    current_count: i32,
) -> Result<()> {
    locations::Entity::update_many()
        .col_expr(locations::Column::CurrentCount, Expr::value(current_count))
        .filter(locations::Column::Id.eq(location_id))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn delete_many<C: ConnectionTrait>(db: &C, location_ids: Vec<String>) -> Result<u64> {
    if location_ids.is_empty() {
        return Ok(0);
    }
    let result = locations::Entity::delete_many()
        .filter(locations::Column::Id.is_in(location_ids))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
