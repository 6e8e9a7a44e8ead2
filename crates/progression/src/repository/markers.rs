use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::entity::markers;
use crate::error::{Error, Result};

/// Normalise a scanned or typed code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub async fn find<C: ConnectionTrait>(db: &C, code: &str) -> Result<Option<markers::Model>> {
    Ok(markers::Entity::find_by_id(normalize_code(code)).one(db).await?)
}

pub async fn find_by_codes<C: ConnectionTrait>(db: &C, codes: Vec<String>) -> Result<Vec<markers::Model>> {
    if codes.is_empty() {
        return Ok(Vec::new());
    }
    Ok(markers::Entity::find()
        .filter(markers::Column::Code.is_in(codes))
        .all(db)
        .await?)
}

pub async fn insert<C: ConnectionTrait>(db: &C, mut marker: markers::Model) -> Result<markers::Model> {
    marker.code = normalize_code(&marker.code);
    validate(&marker)?;
    let active: markers::ActiveModel = marker.into();
    Ok(active.insert(db).await?)
}

fn validate(marker: &markers::Model) -> Result<()> {
    if marker.code.is_empty() {
        return Err(Error::InvalidInput("marker code must not be empty".to_string()));
    }
    if !(-90.0..=90.0).contains(&marker.lat) {
        return Err(Error::InvalidInput(format!(
            "latitude {} is outside [-90, 90]",
            marker.lat
        )));
    }
    if !(-180.0..=180.0).contains(&marker.lng) {
        return Err(Error::InvalidInput(format!(
            "longitude {} is outside [-180, 180]",
            marker.lng
        )));
    }
    Ok(())
}
