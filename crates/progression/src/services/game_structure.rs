use std::collections::HashSet;

use sea_orm::ConnectionTrait;
use structure::{GameStructure, ensure_all_locations_included, validate_structure};
use tracing::{debug, info};

use super::AppContext;
use crate::entity::instances;
use crate::error::Result;
use crate::repository;

/// Loads and saves an instance's game structure.
#[derive(Clone)]
pub struct GameStructureService {
    ctx: AppContext,
}

/// The instance's tree, reconciled with its current locations: ids of deleted
/// locations are dropped and new locations are appended to the root as
/// ungrouped, outside routing until an admin places them in a group.
pub async fn load_for_instance<C: ConnectionTrait>(
    db: &C,
    instance: &instances::Model,
) -> Result<GameStructure> {
    let mut tree = match &instance.game_structure {
        Some(value) if !value.is_null() => GameStructure::from_json(value)?,
        _ => GameStructure::new_root(format!("root-{}", instance.id)),
    };

    let location_ids: Vec<String> = repository::locations::find_by_instance(db, &instance.id)
        .await?
        .into_iter()
        .map(|location| location.id)
        .collect();

    let known: HashSet<&str> = location_ids.iter().map(String::as_str).collect();
    for stale in tree
        .all_location_ids()
        .into_iter()
        .filter(|id| !known.contains(id.as_str()))
    {
        tree.remove_location(&stale);
    }

    let added = ensure_all_locations_included(&mut tree, &location_ids);
    if !added.is_empty() {
        debug!(instance_id = %instance.id, added = added.len(), "Locations appended to root group");
    }
    Ok(tree)
}

impl GameStructureService {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub async fn load(&self, instance_id: &str) -> Result<GameStructure> {
        let instance = repository::instances::get(self.ctx.conn(), instance_id).await?;
        load_for_instance(self.ctx.conn(), &instance).await
    }

    /// Validate and persist a tree. Instance locations the tree does not
    /// mention are appended to the root group first.
    pub async fn save(&self, instance_id: &str, mut tree: GameStructure) -> Result<GameStructure> {
        let db = self.ctx.conn();
        repository::instances::get(db, instance_id).await?;

        let location_ids: Vec<String> = repository::locations::find_by_instance(db, instance_id)
            .await?
            .into_iter()
            .map(|location| location.id)
            .collect();
        ensure_all_locations_included(&mut tree, &location_ids);
        validate_structure(&tree)?;

        repository::instances::update_structure(db, instance_id, tree.to_json()?, self.ctx.clock.now())
            .await?;
        info!(instance_id, groups = tree.sub_groups.len(), "Game structure saved");
        Ok(tree)
    }

    /// The group that holds `location_id` in the instance's tree.
    pub async fn find_group_by_location_id(
        &self,
        instance_id: &str,
        location_id: &str,
    ) -> Result<Option<GameStructure>> {
        let tree = self.load(instance_id).await?;
        Ok(tree.group_containing_location(location_id).cloned())
    }
}
