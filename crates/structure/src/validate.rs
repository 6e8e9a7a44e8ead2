use std::collections::HashSet;

use crate::error::{Result, StructureError};
use crate::model::{CompletionType, GameStructure, RoutingStrategy};

/// Check the structural rules a saved tree must satisfy.
pub fn validate_structure(tree: &GameStructure) -> Result<()> {
    if !tree.is_root {
        return Err(StructureError::MissingRoot);
    }
    if tree.sub_groups.is_empty() {
        return Err(StructureError::NoVisibleGroups);
    }

    let mut group_ids = HashSet::new();
    let mut location_ids = HashSet::new();
    validate_group(tree, true, &mut group_ids, &mut location_ids)
}

fn validate_group<'a>(
    group: &'a GameStructure,
    is_top: bool,
    group_ids: &mut HashSet<&'a str>,
    location_ids: &mut HashSet<&'a str>,
) -> Result<()> {
    if !group_ids.insert(group.id.as_str()) {
        return Err(StructureError::DuplicateGroupId(group.id.clone()));
    }
    for id in &group.location_ids {
        if !location_ids.insert(id.as_str()) {
            return Err(StructureError::DuplicateLocationId(id.clone()));
        }
    }

    if !is_top {
        if group.is_root {
            return Err(StructureError::NestedRoot(group.id.clone()));
        }
        if group.name.trim().is_empty() {
            return Err(StructureError::MissingGroupName(group.id.clone()));
        }
        if group.color.trim().is_empty() {
            return Err(StructureError::MissingGroupColor(group.id.clone()));
        }
    }
    if group.routing == RoutingStrategy::Ordered && group.completion_type != CompletionType::All {
        return Err(StructureError::OrderedRequiresAll(group.id.clone()));
    }
    if group.completion_type == CompletionType::Minimum && group.minimum_required == 0 {
        return Err(StructureError::InvalidMinimum(group.id.clone()));
    }

    for child in &group.sub_groups {
        validate_group(child, false, group_ids, location_ids)?;
    }
    Ok(())
}

/// Append every id in `location_ids` missing from the tree to the root group.
///
/// Returns the ids that were added.
pub fn ensure_all_locations_included(tree: &mut GameStructure, location_ids: &[String]) -> Vec<String> {
    let present: HashSet<String> = tree.all_location_ids().into_iter().collect();
    let missing: Vec<String> = location_ids
        .iter()
        .filter(|id| !present.contains(*id))
        .cloned()
        .collect();
    tree.location_ids.extend(missing.iter().cloned());
    missing
}
