//! Serde model of the game structure tree
//!
//! Field names are part of the persisted wire format and must stay stable.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StructureError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionType {
    #[default]
    All,
    Minimum,
}

/// Which locations inside the current group are offered next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    #[default]
    FreeRoam,
    Ordered,
    Random,
    ScavengerHunt,
}

/// How the player UI renders the group. Only `Tasks` and `Custom` change what
/// the navigation view loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationMode {
    #[default]
    Map,
    MapAndNames,
    Names,
    Custom,
    Tasks,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameStructure {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub routing: RoutingStrategy,
    #[serde(default)]
    pub navigation: NavigationMode,
    #[serde(default)]
    pub completion_type: CompletionType,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub minimum_required: u32,
    /// Candidates offered at once under random routing (0 is treated as 1)
    #[serde(default, skip_serializing_if = "is_zero")]
    pub max_next: u32,
    #[serde(default)]
    pub auto_advance: bool,
    #[serde(default)]
    pub is_root: bool,
    #[serde(default)]
    pub location_ids: Vec<String>,
    #[serde(default)]
    pub sub_groups: Vec<GameStructure>,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl GameStructure {
    /// Create an empty root container.
    pub fn new_root(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_root: true,
            ..Default::default()
        }
    }

    /// Create a visible group with free-roam routing that requires every location.
    pub fn new_group(
        id: impl Into<String>,
        name: impl Into<String>,
        color: impl Into<String>,
        location_ids: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: color.into(),
            auto_advance: true,
            location_ids,
            ..Default::default()
        }
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).map_err(|e| StructureError::Malformed(e.to_string()))
    }

    pub fn to_json(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| StructureError::Malformed(e.to_string()))
    }

    /// Depth-first search including `self`.
    pub fn find_group_by_id(&self, group_id: &str) -> Option<&GameStructure> {
        if self.id == group_id {
            return Some(self);
        }
        self.sub_groups
            .iter()
            .find_map(|group| group.find_group_by_id(group_id))
    }

    pub fn find_group_by_id_mut(&mut self, group_id: &str) -> Option<&mut GameStructure> {
        if self.id == group_id {
            return Some(self);
        }
        self.sub_groups
            .iter_mut()
            .find_map(|group| group.find_group_by_id_mut(group_id))
    }

    /// Every location id in the tree, flattened in declaration order.
    pub fn all_location_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        self.collect_location_ids(&mut ids);
        ids
    }

    fn collect_location_ids(&self, ids: &mut Vec<String>) {
        ids.extend(self.location_ids.iter().cloned());
        for group in &self.sub_groups {
            group.collect_location_ids(ids);
        }
    }

    /// The group whose own `location_ids` contains `location_id`.
    pub fn group_containing_location(&self, location_id: &str) -> Option<&GameStructure> {
        if self.location_ids.iter().any(|id| id == location_id) {
            return Some(self);
        }
        self.sub_groups
            .iter()
            .find_map(|group| group.group_containing_location(location_id))
    }

    /// First direct child of the root, if this node is a root.
    pub fn first_visible_group(&self) -> Option<&GameStructure> {
        if !self.is_root {
            return None;
        }
        self.sub_groups.first()
    }

    /// Remove a location id from whichever group holds it.
    pub fn remove_location(&mut self, location_id: &str) -> bool {
        let before = self.location_ids.len();
        self.location_ids.retain(|id| id != location_id);
        if self.location_ids.len() != before {
            return true;
        }
        self.sub_groups
            .iter_mut()
            .any(|group| group.remove_location(location_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> GameStructure {
        let mut root = GameStructure::new_root("root");
        root.location_ids = vec!["loose".into()];
        let mut museum = GameStructure::new_group("museum", "Museum", "primary", vec!["a".into(), "b".into()]);
        museum
            .sub_groups
            .push(GameStructure::new_group("annex", "Annex", "accent", vec!["c".into()]));
        root.sub_groups.push(museum);
        root.sub_groups
            .push(GameStructure::new_group("park", "Park", "secondary", vec!["d".into()]));
        root
    }

    #[test]
    fn test_find_group_by_id() {
        let root = sample();
        assert_eq!(root.find_group_by_id("root").map(|g| g.is_root), Some(true));
        assert_eq!(root.find_group_by_id("annex").map(|g| g.name.as_str()), Some("Annex"));
        assert!(root.find_group_by_id("missing").is_none());
    }

    #[test]
    fn test_all_location_ids_in_declaration_order() {
        assert_eq!(sample().all_location_ids(), vec!["loose", "a", "b", "c", "d"]);
    }

    #[test]
    fn test_group_containing_location() {
        let root = sample();
        assert_eq!(root.group_containing_location("c").map(|g| g.id.as_str()), Some("annex"));
        assert_eq!(root.group_containing_location("loose").map(|g| g.id.as_str()), Some("root"));
        assert!(root.group_containing_location("zzz").is_none());
    }

    #[test]
    fn test_first_visible_group_requires_root() {
        let root = sample();
        assert_eq!(root.first_visible_group().map(|g| g.id.as_str()), Some("museum"));
        assert!(root.sub_groups[0].first_visible_group().is_none());
    }

    #[test]
    fn test_json_field_names_are_stable() {
        let value = sample().to_json().unwrap();
        assert_eq!(value["is_root"], json!(true));
        assert_eq!(value["sub_groups"][0]["completion_type"], json!("all"));
        assert_eq!(value["sub_groups"][0]["routing"], json!("free_roam"));
        assert_eq!(value["sub_groups"][0]["location_ids"], json!(["a", "b"]));
        assert!(value["sub_groups"][0].get("minimum_required").is_none());

        let parsed = GameStructure::from_json(&value).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_from_json_defaults_missing_fields() {
        let parsed = GameStructure::from_json(&json!({"id": "root", "is_root": true})).unwrap();
        assert!(parsed.location_ids.is_empty());
        assert_eq!(parsed.routing, RoutingStrategy::FreeRoam);

        let err = GameStructure::from_json(&json!({"name": "no id"})).unwrap_err();
        assert!(matches!(err, StructureError::Malformed(_)));
    }

    #[test]
    fn test_remove_location() {
        let mut root = sample();
        assert!(root.remove_location("c"));
        assert!(!root.remove_location("c"));
        assert_eq!(root.all_location_ids(), vec!["loose", "a", "b", "d"]);
    }
}
