//! Pure navigation functions over a [`GameStructure`]
//!
//! Groups are visited in declaration order (pre-order). A group is *finished* for a
//! team when it is skipped, when every one of its locations has been completed, or
//! when its completion rule is met and it auto-advances. A skipped group also skips
//! its nested groups. Locations held directly by the root are ungrouped: they are
//! routed only when the tree has no visible groups.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::model::{CompletionType, GameStructure, RoutingStrategy};

/// Why [`next_group`] made a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceReason {
    /// Current group not yet complete
    GroupIncomplete,
    /// Minimum met but the group waits for a manual advance
    AutoAdvanceDisabled,
    /// Moved on because the group auto-advanced or every location is done
    Completed,
    /// Moved on because the team skipped the group
    Skipped,
    /// Nothing left to visit
    AllComplete,
    /// Group id not present in the tree
    GroupNotFound,
}

fn completed_count(group: &GameStructure, completed: &HashSet<&str>) -> usize {
    group
        .location_ids
        .iter()
        .filter(|id| completed.contains(id.as_str()))
        .count()
}

fn minimum_met(group: &GameStructure, count: usize) -> bool {
    if group.location_ids.is_empty() {
        return false;
    }
    match group.completion_type {
        CompletionType::All => count == group.location_ids.len(),
        CompletionType::Minimum => {
            let required = (group.minimum_required.max(1) as usize).min(group.location_ids.len());
            count >= required
        }
    }
}

fn is_finished(group: &GameStructure, completed: &HashSet<&str>) -> bool {
    let count = completed_count(group, completed);
    count == group.location_ids.len() || (group.auto_advance && minimum_met(group, count))
}

/// Ungrouped locations on the root are only routed when the tree has no visible groups.
fn is_routed(group: &GameStructure) -> bool {
    !group.is_root || group.sub_groups.is_empty()
}

/// Whether the group's completion rule is met. Groups without locations are never complete.
pub fn is_group_completed(group: &GameStructure, completed: &[String]) -> bool {
    let completed = to_set(completed);
    minimum_met(group, completed_count(group, &completed))
}

/// The team may manually move on: the minimum is met, the group does not
/// auto-advance, and some locations remain.
pub fn can_advance_early(group: &GameStructure, completed: &[String]) -> bool {
    if group.auto_advance || group.location_ids.is_empty() {
        return false;
    }
    let completed = to_set(completed);
    let count = completed_count(group, &completed);
    minimum_met(group, count) && count < group.location_ids.len()
}

/// First group in declaration order that still has work for the team.
///
/// Returns `None` once every group is finished or skipped.
pub fn compute_current_group<'a>(
    tree: &'a GameStructure,
    completed: &[String],
    skipped: &[String],
) -> Option<&'a GameStructure> {
    let completed = to_set(completed);
    let skipped = to_set(skipped);
    find_current(tree, &completed, &skipped)
}

fn find_current<'a>(
    group: &'a GameStructure,
    completed: &HashSet<&str>,
    skipped: &HashSet<&str>,
) -> Option<&'a GameStructure> {
    if skipped.contains(group.id.as_str()) {
        return None;
    }
    if is_routed(group) && !group.location_ids.is_empty() && !is_finished(group, completed) {
        return Some(group);
    }
    group
        .sub_groups
        .iter()
        .find_map(|child| find_current(child, completed, skipped))
}

/// True when no group has work left.
pub fn is_completed(tree: &GameStructure, completed: &[String], skipped: &[String]) -> bool {
    compute_current_group(tree, completed, skipped).is_none()
}

/// What the team should be working on once `current_group_id` is evaluated.
pub fn next_group<'a>(
    tree: &'a GameStructure,
    current_group_id: &str,
    completed: &[String],
    skipped: &[String],
) -> (Option<&'a GameStructure>, AdvanceReason) {
    let Some(current) = tree.find_group_by_id(current_group_id) else {
        return (None, AdvanceReason::GroupNotFound);
    };
    let completed_set = to_set(completed);
    let is_skipped = skipped.iter().any(|id| id == current_group_id);

    if !is_skipped
        && is_routed(current)
        && !current.location_ids.is_empty()
        && !is_finished(current, &completed_set)
    {
        let count = completed_count(current, &completed_set);
        let reason = if minimum_met(current, count) {
            AdvanceReason::AutoAdvanceDisabled
        } else {
            AdvanceReason::GroupIncomplete
        };
        return (Some(current), reason);
    }

    match compute_current_group(tree, completed, skipped) {
        Some(next) if is_skipped => (Some(next), AdvanceReason::Skipped),
        Some(next) => (Some(next), AdvanceReason::Completed),
        None => (None, AdvanceReason::AllComplete),
    }
}

/// Location ids the team may visit next inside `group_id`.
///
/// Returns an empty list when the group is unknown or fully visited.
pub fn available_location_ids(
    tree: &GameStructure,
    group_id: &str,
    completed: &[String],
    team_code: &str,
) -> Vec<String> {
    let Some(group) = tree.find_group_by_id(group_id) else {
        return Vec::new();
    };
    let completed_set = to_set(completed);
    let unvisited: Vec<String> = group
        .location_ids
        .iter()
        .filter(|id| !completed_set.contains(id.as_str()))
        .cloned()
        .collect();
    if unvisited.is_empty() {
        return unvisited;
    }

    match group.routing {
        RoutingStrategy::Ordered => unvisited.into_iter().take(1).collect(),
        RoutingStrategy::Random => {
            let limit = group.max_next.max(1) as usize;
            deterministic_pick(group, &completed_set, team_code, unvisited, limit)
        }
        RoutingStrategy::FreeRoam | RoutingStrategy::ScavengerHunt => unvisited,
    }
}

/// Rank the unvisited ids by a hash seeded on (team, group, completed-in-group)
/// and keep the first `limit`.
fn deterministic_pick(
    group: &GameStructure,
    completed: &HashSet<&str>,
    team_code: &str,
    unvisited: Vec<String>,
    limit: usize,
) -> Vec<String> {
    let mut done: Vec<&str> = group
        .location_ids
        .iter()
        .map(String::as_str)
        .filter(|id| completed.contains(id))
        .collect();
    done.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(team_code.as_bytes());
    hasher.update([0u8]);
    hasher.update(group.id.as_bytes());
    for id in &done {
        hasher.update([0u8]);
        hasher.update(id.as_bytes());
    }
    let seed = hasher.finalize();

    let mut ranked: Vec<(u64, String)> = unvisited
        .into_iter()
        .map(|id| {
            let digest = Sha256::new()
                .chain_update(seed)
                .chain_update(id.as_bytes())
                .finalize();
            let mut prefix = [0u8; 8];
            prefix.copy_from_slice(&digest[..8]);
            (u64::from_be_bytes(prefix), id)
        })
        .collect();
    ranked.sort();
    ranked.into_iter().take(limit).map(|(_, id)| id).collect()
}

fn to_set(ids: &[String]) -> HashSet<&str> {
    ids.iter().map(String::as_str).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn group(id: &str, locations: &[&str]) -> GameStructure {
        GameStructure::new_group(id, id.to_uppercase(), "primary", ids(locations))
    }

    /// G1 all(2), G2 minimum 2 of 3 without auto advance, G3 all(1)
    fn three_groups() -> GameStructure {
        let mut root = GameStructure::new_root("root");
        root.sub_groups.push(group("g1", &["a", "b"]));
        let mut g2 = group("g2", &["c", "d", "e"]);
        g2.completion_type = CompletionType::Minimum;
        g2.minimum_required = 2;
        g2.auto_advance = false;
        root.sub_groups.push(g2);
        root.sub_groups.push(group("g3", &["f"]));
        root
    }

    fn current<'a>(tree: &'a GameStructure, completed: &[&str], skipped: &[&str]) -> Option<&'a str> {
        compute_current_group(tree, &ids(completed), &ids(skipped)).map(|g| g.id.as_str())
    }

    #[test]
    fn test_current_group_walks_in_declaration_order() {
        let tree = three_groups();
        assert_eq!(current(&tree, &[], &[]), Some("g1"));
        assert_eq!(current(&tree, &["a"], &[]), Some("g1"));
        assert_eq!(current(&tree, &["a", "b"], &[]), Some("g2"));
    }

    #[test]
    fn test_root_locations_do_not_hold_up_visible_groups() {
        let mut tree = three_groups();
        tree.location_ids.push("orphan".to_string());
        assert_eq!(current(&tree, &[], &[]), Some("g1"));
        assert!(is_completed(&tree, &ids(&["a", "b", "c", "d", "e", "f"]), &[]));

        let mut bare = GameStructure::new_root("root");
        bare.location_ids = ids(&["a", "b"]);
        assert_eq!(current(&bare, &["a"], &[]), Some("root"));
        assert_eq!(available_location_ids(&bare, "root", &ids(&["a"]), "ABCD"), ids(&["b"]));
    }

    #[test]
    fn test_current_group_waits_without_auto_advance() {
        let tree = three_groups();
        assert_eq!(current(&tree, &["a", "b", "c", "d"], &[]), Some("g2"));
        assert_eq!(current(&tree, &["a", "b", "c", "d", "e"], &[]), Some("g3"));
    }

    #[test]
    fn test_skipped_group_moves_to_next() {
        let tree = three_groups();
        assert_eq!(current(&tree, &["a", "b", "c", "d"], &["g2"]), Some("g3"));
    }

    #[test]
    fn test_skipped_group_skips_nested_groups() {
        let mut tree = three_groups();
        tree.sub_groups[0].sub_groups.push(group("inner", &["x"]));
        assert_eq!(current(&tree, &["a", "b"], &[]), Some("inner"));
        assert_eq!(current(&tree, &[], &["g1"]), Some("g2"));
    }

    #[test]
    fn test_auto_advance_on_minimum() {
        let mut tree = three_groups();
        tree.sub_groups[1].auto_advance = true;
        assert_eq!(current(&tree, &["a", "b", "c", "e"], &[]), Some("g3"));
    }

    #[test]
    fn test_root_locations_come_first() {
        let mut tree = three_groups();
        tree.location_ids = ids(&["loose"]);
        assert_eq!(current(&tree, &[], &[]), Some("root"));
        assert_eq!(current(&tree, &["loose"], &[]), Some("g1"));
    }

    #[test]
    fn test_all_done_returns_none() {
        let tree = three_groups();
        assert_eq!(current(&tree, &["a", "b", "c", "d", "e", "f"], &[]), None);
        assert!(is_completed(&tree, &ids(&["a", "b", "c", "d", "f"]), &ids(&["g2"])));
        assert!(!is_completed(&tree, &ids(&["a", "b"]), &[]));
    }

    #[test]
    fn test_is_group_completed() {
        let tree = three_groups();
        let g2 = tree.find_group_by_id("g2").unwrap();
        assert!(!is_group_completed(g2, &ids(&["c"])));
        assert!(is_group_completed(g2, &ids(&["c", "e"])));
        assert!(!is_group_completed(&GameStructure::new_root("empty"), &[]));
    }

    #[test]
    fn test_minimum_larger_than_group_is_clamped() {
        let mut g = group("g", &["a", "b"]);
        g.completion_type = CompletionType::Minimum;
        g.minimum_required = 5;
        assert!(is_group_completed(&g, &ids(&["a", "b"])));
    }

    #[test]
    fn test_can_advance_early() {
        let tree = three_groups();
        let g2 = tree.find_group_by_id("g2").unwrap();
        assert!(!can_advance_early(g2, &ids(&["c"])));
        assert!(can_advance_early(g2, &ids(&["c", "d"])));
        assert!(!can_advance_early(g2, &ids(&["c", "d", "e"])));
        let g1 = tree.find_group_by_id("g1").unwrap();
        assert!(!can_advance_early(g1, &ids(&["a", "b"])));
    }

    #[test]
    fn test_next_group_reasons() {
        let tree = three_groups();
        let (g, reason) = next_group(&tree, "g1", &ids(&["a"]), &[]);
        assert_eq!((g.map(|g| g.id.as_str()), reason), (Some("g1"), AdvanceReason::GroupIncomplete));

        let (g, reason) = next_group(&tree, "g1", &ids(&["a", "b"]), &[]);
        assert_eq!((g.map(|g| g.id.as_str()), reason), (Some("g2"), AdvanceReason::Completed));

        let (g, reason) = next_group(&tree, "g2", &ids(&["a", "b", "c", "d"]), &[]);
        assert_eq!((g.map(|g| g.id.as_str()), reason), (Some("g2"), AdvanceReason::AutoAdvanceDisabled));

        let (g, reason) = next_group(&tree, "g2", &ids(&["a", "b", "c", "d"]), &ids(&["g2"]));
        assert_eq!((g.map(|g| g.id.as_str()), reason), (Some("g3"), AdvanceReason::Skipped));

        let (g, reason) = next_group(&tree, "g3", &ids(&["a", "b", "c", "d", "e", "f"]), &[]);
        assert_eq!((g.is_none(), reason), (true, AdvanceReason::AllComplete));

        let (_, reason) = next_group(&tree, "nope", &[], &[]);
        assert_eq!(reason, AdvanceReason::GroupNotFound);
    }

    #[test]
    fn test_available_free_roam_and_ordered() {
        let mut tree = three_groups();
        let completed = ids(&["a"]);
        assert_eq!(available_location_ids(&tree, "g1", &completed, "TEAM"), ids(&["b"]));

        tree.sub_groups[1].routing = RoutingStrategy::Ordered;
        assert_eq!(available_location_ids(&tree, "g2", &ids(&["c"]), "TEAM"), ids(&["d"]));

        tree.sub_groups[1].routing = RoutingStrategy::ScavengerHunt;
        assert_eq!(available_location_ids(&tree, "g2", &ids(&["d"]), "TEAM"), ids(&["c", "e"]));
    }

    #[test]
    fn test_available_empty_cases() {
        let tree = three_groups();
        assert!(available_location_ids(&tree, "missing", &[], "TEAM").is_empty());
        assert!(available_location_ids(&tree, "g1", &ids(&["a", "b"]), "TEAM").is_empty());
        assert!(available_location_ids(&tree, "root", &[], "TEAM").is_empty());
    }

    #[test]
    fn test_random_routing_is_deterministic() {
        let mut tree = three_groups();
        tree.sub_groups[1].routing = RoutingStrategy::Random;
        let first = available_location_ids(&tree, "g2", &[], "ABCD");
        assert_eq!(first.len(), 1);
        for _ in 0..10 {
            assert_eq!(available_location_ids(&tree, "g2", &[], "ABCD"), first);
        }
        // Completions outside the group do not change the choice
        assert_eq!(available_location_ids(&tree, "g2", &ids(&["a", "f"]), "ABCD"), first);

        let next = available_location_ids(&tree, "g2", &first, "ABCD");
        assert_eq!(next.len(), 1);
        assert_ne!(next, first);
    }

    #[test]
    fn test_random_routing_varies_by_team() {
        let mut root = GameStructure::new_root("root");
        let locations: Vec<String> = (0..20).map(|i| format!("loc{i}")).collect();
        let mut g = GameStructure::new_group("g", "G", "primary", locations);
        g.routing = RoutingStrategy::Random;
        root.sub_groups.push(g);

        let picks: HashSet<Vec<String>> = ["AAAA", "BBBB", "CCCC", "DDDD", "EEEE", "FFFF"]
            .iter()
            .map(|team| available_location_ids(&root, "g", &[], team))
            .collect();
        assert!(picks.len() > 1);
    }

    #[test]
    fn test_random_routing_respects_max_next() {
        let mut tree = three_groups();
        tree.sub_groups[1].routing = RoutingStrategy::Random;
        tree.sub_groups[1].max_next = 2;
        let picked = available_location_ids(&tree, "g2", &[], "WXYZ");
        assert_eq!(picked.len(), 2);
        assert!(picked.iter().all(|id| ["c", "d", "e"].contains(&id.as_str())));

        tree.sub_groups[1].max_next = 10;
        assert_eq!(available_location_ids(&tree, "g2", &ids(&["c"]), "WXYZ").len(), 2);
    }
}
