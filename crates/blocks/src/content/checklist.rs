use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::block::{Content, parse_points_into};
use crate::context::BlockContext;
use crate::error::Result;
use crate::input::{self, Input};
use crate::state::PlayerState;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecklistItem {
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecklistBlock {
    pub content: String,
    pub items: Vec<ChecklistItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
struct ChecklistData {
    checked_items: BTreeSet<String>,
}

impl Content for ChecklistBlock {
    const TYPE: &'static str = "checklist";
    const CONTEXTS: &'static [BlockContext] = &[BlockContext::LocationContent];

    fn requires_validation(&self) -> bool {
        true
    }

    /// Items come in as parallel `checklist_items` / `checklist_item_ids` lists;
    /// blank descriptions are dropped and new items get a fresh id.
    fn update(&mut self, points: &mut i32, input: &Input) -> Result<()> {
        parse_points_into(points, input)?;
        if let Some(content) = input::first(input, "content") {
            self.content = content.to_string();
        }
        let ids = input::all(input, "checklist_item_ids");
        self.items = input::all(input, "checklist_items")
            .iter()
            .enumerate()
            .filter(|(_, description)| !description.trim().is_empty())
            .map(|(i, description)| ChecklistItem {
                id: ids
                    .get(i)
                    .filter(|id| !id.is_empty())
                    .cloned()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                description: description.clone(),
            })
            .collect();
        Ok(())
    }

    /// Checked items accumulate across submissions; the block completes once
    /// every item has been checked.
    fn validate(&self, points: i32, mut state: PlayerState, input: &Input) -> Result<PlayerState> {
        let mut data: ChecklistData = state.player_data()?;
        for id in input::all(input, "checklist_item") {
            if self.items.iter().any(|item| &item.id == id) {
                data.checked_items.insert(id.clone());
            }
        }
        state.set_player_data(&data)?;
        if self.items.iter().all(|item| data.checked_items.contains(&item.id)) {
            state.complete = true;
            state.points_awarded = points;
        }
        Ok(state)
    }
}
