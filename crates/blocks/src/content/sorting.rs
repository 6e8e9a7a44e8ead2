use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::block::Content;
use crate::context::BlockContext;
use crate::error::{BlockError, Result};
use crate::input::{self, Input};
use crate::state::PlayerState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringScheme {
    /// One attempt; full points only for a perfect order
    #[default]
    AllOrNothing,
    /// One attempt; points proportional to items in their correct place
    CorrectItemCorrectPlace,
    /// Unlimited attempts; completes on a perfect order
    RetryUntilCorrect,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SortingItem {
    pub id: String,
    pub description: String,
    /// Correct 1-based position
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SortingBlock {
    pub content: String,
    pub items: Vec<SortingItem>,
    pub scoring_scheme: ScoringScheme,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
struct SortingData {
    player_order: Vec<String>,
    shuffle_order: Vec<String>,
    attempts: u32,
    is_correct: bool,
}

impl SortingBlock {
    fn correct_placements(&self, order: &[String]) -> usize {
        if order.len() != self.items.len() {
            return 0;
        }
        let positions: HashMap<&str, u32> = self
            .items
            .iter()
            .map(|item| (item.id.as_str(), item.position))
            .collect();
        order
            .iter()
            .enumerate()
            .filter(|(i, id)| positions.get(id.as_str()) == Some(&(*i as u32 + 1)))
            .count()
    }

    /// Item ids in the order first shown to a team. Stable per (block, team).
    pub fn shuffled_item_ids(&self, block_id: &str, team_code: &str) -> Vec<String> {
        let mut ranked: Vec<([u8; 8], &str)> = self
            .items
            .iter()
            .map(|item| {
                let digest = Sha256::new()
                    .chain_update(block_id.as_bytes())
                    .chain_update(team_code.as_bytes())
                    .chain_update(item.id.as_bytes())
                    .finalize();
                let mut key = [0u8; 8];
                key.copy_from_slice(&digest[..8]);
                (key, item.id.as_str())
            })
            .collect();
        ranked.sort();
        ranked.into_iter().map(|(_, id)| id.to_string()).collect()
    }
}

impl Content for SortingBlock {
    const TYPE: &'static str = "sorting";
    const CONTEXTS: &'static [BlockContext] = &[BlockContext::LocationContent];

    fn requires_validation(&self) -> bool {
        true
    }

    fn update(&mut self, points: &mut i32, input: &Input) -> Result<()> {
        *points = input::points(input)?.unwrap_or(0);
        if let Some(content) = input::first(input, "content") {
            self.content = content.to_string();
        }
        self.scoring_scheme = match input::first(input, "scoring_scheme") {
            None | Some("") | Some("all_or_nothing") => ScoringScheme::AllOrNothing,
            Some("correct_item_correct_place") => ScoringScheme::CorrectItemCorrectPlace,
            Some("retry_until_correct") => ScoringScheme::RetryUntilCorrect,
            Some(other) => {
                return Err(BlockError::InvalidInput(format!("unknown scoring scheme: {other}")));
            }
        };

        let ids = input::all(input, "sorting_item_ids");
        self.items = input::all(input, "sorting_items")
            .iter()
            .enumerate()
            .filter(|(_, description)| !description.is_empty())
            .map(|(i, description)| SortingItem {
                id: ids
                    .get(i)
                    .filter(|id| !id.is_empty())
                    .cloned()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                description: description.clone(),
                position: i as u32 + 1,
            })
            .collect();
        Ok(())
    }

    fn validate(&self, points: i32, mut state: PlayerState, input: &Input) -> Result<PlayerState> {
        let mut data: SortingData = state.player_data()?;
        if self.scoring_scheme == ScoringScheme::RetryUntilCorrect && data.is_correct && state.complete {
            return Ok(state);
        }

        let order = input::all(input, "sorting_item_order");
        if order.is_empty() {
            return Err(BlockError::InvalidInput("sorting order is required".to_string()));
        }
        if data.shuffle_order.is_empty() {
            data.shuffle_order = self.shuffled_item_ids(&state.block_id, &state.team_code);
        }

        let placed = self.correct_placements(order);
        let perfect = !self.items.is_empty() && placed == self.items.len();
        data.player_order = order.to_vec();
        data.attempts += 1;
        data.is_correct = perfect;
        state.set_player_data(&data)?;

        match self.scoring_scheme {
            ScoringScheme::RetryUntilCorrect => {
                state.complete = perfect;
                state.points_awarded = if perfect { points } else { 0 };
            }
            ScoringScheme::AllOrNothing => {
                state.complete = true;
                state.points_awarded = if perfect { points } else { 0 };
            }
            ScoringScheme::CorrectItemCorrectPlace => {
                state.complete = true;
                state.points_awarded = if self.items.is_empty() {
                    0
                } else {
                    (points as f64 * placed as f64 / self.items.len() as f64) as i32
                };
            }
        }
        Ok(state)
    }
}
