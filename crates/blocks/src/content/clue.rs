use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::block::Content;
use crate::context::BlockContext;
use crate::error::Result;
use crate::input::{self, Input};
use crate::state::PlayerState;

const DEFAULT_BUTTON_LABEL: &str = "Reveal Clue";
const NO_CLUES: &str = "No clues available";

/// A clue the team pays points to reveal. Points are stored as a cost (negative).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClueBlock {
    pub clue_text: String,
    pub description_text: String,
    pub button_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
struct ClueData {
    is_revealed: bool,
}

impl Content for ClueBlock {
    const TYPE: &'static str = "clue";
    const CONTEXTS: &'static [BlockContext] =
        &[BlockContext::LocationContent, BlockContext::LocationClues];

    fn requires_validation(&self) -> bool {
        true
    }

    fn update(&mut self, points: &mut i32, input: &Input) -> Result<()> {
        *points = -input::points(input)?.unwrap_or(0).abs();
        if let Some(text) = input::first(input, "clue_text") {
            self.clue_text = text.to_string();
        }
        if let Some(text) = input::first(input, "description_text") {
            self.description_text = text.to_string();
        }
        self.button_label = match input::first(input, "button_label") {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => DEFAULT_BUTTON_LABEL.to_string(),
        };
        Ok(())
    }

    fn validate(&self, points: i32, mut state: PlayerState, input: &Input) -> Result<PlayerState> {
        if input::first(input, "reveal_clue") == Some("true") {
            state.set_player_data(&ClueData { is_revealed: true })?;
            state.complete = true;
            state.points_awarded = points;
        }
        Ok(state)
    }
}

/// Shows one of several clues, picked per team.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomClueBlock {
    pub clues: Vec<String>,
}

impl RandomClueBlock {
    /// The clue shown to `team_code`: the first 8 bytes of
    /// `sha256(team_code + block_id)` as a big-endian integer, modulo the clue count.
    pub fn clue_for_team(&self, block_id: &str, team_code: &str) -> &str {
        if self.clues.is_empty() {
            return NO_CLUES;
        }
        let digest = Sha256::digest(format!("{team_code}{block_id}").as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        let index = u64::from_be_bytes(prefix) % self.clues.len() as u64;
        &self.clues[index as usize]
    }
}

impl Content for RandomClueBlock {
    const TYPE: &'static str = "random_clue";
    const CONTEXTS: &'static [BlockContext] = &[BlockContext::LocationClues];

    /// Empty strings are dropped; whitespace-only clues are kept as written.
    fn update(&mut self, _points: &mut i32, input: &Input) -> Result<()> {
        if input.contains_key("clues") {
            self.clues = input::all(input, "clues")
                .iter()
                .filter(|clue| !clue.is_empty())
                .cloned()
                .collect();
        }
        Ok(())
    }
}
