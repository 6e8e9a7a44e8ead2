use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::block::Content;
use crate::context::BlockContext;
use crate::error::{BlockError, Result};
use crate::input::{self, Input};
use crate::state::PlayerState;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizOption {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
    pub order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizBlock {
    pub question: String,
    pub options: Vec<QuizOption>,
    pub multiple_choice: bool,
    pub randomize_order: bool,
    pub retry_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
struct QuizData {
    selected_options: Vec<String>,
    attempts: u32,
    is_correct: bool,
}

impl QuizBlock {
    /// Points earned for a selection and whether it is fully correct.
    ///
    /// Single choice is all-or-nothing. Multiple choice scores every option
    /// (selected when correct, unselected when not) and awards a rounded share.
    fn score(&self, points: i32, selected: &[String]) -> (i32, bool) {
        let total_correct = self.options.iter().filter(|o| o.is_correct).count();
        if self.options.is_empty() || total_correct == 0 {
            return (0, false);
        }

        if !self.multiple_choice {
            let correct = selected.len() == 1
                && self
                    .options
                    .iter()
                    .any(|o| o.is_correct && o.id == selected[0]);
            return if correct { (points, true) } else { (0, false) };
        }

        let selected: HashSet<&str> = selected.iter().map(String::as_str).collect();
        let right = self
            .options
            .iter()
            .filter(|o| o.is_correct == selected.contains(o.id.as_str()))
            .count();
        let share = (points as f64 * right as f64 / self.options.len() as f64).round() as i32;
        (share, right == self.options.len())
    }
}

impl Content for QuizBlock {
    const TYPE: &'static str = "quiz_block";
    const CONTEXTS: &'static [BlockContext] = &[BlockContext::LocationContent];

    fn requires_validation(&self) -> bool {
        true
    }

    /// Options arrive as `option_text` values; blank ones are skipped and the
    /// option id is derived from its position (`option_N`). At least one option
    /// must be marked correct via `option_correct`.
    fn update(&mut self, points: &mut i32, input: &Input) -> Result<()> {
        *points = input::points(input)?.unwrap_or(0);
        if let Some(question) = input::first(input, "question") {
            self.question = question.to_string();
        }
        self.multiple_choice = input::flag(input, "multiple_choice");
        self.randomize_order = input::flag(input, "randomize_order");
        self.retry_enabled = input::flag(input, "retry_enabled");

        let correct = input::all(input, "option_correct");
        self.options = input::all(input, "option_text")
            .iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| {
                let id = format!("option_{i}");
                QuizOption {
                    is_correct: correct.contains(&id),
                    id,
                    text: text.clone(),
                    order: i as i32,
                }
            })
            .collect();

        if !self.options.is_empty() && !self.options.iter().any(|o| o.is_correct) {
            return Err(BlockError::InvalidInput(
                "at least one option must be marked as correct".to_string(),
            ));
        }
        Ok(())
    }

    fn validate(&self, points: i32, mut state: PlayerState, input: &Input) -> Result<PlayerState> {
        let mut data: QuizData = state.player_data()?;
        data.attempts += 1;

        let selected = input::all(input, "quiz_option");
        if selected.is_empty() {
            data.selected_options.clear();
            data.is_correct = false;
            state.set_player_data(&data)?;
            state.complete = false;
            state.points_awarded = 0;
            return Ok(state);
        }

        let (earned, correct) = self.score(points, selected);
        data.selected_options = selected.to_vec();
        data.is_correct = correct;
        state.set_player_data(&data)?;

        if !self.retry_enabled || correct {
            state.complete = true;
            state.points_awarded = earned;
        } else {
            state.complete = false;
            state.points_awarded = if self.multiple_choice { earned } else { 0 };
        }
        Ok(state)
    }
}
