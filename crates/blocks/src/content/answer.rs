//! Blocks that complete when the team submits a secret value.

use serde::{Deserialize, Serialize};

use crate::block::{Content, parse_points_into};
use crate::context::BlockContext;
use crate::error::{BlockError, Result};
use crate::input::{self, Input};
use crate::state::PlayerState;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
struct GuessData {
    attempts: u32,
    guesses: Vec<String>,
}

fn record_guess(state: &mut PlayerState, guess: &str) -> Result<()> {
    let mut data: GuessData = state.player_data()?;
    data.attempts += 1;
    data.guesses.push(guess.to_string());
    state.set_player_data(&data)
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerBlock {
    pub prompt: String,
    pub answer: String,
    /// Ignore case and surrounding whitespace when comparing
    pub fuzzy: bool,
}

impl AnswerBlock {
    fn matches(&self, guess: &str) -> bool {
        if self.fuzzy {
            guess.trim().eq_ignore_ascii_case(self.answer.trim())
        } else {
            guess == self.answer
        }
    }
}

impl Content for AnswerBlock {
    const TYPE: &'static str = "answer";
    const CONTEXTS: &'static [BlockContext] = &[BlockContext::LocationContent];

    fn requires_validation(&self) -> bool {
        true
    }

    fn update(&mut self, points: &mut i32, input: &Input) -> Result<()> {
        parse_points_into(points, input)?;
        let (Some(prompt), Some(answer)) = (input::first(input, "prompt"), input::first(input, "answer")) else {
            return Err(BlockError::InvalidInput(
                "prompt and answer are required fields".to_string(),
            ));
        };
        self.prompt = prompt.to_string();
        self.answer = answer.to_string();
        self.fuzzy = input::flag(input, "fuzzy");
        Ok(())
    }

    fn validate(&self, points: i32, mut state: PlayerState, input: &Input) -> Result<PlayerState> {
        let guess = input::first(input, "answer")
            .ok_or_else(|| BlockError::InvalidInput("answer is a required field".to_string()))?;
        record_guess(&mut state, guess)?;
        if self.matches(guess) {
            state.complete = true;
            state.points_awarded = points;
        }
        Ok(state)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PincodeBlock {
    pub prompt: String,
    pub pincode: String,
    pub unlocked_content: String,
}

impl Content for PincodeBlock {
    const TYPE: &'static str = "pincode";
    const CONTEXTS: &'static [BlockContext] = &[BlockContext::LocationContent];

    fn requires_validation(&self) -> bool {
        true
    }

    fn update(&mut self, points: &mut i32, input: &Input) -> Result<()> {
        parse_points_into(points, input)?;
        let (Some(prompt), Some(pincode)) = (input::first(input, "prompt"), input::first(input, "pincode")) else {
            return Err(BlockError::InvalidInput(
                "prompt and pincode are required fields".to_string(),
            ));
        };
        self.prompt = prompt.to_string();
        self.pincode = pincode.to_string();
        if let Some(content) = input::first(input, "unlocked_content") {
            self.unlocked_content = content.to_string();
        }
        Ok(())
    }

    /// Each submitted `pincode` value is one character of the code.
    fn validate(&self, points: i32, mut state: PlayerState, input: &Input) -> Result<PlayerState> {
        let chars = input::all(input, "pincode");
        if chars.is_empty() {
            return Err(BlockError::InvalidInput("pincode is a required field".to_string()));
        }
        if chars.len() < self.pincode.chars().count() {
            return Err(BlockError::InvalidInput(
                "pincode length does not match the required length".to_string(),
            ));
        }
        if chars.iter().any(|c| c.chars().count() != 1) {
            return Err(BlockError::InvalidInput(
                "pincode must be a single character per input".to_string(),
            ));
        }
        let entered: String = chars.concat();
        record_guess(&mut state, &entered)?;
        if entered == self.pincode {
            state.complete = true;
            state.points_awarded = points;
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::from_pairs;

    fn answer_block() -> AnswerBlock {
        AnswerBlock {
            prompt: "Who built the lighthouse?".into(),
            answer: "Grace".into(),
            fuzzy: false,
        }
    }

    #[test]
    fn test_answer_exact_match() {
        let block = answer_block();
        let state = block
            .validate(10, PlayerState::new("b", "TEAM"), &from_pairs([("answer", "grace")]))
            .unwrap();
        assert!(!state.complete);
        assert_eq!(state.points_awarded, 0);

        let state = block.validate(10, state, &from_pairs([("answer", "Grace")])).unwrap();
        assert!(state.complete);
        assert_eq!(state.points_awarded, 10);

        let data: GuessData = state.player_data().unwrap();
        assert_eq!(data.attempts, 2);
        assert_eq!(data.guesses, vec!["grace", "Grace"]);
    }

    #[test]
    fn test_answer_fuzzy_match() {
        let block = AnswerBlock {
            fuzzy: true,
            ..answer_block()
        };
        let state = block
            .validate(3, PlayerState::new("b", "TEAM"), &from_pairs([("answer", "  GRACE ")]))
            .unwrap();
        assert!(state.complete);
    }

    #[test]
    fn test_answer_requires_input() {
        let err = answer_block()
            .validate(10, PlayerState::new("b", "TEAM"), &Input::new())
            .unwrap_err();
        assert!(matches!(err, BlockError::InvalidInput(_)));
    }

    #[test]
    fn test_answer_update_requires_fields() {
        let mut block = AnswerBlock::default();
        let mut points = 0;
        assert!(block.update(&mut points, &from_pairs([("prompt", "Q")])).is_err());
        block
            .update(&mut points, &from_pairs([("prompt", "Q"), ("answer", "A"), ("points", "7"), ("fuzzy", "on")]))
            .unwrap();
        assert_eq!(points, 7);
        assert!(block.fuzzy);
    }

    #[test]
    fn test_pincode_validation() {
        let block = PincodeBlock {
            pincode: "12345".into(),
            ..Default::default()
        };
        let fresh = || PlayerState::new("b", "TEAM");

        let wrong = block
            .validate(8, fresh(), &from_pairs([("pincode", "9"), ("pincode", "8"), ("pincode", "7"), ("pincode", "6"), ("pincode", "5")]))
            .unwrap();
        assert!(!wrong.complete);

        let short = block.validate(8, fresh(), &from_pairs([("pincode", "1"), ("pincode", "2")]));
        assert!(short.is_err());

        let wide = block.validate(
            8,
            fresh(),
            &from_pairs([("pincode", "12"), ("pincode", "3"), ("pincode", "4"), ("pincode", "5"), ("pincode", "6")]),
        );
        assert!(wide.is_err());

        let right = block
            .validate(8, fresh(), &from_pairs(["1", "2", "3", "4", "5"].map(|c| ("pincode", c))))
            .unwrap();
        assert!(right.complete);
        assert_eq!(right.points_awarded, 8);
        let data: GuessData = right.player_data().unwrap();
        assert_eq!(data.guesses, vec!["12345"]);
    }
}
