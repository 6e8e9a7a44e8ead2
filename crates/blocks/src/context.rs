use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BlockError;

/// Where a block is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockContext {
    /// Regular content shown after checking in to a location
    LocationContent,
    /// Clues that lead players to a location
    LocationClues,
    /// Instance lobby page
    Lobby,
    /// Instance finish page
    Finish,
}

impl BlockContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockContext::LocationContent => "location_content",
            BlockContext::LocationClues => "location_clues",
            BlockContext::Lobby => "lobby",
            BlockContext::Finish => "finish",
        }
    }
}

impl fmt::Display for BlockContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockContext {
    type Err = BlockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "location_content" => Ok(BlockContext::LocationContent),
            "location_clues" => Ok(BlockContext::LocationClues),
            "lobby" => Ok(BlockContext::Lobby),
            "finish" => Ok(BlockContext::Finish),
            other => Err(BlockError::InvalidInput(format!("unknown block context: {other}"))),
        }
    }
}
