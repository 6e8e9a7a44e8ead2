use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::Result;

/// A team's progress on one block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerState {
    pub block_id: String,
    pub team_code: String,
    pub data: Option<Value>,
    pub complete: bool,
    pub points_awarded: i32,
}

impl PlayerState {
    pub fn new(block_id: impl Into<String>, team_code: impl Into<String>) -> Self {
        Self {
            block_id: block_id.into(),
            team_code: team_code.into(),
            ..Default::default()
        }
    }

    /// Decode the block-specific player data, defaulting when none is stored yet.
    pub fn player_data<T: DeserializeOwned + Default>(&self) -> Result<T> {
        match &self.data {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => Ok(serde_json::from_value(value.clone())?),
        }
    }

    pub fn set_player_data<T: Serialize>(&mut self, data: &T) -> Result<()> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(())
    }
}
