use thiserror::Error;

use crate::context::BlockContext;

#[derive(Error, Debug)]
pub enum BlockError {
    #[error("block type {0} not found")]
    UnknownType(String),

    #[error("block type {block_type} cannot be used in {context} context")]
    UnsupportedContext {
        block_type: String,
        context: BlockContext,
    },

    #[error("invalid block configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("player data error: {0}")]
    PlayerData(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BlockError>;
