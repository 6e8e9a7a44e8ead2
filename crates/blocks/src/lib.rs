//! Content blocks
//!
//! A block is a unit of content attached to a location (or to an instance-level
//! lobby/finish page). Every block type owns its configuration schema and its
//! validation of player input. Blocks are built from their persisted form with
//! [`Block::create_from_base_block`] and dispatched through the [`BlockKind`] enum.

pub mod block;
pub mod content;
pub mod context;
pub mod error;
pub mod input;
pub mod state;

pub use block::{BaseBlock, Block, BlockKind};
pub use context::BlockContext;
pub use error::{BlockError, Result};
pub use input::Input;
pub use state::PlayerState;
