//! Block service: block CRUD and per-team state materialisation

use std::collections::HashMap;

use blocks::{Block, BlockContext, Input, PlayerState};
use sea_orm::{ConnectionTrait, TransactionTrait};
use tracing::{debug, info};
use uuid::Uuid;

use super::{AppContext, DeleteService};
use crate::error::{Error, Result};
use crate::repository;

#[derive(Clone)]
pub struct BlockService {
    ctx: AppContext,
}

impl BlockService {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub async fn get_by_block_id(&self, block_id: &str) -> Result<Block> {
        repository::blocks::get(self.ctx.conn(), block_id).await
    }

    pub async fn find_by_owner(&self, owner_id: &str, context: BlockContext) -> Result<Vec<Block>> {
        repository::blocks::find_by_owner(self.ctx.conn(), owner_id, context).await
    }

    /// Create an empty block of `block_type` at the end of the owner's list.
    pub async fn new_block(&self, owner_id: &str, context: BlockContext, block_type: &str) -> Result<Block> {
        if owner_id.is_empty() {
            return Err(Error::InvalidInput("owner id must not be empty".to_string()));
        }
        if block_type.is_empty() {
            return Err(Error::InvalidInput("block type must not be empty".to_string()));
        }

        let txn = self.ctx.conn().begin().await?;
        let order = repository::blocks::count_for_owner(&txn, owner_id, context).await?;
        let block = Block::new(
            Uuid::new_v4().to_string(),
            owner_id,
            context,
            block_type,
            i32::try_from(order).unwrap_or(i32::MAX),
        )?;
        repository::blocks::insert(&txn, &block).await?;
        txn.commit().await?;

        info!(block_id = %block.id, owner_id, %context, block_type, "Block created");
        Ok(block)
    }

    /// Apply an admin edit through the block type's own schema.
    pub async fn update_block(&self, block_id: &str, input: &Input) -> Result<Block> {
        let db = self.ctx.conn();
        let mut block = repository::blocks::get(db, block_id).await?;
        block.update_block_data(input)?;
        repository::blocks::update(db, &block).await?;
        Ok(block)
    }

    /// Rewrite the ordering of one owner's blocks to match `block_ids`.
    pub async fn reorder_blocks(
        &self,
        owner_id: &str,
        context: BlockContext,
        block_ids: &[String],
    ) -> Result<()> {
        let txn = self.ctx.conn().begin().await?;
        let existing = repository::blocks::find_by_owner(&txn, owner_id, context).await?;
        if existing.len() != block_ids.len()
            || !existing.iter().all(|block| block_ids.contains(&block.id))
        {
            return Err(Error::InvalidInput(format!(
                "reorder must list every block of {owner_id} exactly once"
            )));
        }
        for (ordering, block_id) in block_ids.iter().enumerate() {
            repository::blocks::set_ordering(&txn, block_id, ordering as i32).await?;
        }
        txn.commit().await?;
        Ok(())
    }

    /// Delete a block, its states and any upload only it referenced.
    pub async fn delete_block(&self, block_id: &str) -> Result<()> {
        DeleteService::new(self.ctx.clone()).delete_block(block_id).await
    }

    /// A state that lives only for the current request.
    pub fn new_mock_state(&self, block_id: &str, team_code: &str) -> PlayerState {
        PlayerState::new(block_id, team_code)
    }

    /// Blocks of one owner with the team's state for each.
    ///
    /// Missing states are created and persisted when the block needs validation
    /// and a team is given; every other missing state is a transient mock.
    pub async fn find_by_owner_and_team_with_state<C: ConnectionTrait>(
        &self,
        db: &C,
        owner_id: &str,
        team_code: &str,
        context: BlockContext,
    ) -> Result<(Vec<Block>, HashMap<String, PlayerState>)> {
        let blocks = repository::blocks::find_by_owner(db, owner_id, context).await?;
        let block_ids = blocks.iter().map(|block| block.id.clone()).collect();
        let mut states: HashMap<String, PlayerState> =
            repository::block_states::find_for_team(db, team_code, block_ids)
                .await?
                .into_iter()
                .map(|state| (state.block_id.clone(), state))
                .collect();

        for block in &blocks {
            if states.contains_key(&block.id) {
                continue;
            }
            let state = if block.requires_validation() && !team_code.is_empty() {
                self.persisted_state(db, &block.id, team_code).await?
            } else {
                self.new_mock_state(&block.id, team_code)
            };
            states.insert(block.id.clone(), state);
        }

        Ok((blocks, states))
    }

    /// A block and the team's state for it, creating the state if needed.
    pub async fn get_block_with_state<C: ConnectionTrait>(
        &self,
        db: &C,
        block_id: &str,
        team_code: &str,
    ) -> Result<(Block, PlayerState)> {
        let block = repository::blocks::get(db, block_id).await?;
        let state = match repository::block_states::find(db, block_id, team_code).await? {
            Some(state) => state,
            None => self.persisted_state(db, block_id, team_code).await?,
        };
        Ok((block, state))
    }

    /// Create a state row, or read back the one a concurrent request just made.
    async fn persisted_state<C: ConnectionTrait>(
        &self,
        db: &C,
        block_id: &str,
        team_code: &str,
    ) -> Result<PlayerState> {
        let state = PlayerState::new(block_id, team_code);
        match repository::block_states::insert(db, &state, self.ctx.clock.now()).await {
            Ok(()) => {
                debug!(block_id, team = team_code, "Block state created");
                Ok(state)
            }
            Err(Error::Database(e)) if Error::is_unique_violation(&e) => {
                repository::block_states::find(db, block_id, team_code)
                    .await?
                    .ok_or_else(|| Error::not_found("PlayerState", format!("{block_id}/{team_code}")))
            }
            Err(e) => Err(e),
        }
    }

    /// Persist a state change. False when the state was already complete.
    pub async fn update_state<C: ConnectionTrait>(&self, db: &C, state: &PlayerState) -> Result<bool> {
        repository::block_states::update_if_incomplete(db, state, self.ctx.clock.now()).await
    }

    /// Whether any content block at the location needs player input.
    pub async fn check_validation_required_for_location<C: ConnectionTrait>(
        &self,
        db: &C,
        location_id: &str,
    ) -> Result<bool> {
        repository::blocks::any_requires_validation(db, location_id).await
    }

    /// True while any validating block at the location is not complete for the team.
    pub async fn check_validation_required_for_check_in<C: ConnectionTrait>(
        &self,
        db: &C,
        location_id: &str,
        team_code: &str,
    ) -> Result<bool> {
        let (blocks, states) = self
            .find_by_owner_and_team_with_state(db, location_id, team_code, BlockContext::LocationContent)
            .await?;
        Ok(blocks
            .iter()
            .filter(|block| block.requires_validation())
            .any(|block| !states.get(&block.id).is_some_and(|state| state.complete)))
    }
}
