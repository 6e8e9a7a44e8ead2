//! Cascading deletes
//!
//! Each public operation is one transaction. Image files shown by deleted
//! blocks are removed only after the commit, on a detached task.

use sea_orm::{ConnectionTrait, TransactionTrait};
use structure::GameStructure;
use tracing::{error, info, warn};

use super::{AppContext, recount_current_counts};
use crate::error::{Error, Result};
use crate::repository;
use crate::uploads::{self, UploadStore};

#[derive(Clone)]
pub struct DeleteService {
    ctx: AppContext,
    store: UploadStore,
}

impl DeleteService {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            store: UploadStore::from_config(&ctx.config),
            ctx,
        }
    }

    fn cleanup_uploads(&self, urls: Vec<String>) {
        uploads::spawn_cleanup(self.ctx.db.clone(), self.store.clone(), urls);
    }

    /// Remove a user with everything they own and their credit history.
    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        if user_id.is_empty() {
            return Err(Error::NotAuthenticated);
        }
        let txn = self.ctx.conn().begin().await?;
        let instance_ids: Vec<String> = repository::instances::find_by_user(&txn, user_id)
            .await?
            .into_iter()
            .map(|instance| instance.id)
            .collect();
        let urls = delete_instances(&txn, instance_ids)
            .await
            .inspect_err(|e| error!(user_id, error = %e, "Failed to delete user instances"))?;
        repository::team_start_logs::delete_by_user(&txn, user_id).await?;
        repository::purchases::delete_by_user(&txn, user_id).await?;
        repository::credit_adjustments::delete_by_user(&txn, user_id).await?;
        repository::users::delete(&txn, user_id).await?;
        txn.commit().await?;

        info!(user_id, "User deleted");
        self.cleanup_uploads(urls);
        Ok(())
    }

    /// Remove an instance the caller owns.
    pub async fn delete_instance(&self, user_id: &str, instance_id: &str) -> Result<()> {
        if user_id.is_empty() {
            return Err(Error::NotAuthenticated);
        }
        if instance_id.is_empty() {
            return Err(Error::InvalidInput("instance id cannot be empty".to_string()));
        }

        let txn = self.ctx.conn().begin().await?;
        let instance = repository::instances::get(&txn, instance_id).await?;
        if instance.user_id != user_id {
            return Err(Error::PermissionDenied("instance belongs to another user".to_string()));
        }
        let urls = delete_instances(&txn, vec![instance.id.clone()])
            .await
            .inspect_err(|e| error!(instance_id, error = %e, "Failed to delete instance"))?;
        txn.commit().await?;

        info!(user_id, instance_id, "Instance deleted");
        self.cleanup_uploads(urls);
        Ok(())
    }

    /// Remove a location, its content and visits, and drop it from the game structure.
    pub async fn delete_location(&self, location_id: &str) -> Result<()> {
        let txn = self.ctx.conn().begin().await?;
        let Some(location) = repository::locations::find(&txn, location_id).await? else {
            return Ok(());
        };

        let urls = delete_blocks_of_owners(&txn, vec![location.id.clone()]).await?;
        repository::check_ins::delete_by_locations(&txn, vec![location.id.clone()]).await?;
        repository::teams::clear_must_check_out_at(&txn, &location.id, self.ctx.clock.now()).await?;
        repository::locations::delete_many(&txn, vec![location.id.clone()]).await?;

        let instance = repository::instances::get(&txn, &location.instance_id).await?;
        if let Some(stored) = &instance.game_structure {
            match GameStructure::from_json(stored) {
                Ok(mut tree) => {
                    if tree.remove_location(&location.id) {
                        repository::instances::update_structure(
                            &txn,
                            &instance.id,
                            tree.to_json()?,
                            self.ctx.clock.now(),
                        )
                        .await?;
                    }
                }
                Err(e) => warn!(instance_id = %instance.id, error = %e, "Stored game structure is unreadable"),
            }
        }
        txn.commit().await?;

        info!(location_id, instance_id = %location.instance_id, "Location deleted");
        self.cleanup_uploads(urls);
        Ok(())
    }

    /// Remove teams of one instance with their check-ins and block states.
    pub async fn delete_teams(&self, instance_id: &str, codes: &[String]) -> Result<()> {
        let codes = codes
            .iter()
            .map(|code| repository::teams::normalize_code(code))
            .collect();
        let txn = self.ctx.conn().begin().await?;
        let codes: Vec<String> = repository::teams::find_in_instance_by_codes(&txn, instance_id, codes)
            .await?
            .into_iter()
            .map(|team| team.code)
            .collect();
        if codes.is_empty() {
            return Ok(());
        }

        repository::check_ins::delete_by_teams(&txn, codes.clone()).await?;
        repository::block_states::delete_by_teams(&txn, codes.clone()).await?;
        repository::teams::delete_by_codes(&txn, codes.clone()).await?;
        recount_current_counts(&txn, instance_id).await?;
        txn.commit().await?;

        info!(instance_id, teams = codes.len(), "Teams deleted");
        Ok(())
    }

    /// Remove a block and every team's state for it. Missing blocks are not an error.
    pub async fn delete_block(&self, block_id: &str) -> Result<()> {
        let txn = self.ctx.conn().begin().await?;
        let Some(block) = repository::blocks::find(&txn, block_id).await? else {
            return Ok(());
        };
        repository::block_states::delete_by_blocks(&txn, vec![block.id.clone()]).await?;
        repository::blocks::delete_many(&txn, vec![block.id.clone()]).await?;
        txn.commit().await?;

        info!(block_id, owner_id = %block.owner_id, "Block deleted");
        self.cleanup_uploads(block.media_url().map(str::to_string).into_iter().collect());
        Ok(())
    }
}

/// Delete the blocks of the given owners and their states. Returns the image
/// URLs the deleted blocks showed.
async fn delete_blocks_of_owners<C: ConnectionTrait>(db: &C, owner_ids: Vec<String>) -> Result<Vec<String>> {
    let rows = repository::blocks::rows_by_owners(db, owner_ids).await?;
    let mut block_ids = Vec::with_capacity(rows.len());
    let mut urls = Vec::new();
    for row in rows {
        block_ids.push(row.id.clone());
        match repository::blocks::to_block(row) {
            Ok(block) => urls.extend(block.media_url().map(str::to_string)),
            Err(e) => warn!(error = %e, "Skipping unreadable block while collecting uploads"),
        }
    }
    repository::block_states::delete_by_blocks(db, block_ids.clone()).await?;
    repository::blocks::delete_many(db, block_ids).await?;
    Ok(urls)
}

/// Full instance cascade: teams, check-ins, states, locations, blocks,
/// settings and the instances themselves.
async fn delete_instances<C: ConnectionTrait>(db: &C, instance_ids: Vec<String>) -> Result<Vec<String>> {
    if instance_ids.is_empty() {
        return Ok(Vec::new());
    }
    let team_codes: Vec<String> = repository::teams::find_by_instances(db, instance_ids.clone())
        .await?
        .into_iter()
        .map(|team| team.code)
        .collect();
    repository::check_ins::delete_by_instances(db, instance_ids.clone()).await?;
    repository::check_ins::delete_by_teams(db, team_codes.clone()).await?;
    repository::block_states::delete_by_teams(db, team_codes.clone()).await?;
    repository::teams::delete_by_codes(db, team_codes).await?;

    let location_ids = repository::locations::ids_by_instances(db, instance_ids.clone()).await?;
    let mut owners = location_ids.clone();
    owners.extend(instance_ids.iter().cloned());
    let urls = delete_blocks_of_owners(db, owners).await?;
    repository::locations::delete_many(db, location_ids).await?;

    repository::settings::delete_many(db, instance_ids.clone()).await?;
    repository::instances::delete_many(db, instance_ids).await?;
    Ok(urls)
}
