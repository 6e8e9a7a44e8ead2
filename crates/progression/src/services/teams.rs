//! Teams: creation, starting play, resets and skipped groups

use std::collections::HashSet;

use rand::Rng;
use sea_orm::TransactionTrait;
use structure::{can_advance_early, compute_current_group};
use tracing::{debug, info};

use super::credits::CreditService;
use super::game_structure::load_for_instance;
use super::{AppContext, LoadedTeam, recount_current_counts};
use crate::entity::teams;
use crate::error::{Error, Result};
use crate::repository;

/// Letters that cannot be mistaken for digits or each other.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPRSTUVWXYZ";
const CODE_LENGTH: usize = 4;
const MAX_INSERT_ATTEMPTS: u32 = 3;

pub fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// `count` codes, distinct from each other and from `taken`.
fn generate_codes(count: usize, taken: &HashSet<String>) -> Vec<String> {
    let mut codes: Vec<String> = Vec::with_capacity(count);
    while codes.len() < count {
        let code = generate_code();
        if !taken.contains(&code) && !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

#[derive(Clone)]
pub struct TeamService {
    ctx: AppContext,
    credits: CreditService,
}

impl TeamService {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            credits: CreditService::new(ctx.clone()),
            ctx,
        }
    }

    pub async fn find_all(&self, instance_id: &str) -> Result<Vec<teams::Model>> {
        repository::teams::find_by_instance(self.ctx.conn(), instance_id).await
    }

    pub async fn get_team_by_code(&self, code: &str) -> Result<teams::Model> {
        repository::teams::get_by_code(self.ctx.conn(), code).await
    }

    /// Create `count` teams with fresh codes. A batch that loses a code race
    /// to another request is regenerated.
    pub async fn add_teams(&self, instance_id: &str, count: usize) -> Result<Vec<teams::Model>> {
        let instance = repository::instances::get(self.ctx.conn(), instance_id).await?;
        if instance.is_template {
            return Err(Error::TemplateHasNoTeams);
        }

        let mut attempt = 1;
        loop {
            match self.insert_batch(instance_id, count).await {
                Err(Error::DuplicateTeamCode(code)) if attempt < MAX_INSERT_ATTEMPTS => {
                    debug!(code, attempt, "Team code collision, regenerating batch");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn insert_batch(&self, instance_id: &str, count: usize) -> Result<Vec<teams::Model>> {
        let txn = self.ctx.conn().begin().await?;
        let mut codes = generate_codes(count, &HashSet::new());
        let taken: HashSet<String> = repository::teams::existing_codes(&txn, codes.clone())
            .await?
            .into_iter()
            .collect();
        if !taken.is_empty() {
            codes.retain(|code| !taken.contains(code));
            let mut avoid = taken;
            avoid.extend(codes.iter().cloned());
            codes.extend(generate_codes(count - codes.len(), &avoid));
        }

        let now = self.ctx.clock.now();
        let mut created = Vec::with_capacity(count);
        for code in codes {
            let team = repository::teams::new_team(uuid::Uuid::new_v4().to_string(), &code, instance_id, now);
            created.push(repository::teams::insert(&txn, team).await?);
        }
        txn.commit().await?;

        info!(instance_id, count = created.len(), "Teams added");
        Ok(created)
    }

    /// Charge the instance owner one credit and mark the team as started.
    /// Starting an already started team is a no-op.
    pub async fn start_playing(&self, code: &str) -> Result<()> {
        let code = repository::teams::normalize_code(code);
        let team = repository::teams::get_by_code(self.ctx.conn(), &code).await?;
        if team.has_started {
            return Ok(());
        }

        let txn = self.ctx.conn().begin().await?;
        let instance = repository::instances::get(&txn, &team.instance_id).await?;
        self.credits
            .deduct_credit_for_team_start(&txn, &instance.user_id, &team.id, &instance.id)
            .await?;
        if !repository::teams::mark_started(&txn, &team.id, self.ctx.clock.now()).await? {
            debug!(team = %code, "Team started by a concurrent request");
            return Ok(());
        }
        txn.commit().await?;

        info!(team = %code, user_id = %instance.user_id, "Team started");
        Ok(())
    }

    /// Put teams back to a clean slate and recount who is at each location.
    pub async fn reset_teams(&self, instance_id: &str, codes: &[String]) -> Result<()> {
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

        let now = self.ctx.clock.now();
        repository::teams::reset(&txn, codes.clone(), now).await?;
        repository::check_ins::delete_by_teams(&txn, codes.clone()).await?;
        repository::block_states::delete_by_teams(&txn, codes.clone()).await?;
        recount_current_counts(&txn, instance_id).await?;
        txn.commit().await?;

        info!(instance_id, teams = codes.len(), "Teams reset");
        Ok(())
    }

    /// Move past the team's current group before finishing it.
    pub async fn skip_group(&self, code: &str, group_id: &str) -> Result<Vec<String>> {
        let txn = self.ctx.conn().begin().await?;
        let team = LoadedTeam::load(&txn, code).await?;
        let tree = load_for_instance(&txn, &team.instance).await?;
        let completed = team.completed_location_ids();
        let mut skipped = team.team.skipped_groups();

        let current = compute_current_group(&tree, &completed, &skipped)
            .filter(|group| group.id == group_id)
            .ok_or_else(|| Error::InvalidInput(format!("group {group_id} is not the team's current group")))?;
        if !can_advance_early(current, &completed) {
            return Err(Error::InvalidInput(format!("group {group_id} cannot be skipped yet")));
        }

        skipped.push(group_id.to_string());
        repository::teams::set_skipped_groups(&txn, team.code(), &skipped, self.ctx.clock.now()).await?;
        txn.commit().await?;

        info!(team = %team.code(), group_id, "Group skipped");
        Ok(skipped)
    }
}
