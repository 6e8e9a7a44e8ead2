//! Check-in service: the two-phase visit state machine

use blocks::{Block, BlockContext, Input, PlayerState};
use sea_orm::TransactionTrait;
use tracing::{debug, info};

use super::{AppContext, BlockService, LoadedTeam, NavigationService};
use crate::entity::check_ins;
use crate::error::{Error, Result};
use crate::repository;

const BONUS_FIRST_VISIT: f64 = 1.0;
const BONUS_SECOND_VISIT: f64 = 0.5;
const BONUS_THIRD_VISIT: f64 = 0.2;

/// Whether a block interaction is real or an admin preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Live,
    /// Fresh transient state, nothing persisted, no points
    Preview,
}

/// Points recorded on a new check-in and awarded to the team straight away.
///
/// `previous_visits` is the location's visit count before this one. When the
/// team must check out, only the bonus is paid now and the base points follow
/// at checkout.
pub fn check_in_points(
    base: i32,
    previous_visits: i32,
    must_check_out: bool,
    bonus_enabled: bool,
) -> i32 {
    let bonus = if bonus_enabled {
        match previous_visits {
            0 => BONUS_FIRST_VISIT,
            1 => BONUS_SECOND_VISIT,
            2 => BONUS_THIRD_VISIT,
            _ => 0.0,
        }
    } else {
        0.0
    };
    let multiplier = if must_check_out { bonus } else { 1.0 + bonus };
    (f64::from(base) * multiplier) as i32
}

#[derive(Clone)]
pub struct CheckInService {
    ctx: AppContext,
    navigation: NavigationService,
    blocks: BlockService,
}

impl CheckInService {
    pub fn new(ctx: AppContext) -> Self {
        Self {
            navigation: NavigationService::new(ctx.clone()),
            blocks: BlockService::new(ctx.clone()),
            ctx,
        }
    }

    /// Record a team's arrival at the location behind `marker_code`.
    pub async fn check_in(&self, team_code: &str, marker_code: &str) -> Result<check_ins::Model> {
        let marker_code = repository::markers::normalize_code(marker_code);
        let txn = self.ctx.conn().begin().await?;
        let team = LoadedTeam::load(&txn, team_code).await?;
        let code = team.code().to_string();

        if !team.team.must_check_out.is_empty() {
            let blocking = repository::locations::find(&txn, &team.team.must_check_out).await?;
            if blocking.is_none_or(|location| location.marker_id != marker_code) {
                return Err(Error::AlreadyCheckedIn);
            }
        }

        let location = repository::locations::lock_by_instance_and_marker(
            &txn,
            &team.instance.id,
            &marker_code,
        )
        .await?
        .ok_or_else(|| Error::LocationNotFound(marker_code.clone()))?;

        if team.has_checked_in(&location.id) {
            return Err(Error::AlreadyCheckedIn);
        }
        if !self
            .navigation
            .is_valid_location(&txn, &team, &marker_code)
            .await?
        {
            return Err(Error::InvalidLocation(marker_code));
        }

        let validation_required = self
            .blocks
            .check_validation_required_for_location(&txn, &location.id)
            .await?;

        let must_check_out = team.settings.must_check_out;
        let points = check_in_points(
            location.points,
            location.total_visits,
            must_check_out,
            team.settings.enable_bonus_points,
        );
        let now = self.ctx.clock.now();

        let record = repository::check_ins::insert(
            &txn,
            check_ins::Model {
                team_code: code.clone(),
                location_id: location.id.clone(),
                instance_id: team.instance.id.clone(),
                time_in: now,
                time_out: None,
                must_check_out,
                points,
                blocks_completed: !validation_required,
            },
        )
        .await?;
        repository::locations::record_arrival(&txn, &location.id).await?;
        if points != 0 {
            repository::teams::add_points(&txn, &code, points, now).await?;
        }
        if must_check_out {
            repository::teams::set_must_check_out(&txn, &code, &location.id, now).await?;
        }
        txn.commit().await?;

        info!(
            team = %code,
            location_id = %location.id,
            points,
            visit = location.total_visits + 1,
            "Checked in"
        );
        Ok(record)
    }

    /// Close the team's open visit and pay the location's base points.
    pub async fn check_out(&self, team_code: &str, marker_code: &str) -> Result<check_ins::Model> {
        let marker_code = repository::markers::normalize_code(marker_code);
        let txn = self.ctx.conn().begin().await?;
        let team = LoadedTeam::load(&txn, team_code).await?;
        let code = team.code().to_string();

        if team.team.must_check_out.is_empty() {
            return Err(Error::UnnecessaryCheckOut);
        }
        let location = repository::locations::lock_by_instance_and_marker(
            &txn,
            &team.instance.id,
            &marker_code,
        )
        .await?
        .ok_or_else(|| Error::LocationNotFound(marker_code.clone()))?;
        if team.team.must_check_out != location.id {
            return Err(Error::CheckOutAtWrongLocation);
        }
        if self
            .blocks
            .check_validation_required_for_check_in(&txn, &location.id, &code)
            .await?
        {
            return Err(Error::UnfinishedCheckIn);
        }

        let mut record = repository::check_ins::get(&txn, &code, &location.id).await?;
        let now = self.ctx.clock.now();
        let stay_secs = ((now - record.time_in).num_milliseconds().max(0) as f64) / 1000.0;

        repository::check_ins::check_out(&txn, &code, &location.id, location.points, now).await?;
        repository::teams::add_points(&txn, &code, location.points, now).await?;
        repository::locations::record_departure(&txn, &location, stay_secs).await?;
        repository::teams::set_must_check_out(&txn, &code, "", now).await?;
        txn.commit().await?;

        record.time_out = Some(now);
        record.points += location.points;
        record.must_check_out = false;
        info!(team = %code, location_id = %location.id, stay_secs, "Checked out");
        Ok(record)
    }

    /// Run player input through a block. The block id travels in the `block` field.
    pub async fn validate_and_update_block_state(
        &self,
        team_code: &str,
        input: &Input,
        mode: Mode,
    ) -> Result<(PlayerState, Block)> {
        let block_id = blocks::input::first(input, "block")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::InvalidInput("block id must be set".to_string()))?
            .to_string();

        if mode == Mode::Preview {
            let block = self.blocks.get_by_block_id(&block_id).await?;
            let state = self.blocks.new_mock_state(&block_id, team_code);
            let state = block.validate_player_input(state, input)?;
            return Ok((state, block));
        }

        let txn = self.ctx.conn().begin().await?;
        let team = repository::teams::get_by_code(&txn, team_code).await?;
        let (block, state) = self
            .blocks
            .get_block_with_state(&txn, &block_id, &team.code)
            .await?;
        if state.complete {
            txn.commit().await?;
            return Ok((state, block));
        }

        let state = block.validate_player_input(state, input)?;
        if !self.blocks.update_state(&txn, &state).await? {
            debug!(block_id = %block_id, team = %team.code, "Block completed by a concurrent request");
            let current = repository::block_states::find(&txn, &block_id, &team.code)
                .await?
                .unwrap_or(state);
            return Ok((current, block));
        }

        if state.complete {
            let now = self.ctx.clock.now();
            // The block's own score stays on the state; the team earns the block's points.
            if block.points() != 0 {
                repository::teams::add_points(&txn, &team.code, block.points(), now).await?;
            }
            if block.context == BlockContext::LocationContent
                && !self
                    .blocks
                    .check_validation_required_for_check_in(&txn, &block.owner_id, &team.code)
                    .await?
            {
                repository::check_ins::complete_blocks(&txn, &team.code, &block.owner_id).await?;
            }
        }
        txn.commit().await?;

        debug!(
            block_id = %block_id,
            team = %team.code,
            complete = state.complete,
            "Block state updated"
        );
        Ok((state, block))
    }
}
