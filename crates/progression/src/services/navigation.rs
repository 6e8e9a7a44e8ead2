//! Navigation service: where a team may go next

use std::collections::HashMap;

use blocks::{Block, BlockContext, PlayerState};
use sea_orm::ConnectionTrait;
use structure::{
    GameStructure, NavigationMode, RoutingStrategy, available_location_ids, can_advance_early,
    compute_current_group,
};
use tracing::debug;

use super::game_structure::load_for_instance;
use super::{AppContext, BlockService, LoadedTeam};
use crate::entity::{instance_settings, locations, markers};
use crate::error::{Error, Result};
use crate::repository;

/// A location with its marker and content blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationView {
    pub location: locations::Model,
    pub marker: Option<markers::Model>,
    pub blocks: Vec<Block>,
}

/// Everything a player screen needs to show where the team stands.
#[derive(Debug, Clone)]
pub struct PlayerNavigationView {
    pub settings: instance_settings::Model,
    pub current_group: Option<GameStructure>,
    /// Minimum met, the group waits for a manual advance, and locations remain
    pub can_advance_early: bool,
    pub must_check_out: bool,
    pub blocking_location: Option<LocationView>,
    pub next_locations: Vec<LocationView>,
    /// Filled for scavenger hunt routing and task navigation
    pub completed_locations: Vec<LocationView>,
    /// Clue blocks for the candidate locations (custom navigation only)
    pub clue_blocks: Vec<Block>,
    pub clue_states: HashMap<String, PlayerState>,
}

impl PlayerNavigationView {
    fn new(settings: instance_settings::Model) -> Self {
        Self {
            settings,
            current_group: None,
            can_advance_early: false,
            must_check_out: false,
            blocking_location: None,
            next_locations: Vec::new(),
            completed_locations: Vec::new(),
            clue_blocks: Vec::new(),
            clue_states: HashMap::new(),
        }
    }
}

#[derive(Clone)]
pub struct NavigationService {
    ctx: AppContext,
    blocks: BlockService,
}

/// Current group and candidate location ids for a team that is free to move.
struct Candidates {
    tree: GameStructure,
    group_id: String,
    location_ids: Vec<String>,
}

impl NavigationService {
    pub fn new(ctx: AppContext) -> Self {
        let blocks = BlockService::new(ctx.clone());
        Self { ctx, blocks }
    }

    pub async fn get_player_navigation_view(&self, team_code: &str) -> Result<PlayerNavigationView> {
        let db = self.ctx.conn();
        let team = LoadedTeam::load(db, team_code).await?;
        self.navigation_view(db, &team).await
    }

    /// Build the view for an already loaded team.
    pub async fn navigation_view<C: ConnectionTrait>(
        &self,
        db: &C,
        team: &LoadedTeam,
    ) -> Result<PlayerNavigationView> {
        let mut view = PlayerNavigationView::new(team.settings.clone());

        if !team.team.must_check_out.is_empty() {
            let location = repository::locations::get(db, &team.team.must_check_out).await?;
            view.must_check_out = true;
            view.blocking_location = self.hydrate(db, vec![location]).await?.into_iter().next();
            return Ok(view);
        }

        let Candidates {
            tree,
            group_id,
            location_ids,
        } = self.candidates(db, team).await?;
        let completed = team.completed_location_ids();
        let Some(group) = tree.find_group_by_id(&group_id) else {
            return Err(Error::AllLocationsVisited);
        };

        view.can_advance_early = can_advance_early(group, &completed);

        let locations = repository::locations::find_by_ids(db, &location_ids).await?;
        if group.navigation == NavigationMode::Custom {
            for location in &locations {
                let (blocks, states) = self
                    .blocks
                    .find_by_owner_and_team_with_state(
                        db,
                        &location.id,
                        team.code(),
                        BlockContext::LocationClues,
                    )
                    .await?;
                view.clue_blocks.extend(blocks);
                view.clue_states.extend(states);
            }
        }
        view.next_locations = self.hydrate(db, locations).await?;

        if group.routing == RoutingStrategy::ScavengerHunt || group.navigation == NavigationMode::Tasks {
            let done: Vec<String> = group
                .location_ids
                .iter()
                .filter(|id| completed.contains(id))
                .cloned()
                .collect();
            let locations = repository::locations::find_by_ids(db, &done).await?;
            view.completed_locations = self.hydrate(db, locations).await?;
        }

        view.current_group = Some(group.clone());
        Ok(view)
    }

    /// Whether the marker belongs to one of the team's next locations.
    pub async fn is_valid_location<C: ConnectionTrait>(
        &self,
        db: &C,
        team: &LoadedTeam,
        marker_code: &str,
    ) -> Result<bool> {
        if !team.team.must_check_out.is_empty() {
            return Ok(false);
        }
        let marker_code = repository::markers::normalize_code(marker_code);
        let location_ids = match self.candidates(db, team).await {
            Ok(candidates) => candidates.location_ids,
            Err(Error::AllLocationsVisited) => return Ok(false),
            Err(e) => return Err(e),
        };
        let locations = repository::locations::find_by_ids(db, &location_ids).await?;
        let valid = locations
            .iter()
            .any(|location| location.marker_id == marker_code);
        debug!(team = team.code(), marker = %marker_code, valid, "Location validity checked");
        Ok(valid)
    }

    /// Admin preview: the location shown inside its own group, as if nothing
    /// had been visited. Clue states are always transient.
    pub async fn get_preview_navigation_view(
        &self,
        instance_id: &str,
        team_code: &str,
        preview_location_id: &str,
    ) -> Result<PlayerNavigationView> {
        let db = self.ctx.conn();
        let instance = repository::instances::get(db, instance_id).await?;
        let settings = repository::settings::get(db, instance_id).await?;
        let tree = load_for_instance(db, &instance).await?;
        let group = tree
            .group_containing_location(preview_location_id)
            .ok_or_else(|| Error::not_found("Location", preview_location_id))?;
        let location = repository::locations::get(db, preview_location_id).await?;

        let mut view = PlayerNavigationView::new(settings);
        if group.navigation == NavigationMode::Custom {
            let blocks =
                repository::blocks::find_by_owner(db, &location.id, BlockContext::LocationClues).await?;
            for block in &blocks {
                view.clue_states.insert(
                    block.id.clone(),
                    self.blocks.new_mock_state(&block.id, team_code),
                );
            }
            view.clue_blocks = blocks;
        }
        view.next_locations = self.hydrate(db, vec![location]).await?;
        view.current_group = Some(group.clone());
        Ok(view)
    }

    async fn candidates<C: ConnectionTrait>(&self, db: &C, team: &LoadedTeam) -> Result<Candidates> {
        let tree = load_for_instance(db, &team.instance).await?;
        let completed = team.completed_location_ids();
        let skipped = team.team.skipped_groups();

        let Some(group) = compute_current_group(&tree, &completed, &skipped) else {
            return Err(Error::AllLocationsVisited);
        };
        let group_id = group.id.clone();
        let location_ids = available_location_ids(&tree, &group_id, &completed, team.code());
        if location_ids.is_empty() {
            return Err(Error::AllLocationsVisited);
        }
        Ok(Candidates {
            tree,
            group_id,
            location_ids,
        })
    }

    /// Attach markers and content blocks, keeping the input order.
    async fn hydrate<C: ConnectionTrait>(
        &self,
        db: &C,
        locations: Vec<locations::Model>,
    ) -> Result<Vec<LocationView>> {
        let codes = locations.iter().map(|l| l.marker_id.clone()).collect();
        let markers: HashMap<String, markers::Model> = repository::markers::find_by_codes(db, codes)
            .await?
            .into_iter()
            .map(|marker| (marker.code.clone(), marker))
            .collect();

        let owner_ids = locations.iter().map(|l| l.id.clone()).collect();
        let mut blocks_by_owner: HashMap<String, Vec<Block>> = HashMap::new();
        for block in
            repository::blocks::find_by_owners(db, owner_ids, BlockContext::LocationContent).await?
        {
            blocks_by_owner
                .entry(block.owner_id.clone())
                .or_default()
                .push(block);
        }

        Ok(locations
            .into_iter()
            .map(|location| LocationView {
                marker: markers.get(&location.marker_id).cloned(),
                blocks: blocks_by_owner.remove(&location.id).unwrap_or_default(),
                location,
            })
            .collect())
    }
}
