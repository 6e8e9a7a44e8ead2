//! Service layer
//!
//! Every multi-step mutation begins its own transaction here and passes the
//! handle down to the repositories. A dropped transaction rolls back, so an
//! operation that is cancelled, fails or panics part way never commits.

pub mod check_in;
pub mod content;
pub mod credits;
pub mod deletion;
pub mod game_structure;
pub mod navigation;
pub mod payment;
pub mod purchases;
pub mod teams;
pub mod topup;
pub mod webhook;

use std::sync::Arc;

use sea_orm::{ConnectionTrait, DatabaseConnection};

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::database::Database;
use crate::entity::{check_ins, instance_settings, instances};
use crate::error::Result;
use crate::repository;

pub use check_in::{CheckInService, Mode};
pub use content::BlockService;
pub use credits::{CreditAdjustmentFilter, CreditService, GroupBy, TeamStartLogFilter, TeamStartSummary};
pub use deletion::DeleteService;
pub use game_structure::GameStructureService;
pub use navigation::{LocationView, NavigationService, PlayerNavigationView};
pub use payment::{CheckoutRequest, CheckoutSession, PaymentGateway, StripeGateway};
pub use purchases::{PurchaseService, WebhookOutcome};
pub use teams::TeamService;
pub use topup::{MonthlyTopUp, TopUpReport};

/// Shared handles every service is built from. Cheap to clone.
#[derive(Clone)]
pub struct AppContext {
    pub db: Database,
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
}

impl AppContext {
    pub fn new(db: Database, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn conn(&self) -> &DatabaseConnection {
        self.db.connection()
    }
}

/// Reset every location's head count in an instance from its open check-ins.
pub(crate) async fn recount_current_counts<C: ConnectionTrait>(db: &C, instance_id: &str) -> Result<()> {
    for location in repository::locations::find_by_instance(db, instance_id).await? {
        let open = repository::check_ins::count_open_at(db, &location.id).await?;
        let open = i32::try_from(open).unwrap_or(i32::MAX);
        if open != location.current_count {
            repository::locations::set_current_count(db, &location.id, open).await?;
        }
    }
    Ok(())
}

/// A team with the relations the game logic needs.
#[derive(Debug, Clone)]
pub struct LoadedTeam {
    pub team: crate::entity::teams::Model,
    pub instance: instances::Model,
    pub settings: instance_settings::Model,
    pub check_ins: Vec<check_ins::Model>,
}

impl LoadedTeam {
    pub async fn load<C: ConnectionTrait>(db: &C, team_code: &str) -> Result<Self> {
        let team = repository::teams::get_by_code(db, team_code).await?;
        let instance = repository::instances::get(db, &team.instance_id).await?;
        let settings = repository::settings::get(db, &team.instance_id).await?;
        let check_ins = repository::check_ins::find_by_team(db, &team.code).await?;
        Ok(Self {
            team,
            instance,
            settings,
            check_ins,
        })
    }

    pub fn code(&self) -> &str {
        &self.team.code
    }

    /// Every location the team has checked in to.
    pub fn completed_location_ids(&self) -> Vec<String> {
        self.check_ins
            .iter()
            .map(|check_in| check_in.location_id.clone())
            .collect()
    }

    pub fn has_checked_in(&self, location_id: &str) -> bool {
        self.check_ins
            .iter()
            .any(|check_in| check_in.location_id == location_id)
    }
}
