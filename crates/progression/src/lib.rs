//! Game progression core
//!
//! Navigation through the game structure, the two-phase check-in state
//! machine, block interaction, and the credit ledger that pays for team
//! starts. All state lives in the database; services open one transaction
//! per mutation.

pub mod clock;
pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod repository;
pub mod scheduler;
pub mod services;
pub mod uploads;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, DatabaseConfig, PaymentConfig};
pub use database::Database;
pub use error::{Error, ErrorKind, Result};
pub use scheduler::Scheduler;
pub use services::{
    AppContext, BlockService, CheckInService, CreditService, DeleteService, GameStructureService,
    Mode, MonthlyTopUp, NavigationService, PurchaseService, TeamService,
};
pub use uploads::UploadStore;
