//! Sea-ORM entities for the progression tables

pub mod block_states;
pub mod blocks;
pub mod check_ins;
pub mod credit_adjustments;
pub mod credit_purchases;
pub mod instance_settings;
pub mod instances;
pub mod locations;
pub mod markers;
pub mod team_start_logs;
pub mod teams;
pub mod users;

// Re-export entities for convenience
pub use block_states::Entity as BlockStates;
pub use blocks::Entity as Blocks;
pub use check_ins::Entity as CheckIns;
pub use credit_adjustments::Entity as CreditAdjustments;
pub use credit_purchases::Entity as CreditPurchases;
pub use instance_settings::Entity as InstanceSettings;
pub use instances::Entity as Instances;
pub use locations::Entity as Locations;
pub use markers::Entity as Markers;
pub use team_start_logs::Entity as TeamStartLogs;
pub use teams::Entity as Teams;
pub use users::Entity as Users;
