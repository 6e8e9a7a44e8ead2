//! Persistence ports
//!
//! Free functions generic over [`ConnectionTrait`](sea_orm::ConnectionTrait), so every
//! call works the same on a pooled connection or inside an open transaction. Compound
//! operations begin a transaction in the service layer and pass it down.

pub mod block_states;
pub mod blocks;
pub mod check_ins;
pub mod credit_adjustments;
pub mod instances;
pub mod locations;
pub mod markers;
pub mod purchases;
pub mod settings;
pub mod team_start_logs;
pub mod teams;
pub mod users;
