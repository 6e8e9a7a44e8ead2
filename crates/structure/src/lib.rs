//! Game structure model and navigation engine
//!
//! A [`GameStructure`] is a tree of groups. The root is an invisible container;
//! every other group bundles an ordered list of location ids and/or nested groups
//! together with a completion rule and a routing strategy.
//!
//! Everything in this crate is pure: the functions take the tree plus the set of
//! completed location ids (and skipped group ids) and return plain values. The same
//! inputs always produce the same outputs, including for random routing.

pub mod engine;
pub mod error;
pub mod model;
pub mod validate;

pub use engine::{
    AdvanceReason, available_location_ids, can_advance_early, compute_current_group,
    is_completed, is_group_completed, next_group,
};
pub use error::{Result, StructureError};
pub use model::{CompletionType, GameStructure, NavigationMode, RoutingStrategy};
pub use validate::{ensure_all_locations_included, validate_structure};
