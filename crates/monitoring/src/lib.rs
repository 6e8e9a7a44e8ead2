//! Logging for the progression services
//!
//! Call [`init_logging`] once at start-up and keep the returned [`LoggingGuard`]
//! alive until the process exits.

pub mod logging;

pub use logging::{LogDestination, LoggingConfig, LoggingGuard, init_logging, init_logging_with};
