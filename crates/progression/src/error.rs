//! Error types for the progression core

use blocks::BlockError;
use sea_orm::{DbErr, SqlErr};
use structure::StructureError;
use thiserror::Error;

/// Caller-facing category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotAuthenticated,
    PermissionDenied,
    NotFound,
    Conflict,
    Precondition,
    ResourceExhausted,
    Expired,
    Integrity,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("User not authenticated")]
    NotAuthenticated,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("No location found for code {0}")]
    LocationNotFound(String),

    /// The team has nowhere left to go
    #[error("All locations visited")]
    AllLocationsVisited,

    #[error("Location {0} is not available to this team right now")]
    InvalidLocation(String),

    #[error("Player has already scanned in")]
    AlreadyCheckedIn,

    #[error("Team code already in use: {0}")]
    DuplicateTeamCode(String),

    #[error("Purchase already processed")]
    PurchaseAlreadyProcessed,

    #[error("Player does not need to scan out")]
    UnnecessaryCheckOut,

    #[error("Team is not at the correct location to check out")]
    CheckOutAtWrongLocation,

    #[error("Unfinished check in")]
    UnfinishedCheckIn,

    #[error("Templates cannot have teams")]
    TemplateHasNoTeams,

    #[error("Insufficient credits")]
    InsufficientCredits,

    #[error("Invalid credit amount: {0}")]
    InvalidCreditAmount(String),

    #[error("Payment does not match purchase: {0}")]
    PurchaseMismatch(String),

    #[error("Payments are not configured")]
    PaymentsNotConfigured,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Webhook signature has expired")]
    SignatureExpired,

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_)
            | Error::InvalidLocation(_)
            | Error::InvalidCreditAmount(_)
            | Error::PurchaseMismatch(_)
            | Error::Structure(_) => ErrorKind::InvalidInput,
            Error::Block(BlockError::PlayerData(_)) => ErrorKind::Integrity,
            Error::Block(_) => ErrorKind::InvalidInput,
            Error::NotAuthenticated => ErrorKind::NotAuthenticated,
            Error::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Error::NotFound { .. } | Error::LocationNotFound(_) => ErrorKind::NotFound,
            Error::AlreadyCheckedIn
            | Error::DuplicateTeamCode(_)
            | Error::PurchaseAlreadyProcessed
            | Error::TemplateHasNoTeams => ErrorKind::Conflict,
            Error::AllLocationsVisited
            | Error::UnnecessaryCheckOut
            | Error::CheckOutAtWrongLocation
            | Error::UnfinishedCheckIn
            | Error::PaymentsNotConfigured => ErrorKind::Precondition,
            Error::InsufficientCredits => ErrorKind::ResourceExhausted,
            Error::InvalidSignature | Error::SignatureExpired => ErrorKind::Expired,
            Error::Gateway(_)
            | Error::Database(_)
            | Error::Serialization(_)
            | Error::Io(_) => ErrorKind::Integrity,
        }
    }

    /// Message safe to show a caller. Integrity failures are reported generically.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Integrity => "Something went wrong, please try again".to_string(),
            _ => self.to_string(),
        }
    }

    /// Whether a database error is a unique-constraint violation.
    pub fn is_unique_violation(err: &DbErr) -> bool {
        matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
    }
}

/// Result type alias for progression operations
pub type Result<T> = std::result::Result<T, Error>;
