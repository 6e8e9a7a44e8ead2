use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    #[error("game structure must contain at least one visible group")]
    NoVisibleGroups,

    #[error("duplicate group id: {0}")]
    DuplicateGroupId(String),

    #[error("location {0} appears in more than one group")]
    DuplicateLocationId(String),

    #[error("group {0} is missing a name")]
    MissingGroupName(String),

    #[error("group {0} is missing a color")]
    MissingGroupColor(String),

    #[error("group {0} is marked as root but is not the top of the tree")]
    NestedRoot(String),

    #[error("top of the tree must be the root group")]
    MissingRoot,

    #[error("group {0} uses ordered routing, which requires completion type 'all'")]
    OrderedRequiresAll(String),

    #[error("group {0} requires at least one completed location")]
    InvalidMinimum(String),

    #[error("malformed game structure: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, StructureError>;
