//! Error taxonomy for navigation requests and mesh access.
//!
//! None of these are fatal: callers log them through the notification sink
//! and leave navigation inactive.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NavError {
    #[error("Can only navigate when in game!")]
    NotInGame,
    #[error("You need a target")]
    NoTarget,
    #[error("Bad spawn id: '{0}'")]
    BadSpawnId(String),
    #[error("Could not find spawn matching id {0}")]
    SpawnNotFound(u32),
    #[error("Could not find spawn matching search '{0}'")]
    SpawnSearchFailed(String),
    #[error("No door found or bad door target!")]
    NoDoor,
    #[error("No ground item found or bad item target!")]
    NoGroundItem,
    #[error("Waypoint '{0}' not found!")]
    WaypointNotFound(String),
    #[error("Invalid location: {0}")]
    InvalidLocation(String),
    #[error("Invalid nav destination: {0}")]
    InvalidDestination(String),
    #[error("Cannot navigate - no mesh file loaded.")]
    MeshUnavailable,
    #[error("Could not find a path to the destination")]
    NoPathFound,
    #[error("No navigation path currently active")]
    NotActive,
    #[error("Navigation must be active to pause")]
    NotActiveForPause,
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

impl NavError {
    /// Resolution failures are the errors that discard a request before any
    /// path state is touched.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            NavError::NotInGame
                | NavError::NoTarget
                | NavError::BadSpawnId(_)
                | NavError::SpawnNotFound(_)
                | NavError::SpawnSearchFailed(_)
                | NavError::NoDoor
                | NavError::NoGroundItem
                | NavError::WaypointNotFound(_)
                | NavError::InvalidLocation(_)
                | NavError::InvalidDestination(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("failed to read mesh file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse mesh file: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("mesh has no source file to reload from")]
    NoSource,
    #[error("invalid mesh: {0}")]
    Invalid(String),
}
