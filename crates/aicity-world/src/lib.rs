//! The built world: collaborative projects, the standing assets they
//! produce, and the tile grid agents live on.

pub mod assets;
pub mod projects;
pub mod tiles;

pub use assets::AssetRegistry;
pub use projects::{spec_for, ProjectBoard, ProjectSpec};
pub use tiles::{HomeLots, TileGrid};

use aicity_types::{AssetId, AssetKind, ProjectId};

/// Errors from project and asset operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// No project with this id exists.
    #[error("unknown project {0}")]
    UnknownProject(ProjectId),

    /// No asset with this id exists.
    #[error("unknown asset {0}")]
    UnknownAsset(AssetId),

    /// An asset of this kind already stands, or a project for it is active.
    #[error("a {0:?} already exists or is under construction")]
    AlreadyExists(AssetKind),

    /// The project is not accepting contributions.
    #[error("project {0} is not active")]
    NotActive(ProjectId),
}
