//! # maptour
//!
//! Tour choreography and geospatial marker engine for story maps.
//!
//! The crate drives a sequence of camera movements, narrative overlays and marker-set
//! transitions against a live map renderer, while keeping a clustered point index and a
//! zoom-dependent region highlight consistent. The renderer itself is an external
//! capability described by [`render::MapRenderer`]; everything here talks to it through a
//! shared [`MapSession`].

pub mod camera;
pub mod core;
pub mod data;
pub mod highlight;
pub mod markers;
pub mod prelude;
pub mod render;
pub mod runtime;
pub mod spatial;
pub mod tour;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    config::{EngineConfig, EngineProfile},
    geo::LngLat,
    session::{MapSession, WeakSession},
};

pub use camera::{
    motion::{AbortReason, CameraMotionController, MotionOutcome},
    pose::{CameraPose, Easing, MotionKind},
};

pub use data::{
    geojson::{Feature, FeatureCollection, Geometry},
    location::{MacroRegion, MemoryCategory, MemoryLocation},
};

pub use highlight::{controller::RegionHighlightController, ramp::ZoomRamp};

pub use markers::{cluster_manager::MarkerClusterManager, filter::FilterCriteria};

pub use render::{events::MapEvent, headless::HeadlessRenderer, MapRenderer};

pub use spatial::clustering::ClusterIndex;

pub use tour::{
    presenter::Presenter,
    sequencer::{TourHandle, TourHooks, TourOutcome, TourSequencer, TourState},
    step::{TourPlan, TourStep},
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("map session is not ready")]
    SessionNotReady,

    #[error("map session was torn down")]
    SessionTornDown,

    #[error("layer not found: {0}")]
    LayerNotFound(String),

    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("malformed location {id}: {reason}")]
    MalformedLocation { id: String, reason: String },

    #[error("a structural map mutation is already in flight")]
    StructuralMutationInFlight,

    #[error("invalid zoom ramp: {0}")]
    InvalidRamp(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("renderer error: {0}")]
    Renderer(String),
}

impl MapError {
    /// Errors caused by component initialization ordering rather than a real fault.
    pub fn is_benign(&self) -> bool {
        matches!(self, MapError::LayerNotFound(_) | MapError::SourceNotFound(_))
    }
}

/// Error type alias for convenience
pub type Error = MapError;
