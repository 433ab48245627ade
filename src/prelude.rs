//! Prelude module for common maptour types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use maptour::prelude::*;`

pub use crate::core::{
    config::{
        CameraConfig, ClusterConfig, EngineConfig, EngineProfile, HighlightConfig, TourConfig,
    },
    geo::LngLat,
    session::{ListenerControl, ListenerId, MapSession, StructuralGuard, WeakSession},
};

pub use crate::camera::{
    motion::{AbortReason, CameraMotionController, MotionOutcome},
    pose::{CameraPose, Easing, MotionKind},
};

pub use crate::data::{
    geojson::{Feature, FeatureCollection, Geometry},
    location::{MacroRegion, MemoryCategory, MemoryLocation},
};

pub use crate::render::{
    events::{EventKind, MapEvent, RenderedFeature, TransitionId},
    expression::{EvalContext, Expression},
    headless::HeadlessRenderer,
    style::{LayerKind, LayerSpec, SourceSpec, StyleBatch, StyleWrite},
    CameraState, MapRenderer,
};

pub use crate::spatial::{
    clustering::{ClusterEntry, ClusterId, ClusterIndex, ClusterNode},
    index::{SpatialIndex, SpatialItem},
};

pub use crate::markers::{
    cluster_manager::{ClusterBand, LocationSelected, MarkerClusterManager},
    filter::FilterCriteria,
    tour_markers::{TourMarker, TourMarkers},
};

pub use crate::highlight::{
    aoi::AreaOfInterest,
    controller::{HighlightMode, RegionHighlightController, RegionHighlightState},
    ramp::ZoomRamp,
};

pub use crate::tour::{
    builder::{default_tour, themed_tour, ThemedTour},
    presenter::{PresentationHandle, Presenter, StepPosition},
    reveal::RevealPolicy,
    sequencer::{
        CancelReason, StepPhase, TourCommand, TourHandle, TourHooks, TourOutcome, TourSequencer,
        TourState,
    },
    step::{SideEffect, TourPlan, TourStep},
};

pub use crate::runtime::{spawn, RetryPolicy};

pub use crate::{Error as MapError, Result};

pub use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};

pub use futures::Future;
pub use std::pin::Pin;
