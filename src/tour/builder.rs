//! Tour construction
//!
//! The default tour is a table of hand-authored steps embedded as JSON. Themed tours are
//! derived from a list of location ids: an intro, one step per location, an outro.

use crate::camera::pose::{CameraPose, MotionKind};
use crate::core::config::TourConfig;
use crate::data::location::MemoryLocation;
use crate::markers::tour_markers::TourMarker;
use crate::tour::reveal::RevealPolicy;
use crate::tour::step::{SideEffect, TourPlan, TourStep};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TOUR: &str = include_str!("default_tour.json");

#[derive(Debug, Deserialize)]
struct TourScript {
    name: String,
    steps: Vec<TourStep>,
}

/// A named subset of locations to tour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemedTour {
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub intro: String,
    #[serde(default)]
    pub outro: String,
    pub locations: Vec<String>,
}

impl ThemedTour {
    pub fn new(name: impl Into<String>, locations: Vec<String>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            intro: String::new(),
            outro: String::new(),
            locations,
        }
    }
}

pub fn default_tour(locations: &[MemoryLocation]) -> Result<TourPlan> {
    tour_from_json(DEFAULT_TOUR, locations)
}

/// Builds a cumulative-reveal tour from a JSON step table.
///
/// Step codes are matched against location codes, then ids. A code with no usable
/// location gets a marker at its step's camera center.
pub fn tour_from_json(json: &str, locations: &[MemoryLocation]) -> Result<TourPlan> {
    let script: TourScript = serde_json::from_str(json)?;
    let mut markers: Vec<TourMarker> = Vec::new();
    for step in &script.steps {
        for code in step.revealed_codes() {
            if markers.iter().any(|m| m.code == code) {
                continue;
            }
            let marker = find_location(locations, code)
                .and_then(|location| match TourMarker::from_location(location) {
                    Ok(marker) => Some(TourMarker {
                        code: code.to_string(),
                        ..marker
                    }),
                    Err(err) => {
                        log::warn!("tour marker {}: {}", code, err);
                        None
                    }
                })
                .unwrap_or_else(|| TourMarker::new(code, step.pose.center, step.title.clone()));
            markers.push(marker);
        }
    }
    log::debug!(
        "tour {} loaded: {} steps, {} markers",
        script.name,
        script.steps.len(),
        markers.len()
    );
    Ok(TourPlan::new(
        script.name,
        script.steps,
        markers,
        RevealPolicy::Cumulative,
    ))
}

fn find_location<'a>(locations: &'a [MemoryLocation], code: &str) -> Option<&'a MemoryLocation> {
    locations
        .iter()
        .find(|l| l.code.as_deref() == Some(code))
        .or_else(|| locations.iter().find(|l| l.id == code))
}

/// `1 + n + 1` steps for the `n` theme locations that resolve to a valid position
pub fn themed_tour(
    theme: &ThemedTour,
    locations: &[MemoryLocation],
    config: &TourConfig,
) -> TourPlan {
    let auto_advance = config.themed_auto_advance();
    let step_duration = Duration::from_millis(config.themed_step_duration_ms);
    let overview = CameraPose::new(config.overview_center, config.overview_zoom)
        .with_duration(step_duration)
        .with_kind(MotionKind::Fly);

    let mut steps = vec![TourStep::new(theme.title.clone(), theme.intro.clone(), overview.clone())
        .on_reach(SideEffect::FocusRegion(None))
        .with_auto_advance(auto_advance)];
    let mut markers = Vec::with_capacity(theme.locations.len());

    for id in &theme.locations {
        let Some(location) = locations.iter().find(|l| &l.id == id) else {
            log::warn!("themed tour {}: unknown location {}", theme.name, id);
            continue;
        };
        let marker = match TourMarker::from_location(location) {
            Ok(marker) => marker,
            Err(err) => {
                log::warn!("themed tour {}: {}", theme.name, err);
                continue;
            }
        };
        let pose = CameraPose::new(marker.position, config.themed_zoom)
            .with_pitch(config.themed_pitch)
            .with_duration(step_duration);
        steps.push(
            TourStep::new(location.title.clone(), location.description.clone(), pose)
                .with_location(marker.code.clone())
                .on_reach(SideEffect::FocusRegion(Some(location.region.key().to_string())))
                .with_auto_advance(auto_advance),
        );
        markers.push(marker);
    }

    steps.push(
        TourStep::new(theme.title.clone(), theme.outro.clone(), overview)
            .on_reach(SideEffect::FocusRegion(None))
            .with_auto_advance(auto_advance),
    );
    TourPlan::new(theme.name.clone(), steps, markers, RevealPolicy::ProportionalPrefix)
}
