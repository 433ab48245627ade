use crate::camera::pose::CameraPose;
use crate::core::session::MapSession;
use crate::highlight::aoi::AreaOfInterest;
use crate::markers::tour_markers::TourMarker;
use crate::tour::reveal::RevealPolicy;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Host-supplied effect run against the session
pub type CustomEffect = Arc<dyn Fn(&MapSession) + Send + Sync>;

/// Something a step does to the map when reached or skipped
#[derive(Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    /// Adds the marker with this code to the revealed set from this step on
    RevealLocation(String),
    ShowAreaOfInterest(AreaOfInterest),
    ClearAreaOfInterest,
    FocusRegion(Option<String>),
    #[serde(skip)]
    Custom(CustomEffect),
}

impl SideEffect {
    pub fn custom<F>(effect: F) -> Self
    where
        F: Fn(&MapSession) + Send + Sync + 'static,
    {
        SideEffect::Custom(Arc::new(effect))
    }
}

impl fmt::Debug for SideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideEffect::RevealLocation(code) => {
                f.debug_tuple("RevealLocation").field(code).finish()
            }
            SideEffect::ShowAreaOfInterest(area) => {
                f.debug_tuple("ShowAreaOfInterest").field(&area.id).finish()
            }
            SideEffect::ClearAreaOfInterest => f.write_str("ClearAreaOfInterest"),
            SideEffect::FocusRegion(region) => f.debug_tuple("FocusRegion").field(region).finish(),
            SideEffect::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

mod optional_ms {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TourStep {
    pub title: String,
    pub message: String,
    pub pose: CameraPose,
    /// Overrides the pose's transition duration
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub location_code: Option<String>,
    #[serde(default)]
    pub is_last_step: bool,
    #[serde(default)]
    pub on_reach: Vec<SideEffect>,
    #[serde(default)]
    pub skip: Vec<SideEffect>,
    /// Presentation time before the step advances on its own
    #[serde(default, rename = "auto_advance_ms", deserialize_with = "optional_ms::deserialize")]
    pub auto_advance: Option<Duration>,
}

impl TourStep {
    pub fn new(title: impl Into<String>, message: impl Into<String>, pose: CameraPose) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            pose,
            duration_ms: None,
            location_code: None,
            is_last_step: false,
            on_reach: Vec::new(),
            skip: Vec::new(),
            auto_advance: None,
        }
    }

    pub fn with_location(mut self, code: impl Into<String>) -> Self {
        self.location_code = Some(code.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(duration.as_millis() as u64);
        self
    }

    pub fn on_reach(mut self, effect: SideEffect) -> Self {
        self.on_reach.push(effect);
        self
    }

    pub fn on_skip(mut self, effect: SideEffect) -> Self {
        self.skip.push(effect);
        self
    }

    pub fn with_auto_advance(mut self, after: Option<Duration>) -> Self {
        self.auto_advance = after;
        self
    }

    /// The pose actually flown to
    pub fn motion_pose(&self) -> CameraPose {
        match self.duration_ms {
            Some(ms) => self.pose.clone().with_duration(Duration::from_millis(ms)),
            None => self.pose.clone(),
        }
    }

    /// Marker codes this step reveals: its own location plus any `RevealLocation` effects
    pub fn revealed_codes(&self) -> impl Iterator<Item = &str> {
        self.location_code.as_deref().into_iter().chain(
            self.on_reach.iter().filter_map(|effect| match effect {
                SideEffect::RevealLocation(code) => Some(code.as_str()),
                _ => None,
            }),
        )
    }
}

/// An immutable tour: ordered steps plus the markers they refer to
#[derive(Debug, Clone)]
pub struct TourPlan {
    pub name: String,
    steps: Vec<TourStep>,
    markers: Vec<TourMarker>,
    reveal: RevealPolicy,
}

impl TourPlan {
    /// `is_last_step` is rewritten so exactly the final step carries it
    pub fn new(
        name: impl Into<String>,
        mut steps: Vec<TourStep>,
        markers: Vec<TourMarker>,
        reveal: RevealPolicy,
    ) -> Self {
        let last = steps.len().saturating_sub(1);
        for (i, step) in steps.iter_mut().enumerate() {
            step.is_last_step = i == last;
        }
        Self {
            name: name.into(),
            steps,
            markers,
            reveal,
        }
    }

    pub fn steps(&self) -> &[TourStep] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&TourStep> {
        self.steps.get(index)
    }

    pub fn markers(&self) -> &[TourMarker] {
        &self.markers
    }

    pub fn reveal(&self) -> RevealPolicy {
        self.reveal
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Markers shown while step `index` is active
    pub fn markers_at(&self, index: usize) -> Vec<TourMarker> {
        self.reveal.markers_at(index, &self.steps, &self.markers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::LngLat;

    #[test]
    fn test_step_from_json() {
        let json = r#"{
            "title": "Bojayá",
            "message": "Chocó",
            "pose": { "center": [-76.89, 6.56], "zoom": 9.0, "duration_ms": 2500 },
            "location_code": "BOJ",
            "on_reach": [
                { "show_area_of_interest": { "id": "boj", "center": [-76.89, 6.56], "radius_km": 25.0 } },
                { "focus_region": "pacifica" }
            ],
            "skip": ["clear_area_of_interest"],
            "auto_advance_ms": 8000
        }"#;
        let step: TourStep = serde_json::from_str(json).unwrap();
        assert_eq!(step.pose.duration, Duration::from_millis(2500));
        assert_eq!(step.on_reach.len(), 2);
        assert!(matches!(step.skip[0], SideEffect::ClearAreaOfInterest));
        assert_eq!(step.auto_advance, Some(Duration::from_secs(8)));
        assert_eq!(step.revealed_codes().collect::<Vec<_>>(), vec!["BOJ"]);
    }

    #[test]
    fn test_plan_marks_only_final_step_last() {
        let pose = CameraPose::new(LngLat::new(-74.0, 4.6), 6.0);
        let mut first = TourStep::new("a", "", pose.clone());
        first.is_last_step = true;
        let plan = TourPlan::new(
            "t",
            vec![first, TourStep::new("b", "", pose.clone()), TourStep::new("c", "", pose)],
            Vec::new(),
            RevealPolicy::Cumulative,
        );
        let flags: Vec<bool> = plan.steps().iter().map(|s| s.is_last_step).collect();
        assert_eq!(flags, vec![false, false, true]);
    }

    #[test]
    fn test_duration_override() {
        let step = TourStep::new("a", "", CameraPose::new(LngLat::new(0.0, 0.0), 3.0))
            .with_duration(Duration::ZERO);
        assert_eq!(step.motion_pose().duration, Duration::ZERO);
    }
}
