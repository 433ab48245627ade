use crate::core::{constants, geo::LngLat};
use crate::render::CameraState;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Easing curves for camera transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    #[default]
    EaseInOut,
    Smooth,
    UltraSmooth,
}

impl Easing {
    /// Apply easing function to a normalized time value (0.0 to 1.0)
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t * t,
            Easing::EaseOut => {
                let t = t - 1.0;
                t * t * t + 1.0
            }
            Easing::EaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            // 3t^2 - 2t^3
            Easing::Smooth => t * t * (3.0 - 2.0 * t),
            // 6t^5 - 15t^4 + 10t^3
            Easing::UltraSmooth => t * t * t * (t * (t * 6.0 - 15.0) + 10.0),
        }
    }
}

/// How the renderer travels to a pose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionKind {
    /// Straight eased pan and zoom
    Ease,
    /// Zoom out, pan, zoom in
    #[default]
    Fly,
    /// No animation
    Jump,
}

/// A camera target plus transition timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub center: LngLat,
    pub zoom: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub bearing: f64,
    #[serde(
        rename = "duration_ms",
        with = "duration_ms",
        default = "default_duration"
    )]
    pub duration: Duration,
    #[serde(default)]
    pub easing: Easing,
    #[serde(default)]
    pub kind: MotionKind,
}

fn default_duration() -> Duration {
    Duration::from_millis(constants::DEFAULT_MOTION_DURATION_MS)
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

impl CameraPose {
    pub fn new(center: LngLat, zoom: f64) -> Self {
        Self {
            center,
            zoom,
            pitch: 0.0,
            bearing: 0.0,
            duration: default_duration(),
            easing: Easing::default(),
            kind: MotionKind::default(),
        }
    }

    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = bearing;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn with_kind(mut self, kind: MotionKind) -> Self {
        self.kind = kind;
        self
    }

    /// A zero duration means "jump", same as [`MotionKind::Jump`]
    pub fn is_jump(&self) -> bool {
        self.kind == MotionKind::Jump || self.duration.is_zero()
    }

    /// Clamps zoom into `[min, max]`, returning whether it had to change
    pub fn clamp_zoom(&mut self, min: f64, max: f64) -> bool {
        let clamped = self.zoom.clamp(min, max);
        let changed = clamped != self.zoom;
        self.zoom = clamped;
        changed
    }

    pub fn target_state(&self) -> CameraState {
        CameraState {
            center: self.center,
            zoom: self.zoom,
            pitch: self.pitch,
            bearing: self.bearing,
        }
    }

    /// Camera state at normalized time `t` of a transition from `from` to this pose
    pub fn state_at(&self, from: &CameraState, t: f64) -> CameraState {
        interpolate(from, &self.target_state(), self.easing.apply(t))
    }
}

/// Blends two camera states at eased progress `t`
pub fn interpolate(from: &CameraState, to: &CameraState, t: f64) -> CameraState {
    let t = t.clamp(0.0, 1.0);
    if t >= 1.0 {
        return *to;
    }
    let lerp = |a: f64, b: f64| a + (b - a) * t;
    // shortest way round
    let mut delta_bearing = (to.bearing - from.bearing) % 360.0;
    if delta_bearing > 180.0 {
        delta_bearing -= 360.0;
    } else if delta_bearing < -180.0 {
        delta_bearing += 360.0;
    }
    CameraState {
        center: from.center.lerp(&to.center, t),
        zoom: lerp(from.zoom, to.zoom),
        pitch: lerp(from.pitch, to.pitch),
        bearing: from.bearing + delta_bearing * t,
    }
}
