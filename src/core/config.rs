//! Configuration system for tour pacing, clustering and highlight tuning
//!
//! This module provides a hierarchical configuration that can be loaded from JSON,
//! built from presets, or assembled by hand. Every section has sensible defaults so a
//! partial JSON document only needs to name the values it changes.

use crate::camera::pose::Easing;
use crate::core::{constants, geo::LngLat};
use crate::highlight::ramp::ZoomRamp;
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineProfile {
    /// Tours advance only when the visitor asks
    Standard,
    /// Unattended display: every step advances on its own
    Kiosk,
    Custom(EngineConfig),
}

impl EngineProfile {
    pub fn resolve(&self) -> EngineConfig {
        match self {
            Self::Standard => EngineConfig::default(),
            Self::Kiosk => EngineConfig {
                tour: TourConfig {
                    default_auto_advance_ms: Some(12_000),
                    themed_auto_advance_ms: Some(8_000),
                    ..TourConfig::default()
                },
                camera: CameraConfig {
                    default_easing: Easing::Smooth,
                    ..CameraConfig::default()
                },
                ..EngineConfig::default()
            },
            Self::Custom(config) => config.clone(),
        }
    }
}

impl Default for EngineProfile {
    fn default() -> Self {
        Self::Standard
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub camera: CameraConfig,
    pub cluster: ClusterConfig,
    pub highlight: HighlightConfig,
    pub tour: TourConfig,
}

impl EngineConfig {
    /// Parses and validates a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.camera.validate()?;
        self.cluster.validate()?;
        self.highlight.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub default_duration_ms: u64,
    pub default_easing: Easing,
    /// Duration of the zoom-in after a cluster click
    pub cluster_click_duration_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            min_zoom: constants::MIN_ZOOM,
            max_zoom: constants::MAX_ZOOM,
            default_duration_ms: 3_000,
            default_easing: Easing::EaseInOut,
            cluster_click_duration_ms: 500,
        }
    }
}

impl CameraConfig {
    fn validate(&self) -> Result<()> {
        if !(self.min_zoom < self.max_zoom) {
            return Err(MapError::InvalidConfig(format!(
                "camera.min_zoom {} must be below camera.max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        Ok(())
    }

    pub fn default_duration(&self) -> Duration {
        Duration::from_millis(self.default_duration_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub radius_px: f64,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub min_points: usize,
    pub extent: f64,
    /// Lower bound of the medium band
    pub medium_threshold: u64,
    /// Lower bound of the large band
    pub large_threshold: u64,
    pub max_zoom_increment: f64,
    pub band_colors: [String; 3],
    pub band_radii: [f64; 3],
}

impl Default for ClusterConfig {
    fn default() -> Self {
        let (medium_threshold, large_threshold) = constants::CLUSTER_BAND_THRESHOLDS;
        Self {
            radius_px: constants::CLUSTER_RADIUS_PX,
            min_zoom: constants::CLUSTER_MIN_ZOOM,
            max_zoom: constants::CLUSTER_MAX_ZOOM,
            min_points: constants::CLUSTER_MIN_POINTS,
            extent: constants::CLUSTER_EXTENT,
            medium_threshold,
            large_threshold,
            max_zoom_increment: constants::MAX_CLUSTER_ZOOM_INCREMENT,
            band_colors: [
                "#51bbd6".to_string(),
                "#f1f075".to_string(),
                "#f28cb1".to_string(),
            ],
            band_radii: [18.0, 24.0, 32.0],
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.radius_px <= 0.0 || self.extent <= 0.0 {
            return Err(MapError::InvalidConfig(
                "cluster radius and extent must be positive".to_string(),
            ));
        }
        if self.min_zoom > self.max_zoom {
            return Err(MapError::InvalidConfig(format!(
                "cluster.min_zoom {} exceeds cluster.max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.max_zoom > constants::CLUSTER_ZOOM_LIMIT {
            return Err(MapError::InvalidConfig(format!(
                "cluster.max_zoom {} exceeds {}",
                self.max_zoom,
                constants::CLUSTER_ZOOM_LIMIT
            )));
        }
        if self.min_points < 2 {
            return Err(MapError::InvalidConfig(
                "cluster.min_points must be at least 2".to_string(),
            ));
        }
        if self.medium_threshold >= self.large_threshold {
            return Err(MapError::InvalidConfig(format!(
                "cluster band thresholds must increase ({} >= {})",
                self.medium_threshold, self.large_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// `[zoom, opacity]` stops used while one region is focused
    pub focused_opacity: Vec<[f64; 2]>,
    /// `[zoom, opacity]` stops used when no region is focused
    pub default_opacity: Vec<[f64; 2]>,
    pub focused_line_width: Vec<[f64; 2]>,
    pub default_line_width: Vec<[f64; 2]>,
    /// Largest opacity change allowed per zoom level
    pub max_opacity_slope: f64,
    pub fill_color: String,
    pub line_color: String,
    pub region_id_property: String,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub aoi_fill_color: String,
    pub aoi_fill_opacity: f64,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        let fade = constants::HIGHLIGHT_FADE_ZOOM;
        Self {
            focused_opacity: vec![[5.0, 0.55], [8.0, 0.25], [fade, 0.02]],
            default_opacity: vec![[5.0, 0.30], [8.0, 0.12], [fade, 0.0]],
            focused_line_width: vec![[5.0, 2.5], [fade, 0.5]],
            default_line_width: vec![[5.0, 1.0], [fade, 0.3]],
            max_opacity_slope: 0.15,
            fill_color: "#c0392b".to_string(),
            line_color: "#7b241c".to_string(),
            region_id_property: constants::REGION_ID_PROPERTY.to_string(),
            retry_attempts: 5,
            retry_delay_ms: 200,
            aoi_fill_color: "#f39c12".to_string(),
            aoi_fill_opacity: 0.25,
        }
    }
}

impl HighlightConfig {
    fn validate(&self) -> Result<()> {
        self.focused_opacity_ramp()?;
        self.default_opacity_ramp()?;
        ZoomRamp::new(self.focused_line_width.clone())?;
        ZoomRamp::new(self.default_line_width.clone())?;
        Ok(())
    }

    pub fn focused_opacity_ramp(&self) -> Result<ZoomRamp> {
        ZoomRamp::new(self.focused_opacity.clone())?.with_max_slope(self.max_opacity_slope)
    }

    pub fn default_opacity_ramp(&self) -> Result<ZoomRamp> {
        ZoomRamp::new(self.default_opacity.clone())?.with_max_slope(self.max_opacity_slope)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TourConfig {
    pub overview_center: LngLat,
    pub overview_zoom: f64,
    pub themed_zoom: f64,
    pub themed_pitch: f64,
    pub themed_step_duration_ms: u64,
    /// Auto-advance for themed tour steps; `None` waits for the visitor
    pub themed_auto_advance_ms: Option<u64>,
    /// Auto-advance for default tour steps
    pub default_auto_advance_ms: Option<u64>,
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            overview_center: LngLat::new(-73.5, 4.5),
            overview_zoom: 5.0,
            themed_zoom: 11.0,
            themed_pitch: 45.0,
            themed_step_duration_ms: 4_000,
            themed_auto_advance_ms: Some(10_000),
            default_auto_advance_ms: None,
        }
    }
}

impl TourConfig {
    pub fn themed_auto_advance(&self) -> Option<Duration> {
        self.themed_auto_advance_ms.map(Duration::from_millis)
    }

    pub fn default_auto_advance(&self) -> Option<Duration> {
        self.default_auto_advance_ms.map(Duration::from_millis)
    }
}
