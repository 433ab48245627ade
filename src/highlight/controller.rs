//! Region highlighting
//!
//! The controller installs one fill/outline layer pair over the region polygons and swaps
//! between two zoom ramps: an emphasized one while a region is focused and a lower default
//! one otherwise. Filter and ramps are committed as a single [`StyleBatch`], so no frame
//! pairs a filter with the other mode's opacity.

use crate::core::{config::HighlightConfig, constants, geo::LngLat, session::MapSession};
use crate::data::geojson::FeatureCollection;
use crate::highlight::{aoi, aoi::AreaOfInterest, ramp::ZoomRamp};
use crate::render::{
    expression::Expression,
    style::{LayerKind, LayerSpec, SourceSpec, StyleBatch},
};
use crate::runtime::{retry_fixed, RetryPolicy};
use crate::Result;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HighlightMode {
    /// All regions visible at the default ceiling
    Default,
    /// One region visible at the emphasized ceiling
    Focused,
}

/// Highlight state of one session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionHighlightState {
    pub active_region: Option<String>,
    /// Mode most recently requested; `None` until the first focus
    pub mode: Option<HighlightMode>,
}

impl RegionHighlightState {
    pub fn is_default(&self) -> bool {
        self.active_region.is_none() && self.mode != Some(HighlightMode::Focused)
    }
}

#[derive(Debug, Clone)]
pub struct RegionHighlightController {
    config: HighlightConfig,
    focused_opacity: ZoomRamp,
    default_opacity: ZoomRamp,
    focused_width: ZoomRamp,
    default_width: ZoomRamp,
}

impl RegionHighlightController {
    pub fn new(config: HighlightConfig) -> Result<Self> {
        Ok(Self {
            focused_opacity: config.focused_opacity_ramp()?,
            default_opacity: config.default_opacity_ramp()?,
            focused_width: ZoomRamp::new(config.focused_line_width.clone())?,
            default_width: ZoomRamp::new(config.default_line_width.clone())?,
            config,
        })
    }

    pub fn config(&self) -> &HighlightConfig {
        &self.config
    }

    pub fn opacity_ramp(&self, mode: HighlightMode) -> &ZoomRamp {
        match mode {
            HighlightMode::Default => &self.default_opacity,
            HighlightMode::Focused => &self.focused_opacity,
        }
    }

    pub fn line_width_ramp(&self, mode: HighlightMode) -> &ZoomRamp {
        match mode {
            HighlightMode::Default => &self.default_width,
            HighlightMode::Focused => &self.focused_width,
        }
    }

    /// Adds the region source and layers, then reapplies whatever focus the session holds.
    /// With the layers already present only the polygons are replaced.
    pub fn install(&self, session: &MapSession, regions: FeatureCollection) -> Result<()> {
        {
            let _guard = session.begin_structural_mutation()?;
            let mode = HighlightMode::Default;
            session.with_renderer(|r| -> Result<()> {
                if r.has_source(constants::REGION_SOURCE) {
                    r.set_source_data(constants::REGION_SOURCE, regions)?;
                } else {
                    r.add_source(constants::REGION_SOURCE, SourceSpec::geojson(regions))?;
                }
                if !r.has_layer(constants::REGION_FILL_LAYER) {
                    r.add_layer(
                        LayerSpec::new(
                            constants::REGION_FILL_LAYER,
                            LayerKind::Fill,
                            constants::REGION_SOURCE,
                        )
                        .with_paint(
                            "fill-color",
                            Expression::literal(self.config.fill_color.clone()),
                        )
                        .with_paint("fill-opacity", self.opacity_ramp(mode).to_expression()),
                    )?;
                }
                if !r.has_layer(constants::REGION_OUTLINE_LAYER) {
                    r.add_layer(
                        LayerSpec::new(
                            constants::REGION_OUTLINE_LAYER,
                            LayerKind::Line,
                            constants::REGION_SOURCE,
                        )
                        .with_paint(
                            "line-color",
                            Expression::literal(self.config.line_color.clone()),
                        )
                        .with_paint("line-width", self.line_width_ramp(mode).to_expression()),
                    )?;
                }
                Ok(())
            })??;
        }
        log::info!("region highlight layers installed");

        let state = session.highlight_state();
        self.focus(session, state.active_region.as_deref());
        Ok(())
    }

    /// Focuses one region, or restores the default look with `None`.
    ///
    /// The session state is updated even when the layers do not exist yet; the returned
    /// flag says whether the renderer was written.
    pub fn focus(&self, session: &MapSession, region: Option<&str>) -> bool {
        let mode = match region {
            Some(_) => HighlightMode::Focused,
            None => HighlightMode::Default,
        };
        session.update_highlight_state(|state| {
            state.active_region = region.map(str::to_string);
            state.mode = Some(mode);
        });

        let filter = region
            .map(|id| Expression::property_equals(self.config.region_id_property.clone(), id));
        let batch = StyleBatch::new()
            .filter(constants::REGION_FILL_LAYER, filter.clone())
            .filter(constants::REGION_OUTLINE_LAYER, filter)
            .paint(
                constants::REGION_FILL_LAYER,
                "fill-opacity",
                self.opacity_ramp(mode).to_expression(),
            )
            .paint(
                constants::REGION_OUTLINE_LAYER,
                "line-width",
                self.line_width_ramp(mode).to_expression(),
            );

        match session.with_renderer(|r| r.apply_batch(batch)) {
            Ok(Ok(())) => {
                log::debug!("region highlight: {:?} ({:?})", region, mode);
                true
            }
            Ok(Err(err)) if err.is_benign() => {
                log::debug!("region highlight deferred: {}", err);
                false
            }
            Ok(Err(err)) => {
                log::warn!("region highlight failed: {}", err);
                false
            }
            Err(err) => {
                log::debug!("region highlight skipped: {}", err);
                false
            }
        }
    }

    pub fn restore_default(&self, session: &MapSession) -> bool {
        self.focus(session, None)
    }

    /// [`focus`](Self::focus) with bounded retries while the layers are still being set up
    pub async fn focus_when_ready(
        &self,
        session: &MapSession,
        region: Option<&str>,
        policy: RetryPolicy,
    ) -> bool {
        retry_fixed(policy, |_| {
            if session.is_torn_down() {
                return Some(false);
            }
            self.focus(session, region).then_some(true)
        })
        .await
        .unwrap_or_else(|| {
            log::warn!(
                "region highlight for {:?} not applied after {} attempts",
                region,
                policy.attempts
            );
            false
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.retry_attempts, self.config.retry_delay())
    }

    /// Region id of the polygon containing `position`
    pub fn region_at(&self, regions: &FeatureCollection, position: LngLat) -> Option<String> {
        regions
            .features
            .iter()
            .find(|feature| {
                feature
                    .geometry
                    .as_ref()
                    .map_or(false, |geometry| geometry.contains(&position))
            })
            .and_then(|feature| feature.property_str(&self.config.region_id_property))
            .map(str::to_string)
    }

    /// Draws (or moves) the area-of-interest overlay
    pub fn show_area_of_interest(&self, session: &MapSession, area: &AreaOfInterest) -> Result<()> {
        let _guard = session.begin_structural_mutation()?;
        let data = area.to_feature_collection();
        session.with_renderer(|r| -> Result<()> {
            if r.has_source(constants::AOI_SOURCE) {
                r.set_source_data(constants::AOI_SOURCE, data)?;
            } else {
                r.add_source(constants::AOI_SOURCE, SourceSpec::geojson(data))?;
            }
            for layer in aoi::layers(&self.config) {
                if !r.has_layer(&layer.id) {
                    r.add_layer(layer)?;
                }
            }
            Ok(())
        })??;
        log::debug!("area of interest {} shown", area.id);
        Ok(())
    }

    /// Removes the overlay; a no-op when none is shown
    pub fn clear_area_of_interest(&self, session: &MapSession) -> Result<()> {
        let _guard = session.begin_structural_mutation()?;
        session.with_renderer(|r| -> Result<()> {
            for layer in [constants::AOI_FILL_LAYER, constants::AOI_OUTLINE_LAYER] {
                if r.has_layer(layer) {
                    r.remove_layer(layer)?;
                }
            }
            if r.has_source(constants::AOI_SOURCE) {
                r.remove_source(constants::AOI_SOURCE)?;
            }
            Ok(())
        })?
    }

    pub fn has_area_of_interest(&self, session: &MapSession) -> bool {
        session
            .with_renderer(|r| r.has_source(constants::AOI_SOURCE))
            .unwrap_or(false)
    }
}
