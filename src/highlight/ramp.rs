use crate::render::expression::{interpolate_linear, Expression};
use crate::{MapError, Result};
use serde::Serialize;

/// A continuous, non-increasing function of zoom, linear between stops and flat outside
/// them. The renderer re-evaluates it on every frame once installed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoomRamp {
    stops: Vec<(f64, f64)>,
    max_slope: Option<f64>,
}

impl ZoomRamp {
    /// Builds a ramp from `[zoom, value]` stops. Zooms must strictly increase and values
    /// must never increase.
    pub fn new(stops: Vec<[f64; 2]>) -> Result<Self> {
        if stops.is_empty() {
            return Err(MapError::InvalidRamp("a ramp needs at least one stop".to_string()));
        }
        if let Some(bad) = stops.iter().find(|s| !s[0].is_finite() || !s[1].is_finite()) {
            return Err(MapError::InvalidRamp(format!("non-finite stop {:?}", bad)));
        }
        for pair in stops.windows(2) {
            let ([z0, v0], [z1, v1]) = (pair[0], pair[1]);
            if z1 <= z0 {
                return Err(MapError::InvalidRamp(format!(
                    "zoom stops must strictly increase ({} then {})",
                    z0, z1
                )));
            }
            if v1 > v0 {
                return Err(MapError::InvalidRamp(format!(
                    "values must not increase with zoom ({} at z{} then {} at z{})",
                    v0, z0, v1, z1
                )));
            }
        }
        Ok(Self {
            stops: stops.into_iter().map(|[z, v]| (z, v)).collect(),
            max_slope: None,
        })
    }

    /// Rejects the ramp if any segment changes faster than `max_slope` per zoom level
    pub fn with_max_slope(mut self, max_slope: f64) -> Result<Self> {
        let steepest = self.steepest_slope();
        if steepest > max_slope + 1e-9 {
            return Err(MapError::InvalidRamp(format!(
                "slope {:.4} per zoom exceeds the limit of {:.4}",
                steepest, max_slope
            )));
        }
        self.max_slope = Some(max_slope);
        Ok(self)
    }

    pub fn stops(&self) -> &[(f64, f64)] {
        &self.stops
    }

    pub fn max_slope(&self) -> Option<f64> {
        self.max_slope
    }

    /// Value at the lowest zoom
    pub fn ceiling(&self) -> f64 {
        self.stops.first().map_or(0.0, |s| s.1)
    }

    /// Largest per-zoom change over all segments
    pub fn steepest_slope(&self) -> f64 {
        self.stops
            .windows(2)
            .map(|pair| ((pair[1].1 - pair[0].1) / (pair[1].0 - pair[0].0)).abs())
            .fold(0.0, f64::max)
    }

    pub fn value_at(&self, zoom: f64) -> f64 {
        interpolate_linear(&self.stops, zoom).unwrap_or(0.0)
    }

    pub fn to_expression(&self) -> Expression {
        Expression::interpolate_zoom(self.stops.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::HighlightConfig;
    use crate::render::expression::EvalContext;

    #[test]
    fn test_rejects_bad_stops() {
        assert!(ZoomRamp::new(vec![]).is_err());
        assert!(ZoomRamp::new(vec![[5.0, 0.5], [5.0, 0.2]]).is_err());
        assert!(ZoomRamp::new(vec![[5.0, 0.2], [8.0, 0.5]]).is_err());
        assert!(ZoomRamp::new(vec![[5.0, f64::NAN]]).is_err());
    }

    #[test]
    fn test_slope_limit() {
        let steep = ZoomRamp::new(vec![[5.0, 1.0], [6.0, 0.0]]).unwrap();
        assert!(steep.clone().with_max_slope(0.15).is_err());
        assert!(steep.with_max_slope(1.0).is_ok());
    }

    #[test]
    fn test_opacity_is_continuous_between_six_and_ten() {
        let config = HighlightConfig::default();
        for ramp in [
            config.focused_opacity_ramp().unwrap(),
            config.default_opacity_ramp().unwrap(),
        ] {
            let limit = ramp.max_slope().unwrap();
            let samples: Vec<f64> = (6..=10).map(|z| ramp.value_at(z as f64)).collect();
            for pair in samples.windows(2) {
                assert!(pair[1] <= pair[0], "not monotonic: {:?}", samples);
                assert!(pair[0] - pair[1] <= limit + 1e-9, "jump in {:?}", samples);
            }
            // fine sampling never jumps either
            let mut previous = ramp.value_at(6.0);
            for step in 1..=400 {
                let value = ramp.value_at(6.0 + step as f64 * 0.01);
                assert!(value <= previous + 1e-12);
                assert!(previous - value <= limit * 0.01 + 1e-9);
                previous = value;
            }
        }
    }

    #[test]
    fn test_focused_ceiling_is_higher() {
        let config = HighlightConfig::default();
        let focused = config.focused_opacity_ramp().unwrap();
        let default = config.default_opacity_ramp().unwrap();
        assert!(focused.ceiling() > default.ceiling());
        assert!(focused.value_at(10.0) < 0.05);
        assert!(default.value_at(12.0) < 0.05);
    }

    #[test]
    fn test_expression_matches_rust_evaluation() {
        let ramp = HighlightConfig::default().focused_opacity_ramp().unwrap();
        let expr = ramp.to_expression();
        for zoom in [3.0, 5.0, 6.5, 8.0, 9.25, 10.0, 14.0] {
            let rendered = expr.evaluate_f64(&EvalContext::at_zoom(zoom)).unwrap();
            assert!((rendered - ramp.value_at(zoom)).abs() < 1e-12);
        }
    }
}
