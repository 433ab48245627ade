use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Mean earth radius used for great-circle math (metres)
pub const EARTH_RADIUS: f64 = 6_371_008.8;
const MAX_LATITUDE: f64 = 85.0511287798;

/// A geographical coordinate in renderer order: longitude first, latitude second.
///
/// Serializes as a `[lng, lat]` pair, which is the order GeoJSON and style
/// expressions use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    /// Creates a new coordinate
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Validates that the coordinates are finite and within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Calculates the distance to another coordinate using the Haversine formula
    pub fn distance_to(&self, other: &LngLat) -> f64 {
        let lat1_rad = self.lat.to_radians();
        let lat2_rad = other.lat.to_radians();
        let delta_lat = (other.lat - self.lat).to_radians();
        let delta_lng = (other.lng - self.lng).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS * c
    }

    /// Point reached by travelling `distance_m` metres along `bearing_deg` from here
    pub fn destination(&self, bearing_deg: f64, distance_m: f64) -> LngLat {
        let angular = distance_m / EARTH_RADIUS;
        let bearing = bearing_deg.to_radians();
        let lat1 = self.lat.to_radians();
        let lng1 = self.lng.to_radians();

        let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
        let lng2 = lng1
            + (bearing.sin() * angular.sin() * lat1.cos())
                .atan2(angular.cos() - lat1.sin() * lat2.sin());

        LngLat::new(Self::wrap_lng(lng2.to_degrees()), lat2.to_degrees())
    }

    /// Wraps longitude to [-180, 180] range
    pub fn wrap_lng(lng: f64) -> f64 {
        let wrapped = lng % 360.0;
        if wrapped > 180.0 {
            wrapped - 360.0
        } else if wrapped < -180.0 {
            wrapped + 360.0
        } else {
            wrapped
        }
    }

    /// Clamps latitude to the Web Mercator range
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }

    /// Projects into Web Mercator unit space, `[0, 1]` on both axes, y growing south.
    pub fn to_unit_mercator(&self) -> [f64; 2] {
        let x = self.lng / 360.0 + 0.5;
        let sin = Self::clamp_lat(self.lat).to_radians().sin();
        let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
        [x, y.clamp(0.0, 1.0)]
    }

    /// Inverse of [`LngLat::to_unit_mercator`]
    pub fn from_unit_mercator(point: [f64; 2]) -> Self {
        let lng = (point[0] - 0.5) * 360.0;
        let y2 = (180.0 - point[1] * 360.0) * PI / 180.0;
        let lat = 360.0 * y2.exp().atan() / PI - 90.0;
        Self::new(lng, lat)
    }

    /// Linear interpolation, taking the short way around the antimeridian
    pub fn lerp(&self, other: &LngLat, t: f64) -> LngLat {
        let mut delta_lng = other.lng - self.lng;
        if delta_lng > 180.0 {
            delta_lng -= 360.0;
        } else if delta_lng < -180.0 {
            delta_lng += 360.0;
        }
        LngLat::new(
            Self::wrap_lng(self.lng + delta_lng * t),
            self.lat + (other.lat - self.lat) * t,
        )
    }
}

impl Default for LngLat {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl From<[f64; 2]> for LngLat {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<LngLat> for [f64; 2] {
    fn from(value: LngLat) -> Self {
        [value.lng, value.lat]
    }
}
