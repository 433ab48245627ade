//! Memory locations: the points the marker engine clusters and the tours visit

use crate::core::geo::LngLat;
use crate::data::geojson::{Feature, Geometry};
use crate::{MapError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryCategory {
    Museum,
    Memorial,
    Monument,
    Mural,
    Archive,
    Sanctuary,
    CommunityInitiative,
    Other,
}

impl MemoryCategory {
    pub const ALL: [MemoryCategory; 8] = [
        MemoryCategory::Museum,
        MemoryCategory::Memorial,
        MemoryCategory::Monument,
        MemoryCategory::Mural,
        MemoryCategory::Archive,
        MemoryCategory::Sanctuary,
        MemoryCategory::CommunityInitiative,
        MemoryCategory::Other,
    ];

    /// Stable key used in feature properties
    pub fn key(&self) -> &'static str {
        match self {
            MemoryCategory::Museum => "museum",
            MemoryCategory::Memorial => "memorial",
            MemoryCategory::Monument => "monument",
            MemoryCategory::Mural => "mural",
            MemoryCategory::Archive => "archive",
            MemoryCategory::Sanctuary => "sanctuary",
            MemoryCategory::CommunityInitiative => "community-initiative",
            MemoryCategory::Other => "other",
        }
    }

    /// Marker color for unclustered points
    pub fn color(&self) -> &'static str {
        match self {
            MemoryCategory::Museum => "#8e44ad",
            MemoryCategory::Memorial => "#c0392b",
            MemoryCategory::Monument => "#d35400",
            MemoryCategory::Mural => "#16a085",
            MemoryCategory::Archive => "#2c3e50",
            MemoryCategory::Sanctuary => "#27ae60",
            MemoryCategory::CommunityInitiative => "#2980b9",
            MemoryCategory::Other => "#7f8c8d",
        }
    }
}

/// The six natural regions of Colombia
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacroRegion {
    Caribe,
    Andina,
    Pacifica,
    Orinoquia,
    Amazonia,
    Insular,
}

impl MacroRegion {
    pub const ALL: [MacroRegion; 6] = [
        MacroRegion::Caribe,
        MacroRegion::Andina,
        MacroRegion::Pacifica,
        MacroRegion::Orinoquia,
        MacroRegion::Amazonia,
        MacroRegion::Insular,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            MacroRegion::Caribe => "caribe",
            MacroRegion::Andina => "andina",
            MacroRegion::Pacifica => "pacifica",
            MacroRegion::Orinoquia => "orinoquia",
            MacroRegion::Amazonia => "amazonia",
            MacroRegion::Insular => "insular",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|region| region.key() == key)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MacroRegion::Caribe => "Caribe",
            MacroRegion::Andina => "Andina",
            MacroRegion::Pacifica => "Pacífica",
            MacroRegion::Orinoquia => "Orinoquía",
            MacroRegion::Amazonia => "Amazonía",
            MacroRegion::Insular => "Insular",
        }
    }
}

impl std::fmt::Display for MacroRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A place of memory. Loaded once by the host and only read here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryLocation {
    pub id: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub title: String,
    #[serde(rename = "type")]
    pub category: MemoryCategory,
    pub region: MacroRegion,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub description: String,
    /// Short code tours use to refer to the location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl MemoryLocation {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        position: LngLat,
        category: MemoryCategory,
        region: MacroRegion,
    ) -> Self {
        Self {
            id: id.into(),
            latitude: Some(position.lat),
            longitude: Some(position.lng),
            title: title.into(),
            category,
            region,
            department: String::new(),
            description: String::new(),
            code: None,
        }
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = department.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Validated position; missing, non-finite or out-of-range coordinates are an error
    pub fn position(&self) -> Result<LngLat> {
        let malformed = |reason: &str| MapError::MalformedLocation {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        let lat = self.latitude.ok_or_else(|| malformed("missing latitude"))?;
        let lng = self.longitude.ok_or_else(|| malformed("missing longitude"))?;
        let position = LngLat::new(lng, lat);
        if !position.is_valid() {
            return Err(malformed(&format!("coordinates out of range ({lat}, {lng})")));
        }
        Ok(position)
    }

    /// Projects the location into a point feature. Properties carry nothing that is not
    /// derived from the location itself.
    pub fn to_feature(&self) -> Result<Feature> {
        let position = self.position()?;
        let mut feature = Feature::new(Geometry::point(position))
            .with_id(self.id.clone())
            .with_property("id", self.id.clone())
            .with_property("title", self.title.clone())
            .with_property("category", self.category.key())
            .with_property("region", self.region.key())
            .with_property("department", self.department.clone());
        if let Some(code) = &self.code {
            feature = feature.with_property("code", code.clone());
        }
        Ok(feature)
    }

    pub fn list_from_json(json: &str) -> Result<Vec<MemoryLocation>> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryLocation {
        MemoryLocation::new(
            "m-001",
            "Museo Casa de la Memoria",
            LngLat::new(-75.56, 6.25),
            MemoryCategory::Museum,
            MacroRegion::Andina,
        )
        .with_department("Antioquia")
        .with_code("MED")
    }

    #[test]
    fn test_feature_projection() {
        let feature = sample().to_feature().unwrap();
        assert_eq!(feature.property_str("id"), Some("m-001"));
        assert_eq!(feature.property_str("category"), Some("museum"));
        assert_eq!(feature.property_str("region"), Some("andina"));
        assert_eq!(feature.property_str("code"), Some("MED"));
        assert_eq!(
            feature.geometry,
            Some(Geometry::point(LngLat::new(-75.56, 6.25)))
        );
    }

    #[test]
    fn test_missing_coordinates_are_malformed() {
        let mut location = sample();
        location.latitude = None;
        assert!(matches!(
            location.position(),
            Err(MapError::MalformedLocation { .. })
        ));

        location.latitude = Some(f64::NAN);
        assert!(location.to_feature().is_err());

        location.latitude = Some(123.0);
        assert!(location.position().is_err());
    }

    #[test]
    fn test_list_from_json() {
        let json = r#"[
            { "id": "a", "latitude": 10.4, "longitude": -75.5, "title": "A",
              "type": "memorial", "region": "caribe", "department": "Bolívar" },
            { "id": "b", "title": "B", "type": "community-initiative", "region": "pacifica" }
        ]"#;
        let locations = MemoryLocation::list_from_json(json).unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].category, MemoryCategory::Memorial);
        assert_eq!(locations[1].category, MemoryCategory::CommunityInitiative);
        assert!(locations[1].position().is_err());
        assert_eq!(MacroRegion::from_key("pacifica"), Some(MacroRegion::Pacifica));
    }
}
