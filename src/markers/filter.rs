use crate::data::location::{MacroRegion, MemoryCategory, MemoryLocation};
use serde::{Deserialize, Serialize};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Which locations count as visible. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub region: Option<MacroRegion>,
    pub department: Option<String>,
    pub category: Option<MemoryCategory>,
}

impl FilterCriteria {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn region(region: MacroRegion) -> Self {
        Self {
            region: Some(region),
            ..Self::default()
        }
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_category(mut self, category: MemoryCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_none() && self.department.is_none() && self.category.is_none()
    }

    pub fn matches(&self, location: &MemoryLocation) -> bool {
        self.region.map_or(true, |region| location.region == region)
            && self.category.map_or(true, |category| location.category == category)
            && self.department.as_deref().map_or(true, |department| {
                fold_department(&location.department) == fold_department(department)
            })
    }
}

/// Lowercased with diacritics stripped, so "CHOCÓ", "Choco" and "chocó" compare equal
pub fn fold_department(name: &str) -> String {
    name.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}
