use crate::markers::tour_markers::TourMarker;
use crate::tour::step::TourStep;
use fxhash::FxHashSet as HashSet;
use serde::{Deserialize, Serialize};

/// Which tour markers are on the map at a given step.
///
/// Both policies are pure functions of the step index, the step list and the marker
/// catalogue, so replaying a tour always shows the same markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealPolicy {
    /// Every marker whose code appeared on steps `0..=i`; never shrinks
    #[default]
    Cumulative,
    /// The first `ceil(len * i / (total - 1))` catalogue markers
    ProportionalPrefix,
}

impl RevealPolicy {
    pub fn markers_at(
        &self,
        index: usize,
        steps: &[TourStep],
        markers: &[TourMarker],
    ) -> Vec<TourMarker> {
        let index = index.min(steps.len().saturating_sub(1));
        let explicit: HashSet<&str> = steps
            .iter()
            .take(index + 1)
            .flat_map(TourStep::revealed_codes)
            .collect();

        match self {
            RevealPolicy::Cumulative => markers
                .iter()
                .filter(|marker| explicit.contains(marker.code.as_str()))
                .cloned()
                .collect(),
            RevealPolicy::ProportionalPrefix => {
                let prefix = prefix_len(index, steps.len(), markers.len());
                markers
                    .iter()
                    .enumerate()
                    .filter(|(i, marker)| *i < prefix || explicit.contains(marker.code.as_str()))
                    .map(|(_, marker)| marker.clone())
                    .collect()
            }
        }
    }
}

/// `ceil(len * index / (total - 1))`, capped at `len`
pub fn prefix_len(index: usize, total: usize, len: usize) -> usize {
    if total <= 1 {
        return len;
    }
    let denominator = total - 1;
    ((len * index + denominator - 1) / denominator).min(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::pose::CameraPose;
    use crate::core::geo::LngLat;
    use crate::tour::step::SideEffect;

    fn marker(code: &str) -> TourMarker {
        TourMarker::new(code, LngLat::new(-74.0, 4.6), code)
    }

    fn step(code: Option<&str>) -> TourStep {
        let step = TourStep::new("s", "", CameraPose::new(LngLat::new(-74.0, 4.6), 6.0));
        match code {
            Some(code) => step.with_location(code),
            None => step,
        }
    }

    #[test]
    fn test_prefix_len() {
        assert_eq!(prefix_len(0, 5, 3), 0);
        assert_eq!(prefix_len(1, 5, 3), 1);
        assert_eq!(prefix_len(2, 5, 3), 2);
        assert_eq!(prefix_len(3, 5, 3), 3);
        assert_eq!(prefix_len(4, 5, 3), 3);
        assert_eq!(prefix_len(0, 1, 3), 3);
    }

    #[test]
    fn test_cumulative_follows_codes() {
        let steps = vec![
            step(None),
            step(Some("B")),
            step(Some("A")).on_reach(SideEffect::RevealLocation("C".into())),
            step(None),
        ];
        let markers = vec![marker("A"), marker("B"), marker("C"), marker("D")];
        let codes = |i| {
            RevealPolicy::Cumulative
                .markers_at(i, &steps, &markers)
                .into_iter()
                .map(|m| m.code)
                .collect::<Vec<_>>()
        };
        assert!(codes(0).is_empty());
        assert_eq!(codes(1), vec!["B"]);
        assert_eq!(codes(2), vec!["A", "B", "C"]);
        assert_eq!(codes(3), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_proportional_prefix_is_deterministic() {
        let steps: Vec<_> = (0..5).map(|_| step(None)).collect();
        let markers = vec![marker("A"), marker("B"), marker("C")];
        let first = RevealPolicy::ProportionalPrefix.markers_at(2, &steps, &markers);
        let second = RevealPolicy::ProportionalPrefix.markers_at(2, &steps, &markers);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }
}
