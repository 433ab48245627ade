use crate::tour::step::TourStep;

/// Where a step sits in its tour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPosition {
    pub index: usize,
    pub total: usize,
}

impl StepPosition {
    pub fn new(index: usize, total: usize) -> Self {
        Self { index, total }
    }

    /// 1-based step number
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.total
    }

    /// Fraction of the tour done once this step is shown
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.number() as f64 / self.total as f64
    }
}

/// Token for one shown narrative overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PresentationHandle(pub u64);

/// Renders a step's narrative overlay. Implemented by the host UI.
pub trait Presenter: Send + Sync {
    fn show(&self, step: &TourStep, position: StepPosition) -> PresentationHandle;

    /// Removes an overlay returned by [`show`](Presenter::show). Called exactly once per
    /// handle, skip and teardown included.
    fn dismiss(&self, handle: PresentationHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position() {
        let first = StepPosition::new(0, 5);
        let last = StepPosition::new(4, 5);
        assert!(first.is_first() && !first.is_last());
        assert!(last.is_last());
        assert_eq!(last.number(), 5);
        assert_eq!(last.progress(), 1.0);
    }
}
