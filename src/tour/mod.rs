//! Tours: step data, builders, the presenter seam and the sequencer that runs them

pub mod builder;
pub mod presenter;
pub mod reveal;
pub mod sequencer;
pub mod step;
