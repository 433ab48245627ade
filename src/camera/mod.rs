pub mod motion;
pub mod pose;
