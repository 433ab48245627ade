pub mod aoi;
pub mod controller;
pub mod ramp;
