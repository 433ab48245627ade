pub mod geojson;
pub mod location;
