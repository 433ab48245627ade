pub mod cluster_manager;
pub mod filter;
pub mod tour_markers;
