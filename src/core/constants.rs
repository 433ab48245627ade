//! Engine-wide constants for clustering, highlighting and layer naming.
//! Keeping them in a single place makes it easier to tweak the magic numbers.

/// Cluster radius in screen pixels. Large on purpose so that individual markers stay rare
/// below [`CLUSTER_MAX_ZOOM`].
pub const CLUSTER_RADIUS_PX: f64 = 50.0;

/// Highest zoom at which points are still merged into clusters.
pub const CLUSTER_MAX_ZOOM: u8 = 14;

/// Upper bound accepted for a configured cluster max zoom.
pub const CLUSTER_ZOOM_LIMIT: u8 = 24;

/// Lowest zoom the cluster index is built for.
pub const CLUSTER_MIN_ZOOM: u8 = 0;

/// Minimum number of points that form a cluster.
pub const CLUSTER_MIN_POINTS: usize = 2;

/// Tile extent the cluster radius is measured against (pixels).
pub const CLUSTER_EXTENT: f64 = 512.0;

/// Point-count thresholds of the cluster size bands: small `< 10`, medium `< 50`, large.
pub const CLUSTER_BAND_THRESHOLDS: (u64, u64) = (10, 50);

/// How far a single click may zoom into a cluster.
pub const MAX_CLUSTER_ZOOM_INCREMENT: f64 = 2.0;

/// Zoom by which region highlighting has faded out.
pub const HIGHLIGHT_FADE_ZOOM: f64 = 10.0;

/// Renderer zoom limits.
pub const MIN_ZOOM: f64 = 0.0;
pub const MAX_ZOOM: f64 = 22.0;

/// Source and layer identifiers owned by this crate.
pub const MEMORY_SOURCE: &str = "memories";
pub const CLUSTER_LAYER: &str = "memory-clusters";
pub const CLUSTER_COUNT_LAYER: &str = "memory-cluster-count";
pub const POINT_LAYER: &str = "memory-points";

pub const REGION_SOURCE: &str = "regions";
pub const REGION_FILL_LAYER: &str = "region-fill";
pub const REGION_OUTLINE_LAYER: &str = "region-outline";

pub const AOI_SOURCE: &str = "area-of-interest";
pub const AOI_FILL_LAYER: &str = "area-of-interest-fill";
pub const AOI_OUTLINE_LAYER: &str = "area-of-interest-outline";

pub const TOUR_MARKER_SOURCE: &str = "tour-markers";
pub const TOUR_MARKER_LAYER: &str = "tour-markers-circle";
pub const TOUR_MARKER_LABEL_LAYER: &str = "tour-markers-label";

/// Feature property carrying the region identifier of a region polygon.
pub const REGION_ID_PROPERTY: &str = "region_id";

/// Default camera flight duration in milliseconds.
pub const DEFAULT_MOTION_DURATION_MS: u64 = 3_000;
