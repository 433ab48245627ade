use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// A point item that can be indexed via an R-tree. Coordinates are planar; callers pick
/// the projection.
#[derive(Debug, Clone)]
pub struct SpatialItem<T> {
    pub position: [f64; 2],
    pub data: T,
}

impl<T> SpatialItem<T> {
    pub fn new(position: [f64; 2], data: T) -> Self {
        Self { position, data }
    }
}

impl<T: PartialEq> PartialEq for SpatialItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position && self.data == other.data
    }
}

// --- rstar integration -------------------------------------------------------------------------

impl<T> RTreeObject for SpatialItem<T> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl<T> PointDistance for SpatialItem<T> {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        dx * dx + dy * dy
    }
}

/// R-tree based spatial index
pub struct SpatialIndex<T> {
    rtree: RTree<SpatialItem<T>>,
}

impl<T> SpatialIndex<T> {
    pub fn new() -> Self {
        Self {
            rtree: RTree::new(),
        }
    }

    /// Bulk-loads the tree, which packs better than repeated inserts
    pub fn from_items(items: Vec<SpatialItem<T>>) -> Self {
        Self {
            rtree: RTree::bulk_load(items),
        }
    }

    pub fn insert(&mut self, item: SpatialItem<T>) {
        self.rtree.insert(item);
    }

    pub fn query(&self, min: [f64; 2], max: [f64; 2]) -> Vec<&SpatialItem<T>> {
        let envelope = AABB::from_corners(min, max);
        self.rtree.locate_in_envelope(&envelope).collect()
    }

    /// Items within `radius` of `center`
    pub fn query_radius(&self, center: [f64; 2], radius: f64) -> Vec<&SpatialItem<T>> {
        // rstar takes the squared distance
        self.rtree
            .locate_within_distance(center, radius * radius)
            .collect()
    }

    pub fn nearest(&self, point: [f64; 2]) -> Option<&SpatialItem<T>> {
        self.rtree.nearest_neighbor(&point)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpatialItem<T>> {
        self.rtree.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }

    pub fn clear(&mut self) {
        self.rtree = RTree::new();
    }
}

impl<T: PartialEq> SpatialIndex<T> {
    pub fn remove(&mut self, item: &SpatialItem<T>) -> Option<SpatialItem<T>> {
        self.rtree.remove(item)
    }
}

impl<T> Default for SpatialIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}
