//! Hierarchical point clustering
//!
//! [`ClusterIndex`] precomputes one clustering per integer zoom, greedily merging points
//! (and lower-level clusters) that fall within a fixed screen radius of each other. Work
//! happens in unit Web Mercator space so the radius has the same on-screen size at every
//! zoom. A node that survives unmerged to the next coarser level keeps its identity.

use crate::core::{config::ClusterConfig, geo::LngLat};
use crate::Result;
use crate::prelude::HashSet;
use crate::spatial::index::{SpatialIndex, SpatialItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterNode {
    pub id: ClusterId,
    /// Unit mercator position, count-weighted for clusters
    pub position: [f64; 2],
    pub count: usize,
    /// Input index for leaf nodes
    pub point: Option<usize>,
    pub children: Vec<ClusterId>,
    /// Lowest zoom at which this cluster shows its children instead of itself
    pub split_zoom: Option<u8>,
}

impl ClusterNode {
    pub fn is_cluster(&self) -> bool {
        self.point.is_none()
    }

    pub fn center(&self) -> LngLat {
        LngLat::from_unit_mercator(self.position)
    }
}

/// What is drawn at one zoom level
#[derive(Debug, Clone, PartialEq)]
pub enum ClusterEntry {
    Cluster {
        id: ClusterId,
        center: LngLat,
        count: usize,
    },
    Point {
        id: ClusterId,
        index: usize,
        center: LngLat,
    },
}

impl ClusterEntry {
    pub fn id(&self) -> ClusterId {
        match self {
            ClusterEntry::Cluster { id, .. } | ClusterEntry::Point { id, .. } => *id,
        }
    }

    pub fn center(&self) -> LngLat {
        match self {
            ClusterEntry::Cluster { center, .. } | ClusterEntry::Point { center, .. } => *center,
        }
    }

    pub fn count(&self) -> usize {
        match self {
            ClusterEntry::Cluster { count, .. } => *count,
            ClusterEntry::Point { .. } => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClusterIndex {
    radius: f64,
    extent: f64,
    min_zoom: u8,
    max_zoom: u8,
    min_points: usize,
    nodes: Vec<ClusterNode>,
    /// `levels[z - min_zoom]` for `z` in `min_zoom..=max_zoom + 1`; the last level holds
    /// only leaves
    levels: Vec<Vec<ClusterId>>,
    points: usize,
}

impl ClusterIndex {
    /// An empty index for `config`, which is validated first
    pub fn new(config: &ClusterConfig) -> Result<Self> {
        config.validate()?;
        let levels = (config.max_zoom - config.min_zoom) as usize + 2;
        Ok(Self {
            radius: config.radius_px,
            extent: config.extent,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            min_points: config.min_points,
            nodes: Vec::new(),
            levels: vec![Vec::new(); levels],
            points: 0,
        })
    }

    pub fn build(config: &ClusterConfig, points: &[LngLat]) -> Result<Self> {
        let mut index = Self::new(config)?;
        index.load(points);
        Ok(index)
    }

    /// Replaces the indexed points. A point's index is its position in `points`.
    pub fn load(&mut self, points: &[LngLat]) {
        self.nodes = points
            .iter()
            .enumerate()
            .map(|(i, point)| ClusterNode {
                id: ClusterId(i),
                position: point.to_unit_mercator(),
                count: 1,
                point: Some(i),
                children: Vec::new(),
                split_zoom: None,
            })
            .collect();
        self.points = points.len();

        let mut current: Vec<ClusterId> = (0..points.len()).map(ClusterId).collect();
        let top = self.levels.len() - 1;
        self.levels[top] = current.clone();

        for zoom in (self.min_zoom..=self.max_zoom).rev() {
            current = self.cluster_level(&current, zoom);
            self.levels[(zoom - self.min_zoom) as usize] = current.clone();
        }
        log::debug!(
            "cluster index: {} points, {} entries at z{}",
            self.points,
            self.levels[0].len(),
            self.min_zoom
        );
    }

    fn cluster_level(&mut self, previous: &[ClusterId], zoom: u8) -> Vec<ClusterId> {
        let radius = self.radius / (self.extent * 2f64.powi(zoom as i32));
        let tree = SpatialIndex::from_items(
            previous
                .iter()
                .map(|id| SpatialItem::new(self.nodes[id.0].position, *id))
                .collect(),
        );

        let mut visited: HashSet<ClusterId> = HashSet::default();
        let mut level = Vec::with_capacity(previous.len());

        for &id in previous {
            if !visited.insert(id) {
                continue;
            }
            let origin = self.nodes[id.0].position;
            let mut neighbors: Vec<ClusterId> = tree
                .query_radius(origin, radius)
                .into_iter()
                .map(|item| item.data)
                .filter(|neighbor| !visited.contains(neighbor))
                .collect();
            neighbors.sort();

            let count = self.nodes[id.0].count
                + neighbors
                    .iter()
                    .map(|n| self.nodes[n.0].count)
                    .sum::<usize>();
            if neighbors.is_empty() || count < self.min_points {
                level.push(id);
                continue;
            }

            let (mut wx, mut wy) = (0.0, 0.0);
            let mut children = Vec::with_capacity(neighbors.len() + 1);
            children.push(id);
            children.extend(neighbors.iter().copied());
            for child in &children {
                visited.insert(*child);
                let node = &self.nodes[child.0];
                wx += node.position[0] * node.count as f64;
                wy += node.position[1] * node.count as f64;
            }

            let cluster = ClusterId(self.nodes.len());
            self.nodes.push(ClusterNode {
                id: cluster,
                position: [wx / count as f64, wy / count as f64],
                count,
                point: None,
                children,
                split_zoom: Some(zoom + 1),
            });
            level.push(cluster);
        }
        level
    }

    fn level(&self, zoom: f64) -> &[ClusterId] {
        let floor = if zoom.is_finite() { zoom.floor() } else { 0.0 };
        let z = floor.clamp(self.min_zoom as f64, self.max_zoom as f64 + 1.0) as u8;
        &self.levels[(z - self.min_zoom) as usize]
    }

    fn entry(&self, id: ClusterId) -> ClusterEntry {
        let node = &self.nodes[id.0];
        match node.point {
            Some(index) => ClusterEntry::Point {
                id,
                index,
                center: node.center(),
            },
            None => ClusterEntry::Cluster {
                id,
                center: node.center(),
                count: node.count,
            },
        }
    }

    /// Everything drawn at `zoom`
    pub fn clusters_at(&self, zoom: f64) -> Vec<ClusterEntry> {
        self.level(zoom).iter().map(|id| self.entry(*id)).collect()
    }

    pub fn node(&self, id: ClusterId) -> Option<&ClusterNode> {
        self.nodes.get(id.0)
    }

    pub fn children(&self, id: ClusterId) -> Vec<ClusterEntry> {
        self.node(id)
            .map(|node| node.children.iter().map(|c| self.entry(*c)).collect())
            .unwrap_or_default()
    }

    /// Input indices of every point under `id`, ascending
    pub fn leaves(&self, id: ClusterId) -> Vec<usize> {
        let mut leaves = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.node(current) else {
                continue;
            };
            match node.point {
                Some(index) => leaves.push(index),
                None => stack.extend(node.children.iter().copied()),
            }
        }
        leaves.sort_unstable();
        leaves
    }

    /// Zoom at which a cluster splits apart; `None` for points and unknown ids
    pub fn expansion_zoom(&self, id: ClusterId) -> Option<u8> {
        let mut node = self.node(id)?;
        let mut zoom = node.split_zoom?;
        // descend while the split yields a single child cluster
        while node.children.len() == 1 {
            node = self.node(node.children[0])?;
            match node.split_zoom {
                Some(next) => zoom = next,
                None => break,
            }
        }
        Some(zoom)
    }

    /// The entry drawn nearest to `position` at `zoom`, if within `tolerance_px`
    pub fn entry_at(&self, position: LngLat, zoom: f64, tolerance_px: f64) -> Option<ClusterEntry> {
        let target = position.to_unit_mercator();
        let scale = self.extent * 2f64.powf(zoom.clamp(0.0, self.max_zoom as f64 + 1.0));
        let tolerance = tolerance_px / scale;
        self.level(zoom)
            .iter()
            .map(|id| {
                let p = self.nodes[id.0].position;
                let d2 = (p[0] - target[0]).powi(2) + (p[1] - target[1]).powi(2);
                (*id, d2)
            })
            .filter(|(_, d2)| *d2 <= tolerance * tolerance)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| self.entry(id))
    }

    /// Number of indexed points
    pub fn len(&self) -> usize {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points == 0
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }
}
