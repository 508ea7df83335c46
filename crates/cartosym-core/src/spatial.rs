use rstar::{RTree, RTreeObject, AABB};

use crate::feature::{Feature, FeatureId};
use crate::geometry::{BBox, Point};

/// An entry in the R-tree spatial index, referencing a feature by position and id.
#[derive(Debug, Clone)]
pub struct SpatialEntry {
    /// Position of the feature in the batch the index was built from.
    pub feature_index: usize,
    pub feature_id: FeatureId,
    /// Bounding box of the feature geometry in map units.
    pub bbox: BBox,
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min.x, self.bbox.min.y],
            [self.bbox.max.x, self.bbox.max.y],
        )
    }
}

/// Spatial index over feature bounds for extent culling and point picking.
pub struct FeatureIndex {
    tree: RTree<SpatialEntry>,
}

impl FeatureIndex {
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Bulk-load the index from a feature batch. Features without geometry are skipped.
    pub fn from_features(features: &[Feature]) -> Self {
        Self::from_features_with(features, |bbox| Some(*bbox))
    }

    /// Like [`from_features`](Self::from_features), but every geometry box is
    /// passed through `map_bbox` first, e.g. to reproject it. Features whose
    /// box maps to `None` are skipped.
    pub fn from_features_with<F>(features: &[Feature], map_bbox: F) -> Self
    where
        F: Fn(&BBox) -> Option<BBox>,
    {
        let entries = features
            .iter()
            .enumerate()
            .filter_map(|(i, f)| {
                let bbox = map_bbox(&f.geometry.as_ref()?.bbox()?)?;
                Some(SpatialEntry {
                    feature_index: i,
                    feature_id: f.id,
                    bbox,
                })
            })
            .collect();
        Self::build(entries)
    }

    pub fn build(entries: Vec<SpatialEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn insert(&mut self, entry: SpatialEntry) {
        self.tree.insert(entry);
    }

    /// Find all entries whose bounding box contains the given point,
    /// boundary included.
    pub fn query_point(&self, point: &Point) -> Vec<&SpatialEntry> {
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point([point.x, point.y]))
            .collect()
    }

    /// Find all entries that intersect the given extent.
    pub fn query_extent(&self, extent: &BBox) -> Vec<&SpatialEntry> {
        let envelope = AABB::from_corners(
            [extent.min.x, extent.min.y],
            [extent.max.x, extent.max.y],
        );
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl Default for FeatureIndex {
    fn default() -> Self {
        Self::new()
    }
}
