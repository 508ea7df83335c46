//! Fill symbol operations and ring helpers used by fill layers.

use cartosym_core::geometry::{BBox, Point};

pub use cartosym_core::geometry::translate_rings;

use super::Symbol;

/// Bounding box of a polygon's exterior together with its holes.
pub fn polygon_bounds(exterior: &[Point], holes: Option<&[Vec<Point>]>) -> Option<BBox> {
    BBox::from_rings(exterior, holes.unwrap_or_default())
}

impl Symbol {
    /// Fill angles are absolute: every fill layer gets `angle`.
    pub(super) fn set_fill_angle(&mut self, angle: f64) {
        for layer in self.layers.iter_mut() {
            if let Some(fill) = layer.fill_properties_mut() {
                fill.angle = angle;
            }
        }
    }
}
