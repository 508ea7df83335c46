use cartosym_core::geometry::{BBox, Point};
use serde::{Deserialize, Serialize};

/// Affine mapping from map units to device pixels.
///
/// Map y grows upwards, device y grows downwards. The map center lands on the
/// canvas center and the map is rotated by `rotation` degrees around it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapToPixel {
    map_units_per_pixel: f64,
    center_x: f64,
    center_y: f64,
    width: f64,
    height: f64,
    rotation: f64,
    /// `[a, b, c, d, e, f]` with `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
    matrix: [f64; 6],
}

impl MapToPixel {
    pub fn new(
        map_units_per_pixel: f64,
        center_x: f64,
        center_y: f64,
        width: f64,
        height: f64,
        rotation: f64,
    ) -> Self {
        let m = if map_units_per_pixel > 0.0 {
            map_units_per_pixel
        } else {
            1.0
        };
        let (sin_r, cos_r) = rotation.to_radians().sin_cos();
        let matrix = [
            cos_r / m,
            -sin_r / m,
            -sin_r / m,
            -cos_r / m,
            width / 2.0 - (cos_r * center_x - sin_r * center_y) / m,
            height / 2.0 + (sin_r * center_x + cos_r * center_y) / m,
        ];
        Self {
            map_units_per_pixel: m,
            center_x,
            center_y,
            width,
            height,
            rotation,
            matrix,
        }
    }

    /// Pass-through mapping: device coordinates equal map coordinates.
    pub fn identity() -> Self {
        Self {
            map_units_per_pixel: 1.0,
            center_x: 0.0,
            center_y: 0.0,
            width: 0.0,
            height: 0.0,
            rotation: 0.0,
            matrix: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        }
    }

    /// Fit `extent` into a `width` x `height` canvas, keeping the aspect ratio.
    pub fn from_extent(extent: &BBox, width: f64, height: f64) -> Self {
        let mupp = if width > 0.0 && height > 0.0 {
            (extent.width() / width).max(extent.height() / height)
        } else {
            1.0
        };
        let center = extent.center();
        Self::new(mupp, center.x, center.y, width, height, 0.0)
    }

    pub fn map_units_per_pixel(&self) -> f64 {
        self.map_units_per_pixel
    }

    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Whether the canvas covers any pixels at all.
    pub fn has_canvas_size(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn is_identity(&self) -> bool {
        self.matrix == [1.0, 0.0, 0.0, 1.0, 0.0, 0.0]
    }

    pub fn transform_in_place(&self, x: &mut f64, y: &mut f64) {
        let [a, b, c, d, e, f] = self.matrix;
        let (mx, my) = (*x, *y);
        *x = a * mx + c * my + e;
        *y = b * mx + d * my + f;
    }

    pub fn transform(&self, p: &Point) -> Point {
        let (mut x, mut y) = (p.x, p.y);
        self.transform_in_place(&mut x, &mut y);
        Point::new(x, y)
    }

    /// Inverse mapping from device pixels back to map units.
    pub fn to_map_coordinates(&self, p: &Point) -> Point {
        let [a, b, c, d, e, f] = self.matrix;
        let det = a * d - b * c;
        let (x, y) = (p.x - e, p.y - f);
        Point::new((d * x - c * y) / det, (a * y - b * x) / det)
    }

    /// The map-space extent covered by the canvas.
    pub fn visible_extent(&self) -> BBox {
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(self.width, 0.0),
            Point::new(self.width, self.height),
            Point::new(0.0, self.height),
        ]
        .map(|c| self.to_map_coordinates(&c));
        BBox::from_points(&corners).unwrap_or_else(|| {
            BBox::from_point(Point::new(self.center_x, self.center_y))
        })
    }
}

impl Default for MapToPixel {
    fn default() -> Self {
        Self::identity()
    }
}
