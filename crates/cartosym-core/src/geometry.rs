use serde::{Deserialize, Serialize};

/// A 2D point. Map-space or device-space depending on where it sits in the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Rotate around the origin by `degrees`, clockwise in a y-down device space.
    pub fn rotate(&self, degrees: f64) -> Self {
        let rad = degrees.to_radians();
        let (sin_r, cos_r) = rad.sin_cos();
        Self {
            x: self.x * cos_r - self.y * sin_r,
            y: self.x * sin_r + self.y * cos_r,
        }
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Point,
    pub max: Point,
}

impl BBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn from_coords(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min: Point::new(x1.min(x2), y1.min(y2)),
            max: Point::new(x1.max(x2), y1.max(y2)),
        }
    }

    pub fn from_point(p: Point) -> Self {
        Self { min: p, max: p }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            min: Point::new(min_x, min_y),
            max: Point::new(max_x, max_y),
        })
    }

    /// Extent of an outer ring together with all of its holes.
    pub fn from_rings(exterior: &[Point], holes: &[Vec<Point>]) -> Option<Self> {
        let mut result = BBox::from_points(exterior);
        for hole in holes {
            result = match (result, BBox::from_points(hole)) {
                (Some(a), Some(b)) => Some(a.union(&b)),
                (a, b) => a.or(b),
            };
        }
        result
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn union(&self, other: &BBox) -> Self {
        Self {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Grow by `dx` horizontally and `dy` vertically on each side.
    pub fn buffered(&self, dx: f64, dy: f64) -> Self {
        Self {
            min: Point::new(self.min.x - dx, self.min.y - dy),
            max: Point::new(self.max.x + dx, self.max.y + dy),
        }
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }
}

/// A polygon with an outer ring and zero or more holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<Point>,
    #[serde(default)]
    pub interiors: Vec<Vec<Point>>,
}

impl Polygon {
    pub fn new(exterior: Vec<Point>, interiors: Vec<Vec<Point>>) -> Self {
        Self {
            exterior,
            interiors,
        }
    }

    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_rings(&self.exterior, &self.interiors)
    }

    pub fn vertex_count(&self) -> usize {
        self.exterior.len() + self.interiors.iter().map(Vec::len).sum::<usize>()
    }
}

/// The broad class of a geometry, independent of single/multi part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    Line,
    Polygon,
    #[default]
    Unknown,
}

/// A feature geometry in map coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point(Point),
    LineString(Vec<Point>),
    Polygon(Polygon),
    MultiPoint(Vec<Point>),
    MultiLineString(Vec<Vec<Point>>),
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point(_) | Geometry::MultiPoint(_) => GeometryType::Point,
            Geometry::LineString(_) | Geometry::MultiLineString(_) => GeometryType::Line,
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => GeometryType::Polygon,
        }
    }

    pub fn part_count(&self) -> usize {
        match self {
            Geometry::Point(_) | Geometry::LineString(_) | Geometry::Polygon(_) => 1,
            Geometry::MultiPoint(pts) => pts.len(),
            Geometry::MultiLineString(lines) => lines.len(),
            Geometry::MultiPolygon(polys) => polys.len(),
        }
    }

    pub fn bbox(&self) -> Option<BBox> {
        match self {
            Geometry::Point(p) => Some(BBox::from_point(*p)),
            Geometry::LineString(pts) | Geometry::MultiPoint(pts) => BBox::from_points(pts),
            Geometry::Polygon(p) => p.bbox(),
            Geometry::MultiLineString(lines) => lines
                .iter()
                .filter_map(|l| BBox::from_points(l))
                .reduce(|a, b| a.union(&b)),
            Geometry::MultiPolygon(polys) => polys
                .iter()
                .filter_map(Polygon::bbox)
                .reduce(|a, b| a.union(&b)),
        }
    }
}

/// Translate every point of every ring by (dx, dy), returning new rings.
pub fn translate_rings(rings: &[Vec<Point>], dx: f64, dy: f64) -> Vec<Vec<Point>> {
    rings
        .iter()
        .map(|ring| ring.iter().map(|p| p.translate(dx, dy)).collect())
        .collect()
}
