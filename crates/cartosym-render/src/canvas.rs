//! The paint surface symbols draw on, in device pixels.
//!
//! Opacity is carried in the alpha channel of every color; a canvas composites
//! each primitive over what it already holds.

use std::f64::consts::PI;

use cartosym_core::geometry::Point;
use cartosym_core::Color;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PenStyle {
    #[default]
    Solid,
    Dash,
    Dot,
    DashDot,
    NoPen,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinStyle {
    Miter,
    #[default]
    Bevel,
    Round,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapStyle {
    Flat,
    #[default]
    Square,
    Round,
}

/// Pen used to outline shapes and draw lines. Widths are in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: Color,
    pub width: f64,
    pub style: PenStyle,
    pub join: JoinStyle,
    pub cap: CapStyle,
    /// Explicit dash lengths in pixels, overriding `style`.
    #[serde(default)]
    pub dash_pattern: Vec<f64>,
}

impl Stroke {
    pub fn new(color: Color, width: f64) -> Self {
        Self {
            color,
            width,
            style: PenStyle::Solid,
            join: JoinStyle::default(),
            cap: CapStyle::default(),
            dash_pattern: Vec::new(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.style != PenStyle::NoPen && !self.color.is_transparent()
    }

    /// Dash lengths in pixels, or `None` for a continuous line.
    pub fn effective_dash_pattern(&self) -> Option<Vec<f64>> {
        if !self.dash_pattern.is_empty() {
            return Some(self.dash_pattern.clone());
        }
        let w = self.width.max(1.0);
        match self.style {
            PenStyle::Solid | PenStyle::NoPen => None,
            PenStyle::Dash => Some(vec![4.0 * w, 2.0 * w]),
            PenStyle::Dot => Some(vec![w, 2.0 * w]),
            PenStyle::DashDot => Some(vec![4.0 * w, 2.0 * w, w, 2.0 * w]),
        }
    }
}

/// Shapes a simple marker can stamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerShape {
    Square,
    Diamond,
    Triangle,
    #[default]
    Circle,
    Cross,
}

/// Segments used to approximate circles.
const CIRCLE_SEGMENTS: usize = 32;

impl MarkerShape {
    /// Cross is drawn with the pen only.
    pub fn is_filled(&self) -> bool {
        !matches!(self, MarkerShape::Cross)
    }

    /// Unrotated outline for a marker of diameter `size`, centered on the origin.
    /// For `Cross` the four points are the ends of two segments.
    pub fn outline(&self, size: f64) -> Vec<Point> {
        let h = size / 2.0;
        match self {
            MarkerShape::Square => vec![
                Point::new(-h, -h),
                Point::new(h, -h),
                Point::new(h, h),
                Point::new(-h, h),
            ],
            MarkerShape::Diamond => vec![
                Point::new(0.0, -h),
                Point::new(h, 0.0),
                Point::new(0.0, h),
                Point::new(-h, 0.0),
            ],
            MarkerShape::Triangle => vec![
                Point::new(0.0, -h),
                Point::new(h, h),
                Point::new(-h, h),
            ],
            MarkerShape::Circle => (0..CIRCLE_SEGMENTS)
                .map(|i| {
                    let t = 2.0 * PI * i as f64 / CIRCLE_SEGMENTS as f64;
                    Point::new(h * t.cos(), h * t.sin())
                })
                .collect(),
            MarkerShape::Cross => vec![
                Point::new(-h, 0.0),
                Point::new(h, 0.0),
                Point::new(0.0, -h),
                Point::new(0.0, h),
            ],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MarkerShape::Square => "square",
            MarkerShape::Diamond => "diamond",
            MarkerShape::Triangle => "triangle",
            MarkerShape::Circle => "circle",
            MarkerShape::Cross => "cross",
        }
    }
}

/// A fully resolved marker stamp in device pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerGlyph {
    pub center: Point,
    pub shape: MarkerShape,
    pub size: f64,
    /// Clockwise rotation in degrees.
    pub angle: f64,
    pub fill: Option<Color>,
    pub stroke: Option<Stroke>,
}

impl MarkerGlyph {
    /// Outline rotated and placed at `center`.
    pub fn outline(&self) -> Vec<Point> {
        self.shape
            .outline(self.size)
            .into_iter()
            .map(|p| p.rotate(self.angle).translate(self.center.x, self.center.y))
            .collect()
    }
}

/// Immediate-mode paint surface.
pub trait Canvas {
    fn draw_polyline(&mut self, points: &[Point], stroke: &Stroke);

    /// Fill (even-odd with respect to `holes`) and/or outline a polygon.
    fn draw_polygon(
        &mut self,
        exterior: &[Point],
        holes: &[Vec<Point>],
        fill: Option<Color>,
        stroke: Option<&Stroke>,
    );

    fn draw_marker(&mut self, glyph: &MarkerGlyph);
}

/// A canvas that discards everything. Used where a context is needed but no
/// output is, such as bounds estimation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCanvas;

impl Canvas for NullCanvas {
    fn draw_polyline(&mut self, _points: &[Point], _stroke: &Stroke) {}

    fn draw_polygon(
        &mut self,
        _exterior: &[Point],
        _holes: &[Vec<Point>],
        _fill: Option<Color>,
        _stroke: Option<&Stroke>,
    ) {
    }

    fn draw_marker(&mut self, _glyph: &MarkerGlyph) {}
}
