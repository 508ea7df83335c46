use cartosym_core::geometry::Point;
use cartosym_core::Color;
use image::{Rgba, RgbaImage};
use tiny_skia::{FillRule, LineCap, LineJoin, Paint, Path, PathBuilder, Pixmap, StrokeDash, Transform};

use crate::canvas::{CapStyle, Canvas, JoinStyle, MarkerGlyph, MarkerShape, Stroke};

/// Offscreen RGBA canvas backed by a `tiny_skia` pixmap. Paths are
/// antialiased; fills use the even-odd rule so holes stay empty.
#[derive(Debug, Clone)]
pub struct RasterCanvas {
    /// `None` when either dimension is zero; every paint call is then a no-op.
    pixmap: Option<Pixmap>,
    width: u32,
    height: u32,
}

impl RasterCanvas {
    /// A fully transparent canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixmap: Pixmap::new(width, height),
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Straight (non-premultiplied) RGBA copy of the canvas.
    pub fn to_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let c = self.pixel(x, y).unwrap_or(Color::TRANSPARENT);
            Rgba([c.r, c.g, c.b, c.a])
        })
    }

    pub fn into_image(self) -> RgbaImage {
        self.to_image()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        let c = self.pixmap.as_ref()?.pixel(x, y)?.demultiply();
        Some(Color::rgba(c.red(), c.green(), c.blue(), c.alpha()))
    }

    fn fill(&mut self, path: &Path, color: Color) {
        if color.is_transparent() {
            return;
        }
        if let Some(pixmap) = self.pixmap.as_mut() {
            pixmap.fill_path(path, &paint(color), FillRule::EvenOdd, Transform::identity(), None);
        }
    }

    fn stroke(&mut self, path: &Path, stroke: &Stroke) {
        if !stroke.is_visible() {
            return;
        }
        if let Some(pixmap) = self.pixmap.as_mut() {
            pixmap.stroke_path(
                path,
                &paint(stroke.color),
                &skia_stroke(stroke),
                Transform::identity(),
                None,
            );
        }
    }
}

fn paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

/// One subpath per ring. Returns `None` when nothing drawable remains.
fn build_path(rings: &[&[Point]], close: bool) -> Option<Path> {
    let mut pb = PathBuilder::new();
    for ring in rings {
        let mut points = ring.iter();
        let Some(first) = points.next() else {
            continue;
        };
        pb.move_to(first.x as f32, first.y as f32);
        for p in points {
            pb.line_to(p.x as f32, p.y as f32);
        }
        if close {
            pb.close();
        }
    }
    pb.finish()
}

fn skia_stroke(stroke: &Stroke) -> tiny_skia::Stroke {
    // Dash intervals come in on/off pairs; an odd pattern repeats once.
    let dash = stroke.effective_dash_pattern().and_then(|pattern| {
        let mut intervals: Vec<f32> = pattern.iter().map(|&d| d as f32).collect();
        if intervals.len() % 2 == 1 {
            intervals.extend_from_within(..);
        }
        StrokeDash::new(intervals, 0.0)
    });
    tiny_skia::Stroke {
        // Zero width is a one pixel hairline.
        width: stroke.width.max(0.0) as f32,
        line_cap: match stroke.cap {
            CapStyle::Flat => LineCap::Butt,
            CapStyle::Square => LineCap::Square,
            CapStyle::Round => LineCap::Round,
        },
        line_join: match stroke.join {
            JoinStyle::Miter => LineJoin::Miter,
            JoinStyle::Bevel => LineJoin::Bevel,
            JoinStyle::Round => LineJoin::Round,
        },
        dash,
        ..Default::default()
    }
}

impl Canvas for RasterCanvas {
    fn draw_polyline(&mut self, points: &[Point], stroke: &Stroke) {
        if points.len() < 2 {
            return;
        }
        if let Some(path) = build_path(&[points], false) {
            self.stroke(&path, stroke);
        }
    }

    fn draw_polygon(
        &mut self,
        exterior: &[Point],
        holes: &[Vec<Point>],
        fill: Option<Color>,
        stroke: Option<&Stroke>,
    ) {
        let mut rings: Vec<&[Point]> = vec![exterior];
        rings.extend(holes.iter().map(Vec::as_slice));
        let Some(path) = build_path(&rings, true) else {
            return;
        };
        if let Some(fill) = fill {
            self.fill(&path, fill);
        }
        if let Some(stroke) = stroke {
            self.stroke(&path, stroke);
        }
    }

    fn draw_marker(&mut self, glyph: &MarkerGlyph) {
        match glyph.shape {
            MarkerShape::Circle => {
                let Some(path) = PathBuilder::from_circle(
                    glyph.center.x as f32,
                    glyph.center.y as f32,
                    (glyph.size / 2.0) as f32,
                ) else {
                    return;
                };
                if let Some(fill) = glyph.fill {
                    self.fill(&path, fill);
                }
                if let Some(stroke) = &glyph.stroke {
                    self.stroke(&path, stroke);
                }
            }
            MarkerShape::Cross => {
                let outline = glyph.outline();
                if let (Some(stroke), Some(path)) =
                    (&glyph.stroke, build_path(&[&outline[0..2], &outline[2..4]], false))
                {
                    self.stroke(&path, stroke);
                }
            }
            _ => self.draw_polygon(&glyph.outline(), &[], glyph.fill, glyph.stroke.as_ref()),
        }
    }
}
