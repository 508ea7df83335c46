//! SVG document canvas.
//!
//! Paint calls are appended as SVG elements in device pixels; `finish`
//! wraps them into a standalone document.

use std::fmt::Write as _;
use std::io;

use cartosym_core::geometry::Point;
use cartosym_core::Color;
use cartosym_render::canvas::{CapStyle, Canvas, JoinStyle, MarkerGlyph, MarkerShape, Stroke};

pub struct SvgCanvas {
    width: f64,
    height: f64,
    body: String,
    elements: usize,
}

impl SvgCanvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            body: String::new(),
            elements: 0,
        }
    }

    /// Number of elements painted so far.
    pub fn element_count(&self) -> usize {
        self.elements
    }

    /// The complete SVG document.
    pub fn finish(&self) -> String {
        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="0 0 {:.2} {:.2}">"#,
            self.width, self.height, self.width, self.height
        );
        svg.push_str(&self.body);
        svg.push_str("</svg>\n");
        svg
    }

    pub fn write_to<W: io::Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(self.finish().as_bytes())?;
        writer.flush()
    }

    fn push_element(&mut self, element: String) {
        self.body.push_str("  ");
        self.body.push_str(&element);
        self.body.push('\n');
        self.elements += 1;
    }
}

fn points_attr(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{:.2},{:.2}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn ring_path(d: &mut String, ring: &[Point]) {
    for (i, p) in ring.iter().enumerate() {
        let _ = write!(d, "{}{:.2},{:.2}", if i == 0 { "M" } else { "L" }, p.x, p.y);
    }
    d.push('Z');
}

fn fill_attrs(fill: Option<Color>) -> String {
    match fill {
        Some(c) if !c.is_transparent() => format!(
            r#"fill="{}" fill-opacity="{:.3}""#,
            c.to_hex(),
            c.a as f64 / 255.0
        ),
        _ => r#"fill="none""#.to_string(),
    }
}

fn stroke_attrs(stroke: Option<&Stroke>) -> String {
    let Some(stroke) = stroke.filter(|s| s.is_visible()) else {
        return r#"stroke="none""#.to_string();
    };
    let join = match stroke.join {
        JoinStyle::Miter => "miter",
        JoinStyle::Bevel => "bevel",
        JoinStyle::Round => "round",
    };
    let cap = match stroke.cap {
        CapStyle::Flat => "butt",
        CapStyle::Square => "square",
        CapStyle::Round => "round",
    };
    let mut attrs = format!(
        r#"stroke="{}" stroke-opacity="{:.3}" stroke-width="{:.2}" stroke-linejoin="{}" stroke-linecap="{}""#,
        stroke.color.to_hex(),
        stroke.color.a as f64 / 255.0,
        stroke.width,
        join,
        cap
    );
    if let Some(pattern) = stroke.effective_dash_pattern() {
        let dashes: Vec<String> = pattern.iter().map(|d| format!("{:.2}", d)).collect();
        let _ = write!(attrs, r#" stroke-dasharray="{}""#, dashes.join(","));
    }
    attrs
}

impl Canvas for SvgCanvas {
    fn draw_polyline(&mut self, points: &[Point], stroke: &Stroke) {
        if points.len() < 2 || !stroke.is_visible() {
            return;
        }
        let element = format!(
            r#"<polyline points="{}" fill="none" {}/>"#,
            points_attr(points),
            stroke_attrs(Some(stroke))
        );
        self.push_element(element);
    }

    fn draw_polygon(
        &mut self,
        exterior: &[Point],
        holes: &[Vec<Point>],
        fill: Option<Color>,
        stroke: Option<&Stroke>,
    ) {
        if exterior.len() < 3 {
            return;
        }
        let mut d = String::new();
        ring_path(&mut d, exterior);
        for hole in holes.iter().filter(|h| h.len() >= 3) {
            ring_path(&mut d, hole);
        }
        let element = format!(
            r#"<path d="{}" fill-rule="evenodd" {} {}/>"#,
            d,
            fill_attrs(fill),
            stroke_attrs(stroke)
        );
        self.push_element(element);
    }

    fn draw_marker(&mut self, glyph: &MarkerGlyph) {
        let paint = format!(
            "{} {}",
            fill_attrs(glyph.fill.filter(|_| glyph.shape.is_filled())),
            stroke_attrs(glyph.stroke.as_ref())
        );
        let element = match glyph.shape {
            MarkerShape::Circle => format!(
                r#"<circle cx="{:.2}" cy="{:.2}" r="{:.2}" {}/>"#,
                glyph.center.x,
                glyph.center.y,
                glyph.size / 2.0,
                paint
            ),
            MarkerShape::Cross => {
                let o = glyph.outline();
                format!(
                    r#"<path d="M{:.2},{:.2}L{:.2},{:.2}M{:.2},{:.2}L{:.2},{:.2}" {}/>"#,
                    o[0].x, o[0].y, o[1].x, o[1].y, o[2].x, o[2].y, o[3].x, o[3].y, paint
                )
            }
            _ => format!(r#"<polygon points="{}" {}/>"#, points_attr(&glyph.outline()), paint),
        };
        self.push_element(element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    #[test]
    fn test_polygon_with_hole_is_one_evenodd_path() {
        let mut canvas = SvgCanvas::new(10.0, 10.0);
        canvas.draw_polygon(
            &square(0.0, 0.0, 10.0, 10.0),
            &[square(4.0, 4.0, 6.0, 6.0)],
            Some(Color::rgb(255, 0, 0)),
            None,
        );
        let svg = canvas.finish();
        assert_eq!(canvas.element_count(), 1);
        assert!(svg.contains(r#"fill-rule="evenodd""#));
        assert!(svg.contains(r##"fill="#ff0000""##));
        assert!(svg.contains(r#"stroke="none""#));
        assert_eq!(svg.matches('Z').count(), 2);
    }

    #[test]
    fn test_markers_use_native_elements() {
        let mut canvas = SvgCanvas::new(20.0, 20.0);
        let stroke = Stroke::new(Color::BLACK, 1.0);
        canvas.draw_marker(&MarkerGlyph {
            center: Point::new(10.0, 10.0),
            shape: MarkerShape::Circle,
            size: 4.0,
            angle: 0.0,
            fill: Some(Color::WHITE),
            stroke: Some(stroke.clone()),
        });
        canvas.draw_marker(&MarkerGlyph {
            center: Point::new(5.0, 5.0),
            shape: MarkerShape::Cross,
            size: 2.0,
            angle: 0.0,
            fill: Some(Color::WHITE),
            stroke: Some(stroke),
        });
        let svg = canvas.finish();
        assert!(svg.contains(r#"<circle cx="10.00" cy="10.00" r="2.00""#));
        assert!(svg.contains(r#"<path d="M4.00,5.00L6.00,5.00M5.00,4.00L5.00,6.00" fill="none""#));
    }

    #[test]
    fn test_invisible_strokes_are_skipped() {
        let mut canvas = SvgCanvas::new(10.0, 10.0);
        canvas.draw_polyline(&[Point::new(0.0, 0.0), Point::new(1.0, 1.0)], &Stroke::new(Color::TRANSPARENT, 1.0));
        canvas.draw_polyline(&[Point::new(0.0, 0.0)], &Stroke::new(Color::BLACK, 1.0));
        assert_eq!(canvas.element_count(), 0);

        let mut dashed = Stroke::new(Color::BLACK, 1.0);
        dashed.dash_pattern = vec![3.0, 1.0];
        canvas.draw_polyline(&[Point::new(0.0, 0.0), Point::new(9.0, 0.0)], &dashed);
        assert!(canvas.finish().contains(r#"stroke-dasharray="3.00,1.00""#));
    }

    #[test]
    fn test_write_to_buffer() {
        let canvas = SvgCanvas::new(8.0, 6.0);
        let mut buffer: Vec<u8> = Vec::new();
        canvas.write_to(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("<svg"));
        assert!(text.contains(r#"width="8" height="6""#));
        assert!(text.trim_end().ends_with("</svg>"));
    }
}
