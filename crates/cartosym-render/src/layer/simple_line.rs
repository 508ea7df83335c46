use cartosym_core::geometry::Point;
use cartosym_core::property::PropertyKey;
use cartosym_core::units::{MapUnitScale, RenderUnit};
use cartosym_core::Color;

use crate::canvas::{CapStyle, JoinStyle, PenStyle, Stroke};
use crate::style::StyleProperties;
use crate::symbol::{SymbolRenderContext, SymbolType};

use super::{LayerCommon, LineProperties, SymbolLayer};

const DEFAULT_COLOR: Color = Color::rgb(35, 35, 35);

/// Longest a mitered corner may stick out, as a multiple of the offset.
const MITER_LIMIT: f64 = 4.0;

/// A single continuous or dashed pen stroke along the line.
#[derive(Debug, Clone)]
pub struct SimpleLineLayer {
    common: LayerCommon,
    line: LineProperties,
    pen_style: PenStyle,
    /// Dash and gap lengths in the width unit. Empty uses `pen_style`.
    custom_dash: Vec<f64>,
    join: JoinStyle,
    cap: CapStyle,
}

impl Default for SimpleLineLayer {
    fn default() -> Self {
        Self {
            common: LayerCommon::new(DEFAULT_COLOR),
            line: LineProperties::default(),
            pen_style: PenStyle::Solid,
            custom_dash: Vec::new(),
            join: JoinStyle::default(),
            cap: CapStyle::default(),
        }
    }
}

impl SimpleLineLayer {
    pub fn new(color: Color, width: f64) -> Self {
        Self::default().with_color(color).with_width(width)
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.common.color = color;
        self
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.line.width = width;
        self
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.line.offset = offset;
        self
    }

    pub fn with_pen_style(mut self, style: PenStyle) -> Self {
        self.pen_style = style;
        self
    }

    pub fn with_custom_dash(mut self, dash: Vec<f64>) -> Self {
        self.custom_dash = dash;
        self
    }

    pub fn with_join(mut self, join: JoinStyle) -> Self {
        self.join = join;
        self
    }

    pub fn with_cap(mut self, cap: CapStyle) -> Self {
        self.cap = cap;
        self
    }

    pub fn pen_style(&self) -> PenStyle {
        self.pen_style
    }

    pub fn custom_dash(&self) -> &[f64] {
        &self.custom_dash
    }

    fn stroke(&self, ctx: &mut SymbolRenderContext<'_>) -> Stroke {
        let props = &self.common.properties;
        let width = ctx.property_f64(props, PropertyKey::Width, self.line.width);
        let mut color = ctx.property_color(props, PropertyKey::StrokeColor, self.common.color);
        if ctx.is_selected() {
            color = ctx.selection_color();
        }

        let scale = &self.line.width_map_unit_scale;
        let unit = self.line.width_unit;
        let mut stroke = Stroke::new(
            color.with_opacity(ctx.opacity()),
            ctx.convert_to_painter_units(width, unit, scale),
        );
        stroke.style = self.pen_style;
        stroke.join = self.join;
        stroke.cap = self.cap;
        stroke.dash_pattern = self
            .custom_dash
            .iter()
            .map(|d| ctx.convert_to_painter_units(*d, unit, scale))
            .collect();
        stroke
    }
}

impl SymbolLayer for SimpleLineLayer {
    fn common(&self) -> &LayerCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut LayerCommon {
        &mut self.common
    }

    fn layer_type(&self) -> &'static str {
        "SimpleLine"
    }

    fn kind(&self) -> SymbolType {
        SymbolType::Line
    }

    fn clone_layer(&self) -> Box<dyn SymbolLayer> {
        Box::new(Self {
            common: self.common.duplicate(),
            ..self.clone()
        })
    }

    fn line_properties(&self) -> Option<&LineProperties> {
        Some(&self.line)
    }

    fn line_properties_mut(&mut self) -> Option<&mut LineProperties> {
        Some(&mut self.line)
    }

    fn output_unit(&self) -> RenderUnit {
        RenderUnit::common([self.line.width_unit, self.line.offset_unit])
    }

    fn set_output_unit(&mut self, unit: RenderUnit) {
        self.line.width_unit = unit;
        self.line.offset_unit = unit;
    }

    fn map_unit_scale(&self) -> MapUnitScale {
        self.line.width_map_unit_scale
    }

    fn set_map_unit_scale(&mut self, scale: MapUnitScale) {
        self.line.width_map_unit_scale = scale;
    }

    fn render_polyline(&mut self, points: &[Point], ctx: &mut SymbolRenderContext<'_>) {
        if points.len() < 2 {
            return;
        }
        let stroke = self.stroke(ctx);
        if stroke.style == PenStyle::NoPen {
            return;
        }

        let offset = ctx.property_f64(&self.common.properties, PropertyKey::Offset, self.line.offset);
        let offset_px =
            ctx.convert_to_painter_units(offset, self.line.offset_unit, &self.line.width_map_unit_scale);
        if offset_px != 0.0 {
            let shifted = offset_polyline(points, offset_px);
            ctx.canvas().draw_polyline(&shifted, &stroke);
        } else {
            ctx.canvas().draw_polyline(points, &stroke);
        }
    }

    fn style_properties(&self) -> StyleProperties {
        let mut props = StyleProperties::new();
        props.insert("line_color".into(), self.common.color.encode());
        props.insert("line_width".into(), self.line.width.to_string());
        props.insert("line_width_unit".into(), self.line.width_unit.name().into());
        props.insert("line_style".into(), format!("{:?}", self.pen_style).to_lowercase());
        props.insert("joinstyle".into(), format!("{:?}", self.join).to_lowercase());
        props.insert("capstyle".into(), format!("{:?}", self.cap).to_lowercase());
        props.insert("offset".into(), self.line.offset.to_string());
        props.insert("offset_unit".into(), self.line.offset_unit.name().into());
        props.insert("use_custom_dash".into(), u8::from(!self.custom_dash.is_empty()).to_string());
        props.insert(
            "customdash".into(),
            self.custom_dash
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(";"),
        );
        props
    }
}

/// Unit normal pointing to the left of the direction a -> b in device space.
fn left_normal(a: Point, b: Point) -> Point {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len = dx.hypot(dy);
    Point::new(dy / len, -dx / len)
}

/// Parallel copy of `points` at `distance` pixels, positive to the left.
/// Corners are mitered up to [`MITER_LIMIT`]. A closed ring stays closed.
pub fn offset_polyline(points: &[Point], distance: f64) -> Vec<Point> {
    let mut pts: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        if pts.last() != Some(p) {
            pts.push(*p);
        }
    }
    if pts.len() < 2 {
        return points.to_vec();
    }

    let closed = pts.len() > 2 && pts.first() == pts.last();
    let normals: Vec<Point> = pts.windows(2).map(|w| left_normal(w[0], w[1])).collect();
    let last = pts.len() - 1;

    pts.iter()
        .enumerate()
        .map(|(i, p)| {
            let (before, after) = match i {
                0 if closed => (normals[last - 1], normals[0]),
                0 => (normals[0], normals[0]),
                i if i == last && closed => (normals[last - 1], normals[0]),
                i if i == last => (normals[last - 1], normals[last - 1]),
                i => (normals[i - 1], normals[i]),
            };
            let (mx, my) = (before.x + after.x, before.y + after.y);
            let len = mx.hypot(my);
            if len < 1e-9 {
                // The line doubles back on itself.
                return p.translate(before.x * distance, before.y * distance);
            }
            let (mx, my) = (mx / len, my / len);
            let miter = (1.0 / (mx * before.x + my * before.y)).min(MITER_LIMIT);
            p.translate(mx * distance * miter, my * distance * miter)
        })
        .collect()
}
