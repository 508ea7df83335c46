use cartosym_core::geometry::{BBox, Point};
use cartosym_core::property::PropertyKey;
use cartosym_core::units::{MapUnitScale, RenderUnit};
use cartosym_core::Color;

use crate::canvas::{MarkerGlyph, MarkerShape, Stroke};
use crate::style::StyleProperties;
use crate::symbol::{RenderHints, SymbolRenderContext, SymbolType};

use super::{LayerCommon, MarkerProperties, ScaleMethod, SymbolLayer, DEFAULT_LINE_WIDTH};

const DEFAULT_FILL: Color = Color::rgb(255, 0, 0);
const DEFAULT_STROKE: Color = Color::rgb(35, 35, 35);

/// Marker geometry resolved to pixels once per session when nothing about it
/// can change between paint calls.
#[derive(Debug, Clone, Copy, PartialEq)]
struct StaticMarker {
    size: f64,
    angle: f64,
    offset: Point,
    stroke_width: f64,
}

/// A filled and outlined shape stamped at each point.
#[derive(Debug, Clone)]
pub struct SimpleMarkerLayer {
    common: LayerCommon,
    marker: MarkerProperties,
    shape: MarkerShape,
    stroke_color: Color,
    stroke_width: f64,
    stroke_width_unit: RenderUnit,
    cached: Option<StaticMarker>,
}

impl Default for SimpleMarkerLayer {
    fn default() -> Self {
        Self {
            common: LayerCommon::new(DEFAULT_FILL),
            marker: MarkerProperties::default(),
            shape: MarkerShape::default(),
            stroke_color: DEFAULT_STROKE,
            stroke_width: DEFAULT_LINE_WIDTH,
            stroke_width_unit: RenderUnit::Millimeters,
            cached: None,
        }
    }
}

impl SimpleMarkerLayer {
    pub fn new(shape: MarkerShape, size: f64, color: Color) -> Self {
        Self::default().with_shape(shape).with_size(size).with_color(color)
    }

    pub fn with_shape(mut self, shape: MarkerShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.marker.size = size;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.common.color = color;
        self
    }

    pub fn with_angle(mut self, angle: f64) -> Self {
        self.marker.angle = angle;
        self
    }

    pub fn with_offset(mut self, offset: Point) -> Self {
        self.marker.offset = offset;
        self
    }

    pub fn with_stroke(mut self, color: Color, width: f64) -> Self {
        self.stroke_color = color;
        self.stroke_width = width;
        self
    }

    pub fn shape(&self) -> MarkerShape {
        self.shape
    }

    pub fn stroke_color(&self) -> Color {
        self.stroke_color
    }

    pub fn stroke_width(&self) -> f64 {
        self.stroke_width
    }

    fn resolve_geometry(&self, ctx: &mut SymbolRenderContext<'_>) -> StaticMarker {
        let props = &self.common.properties;
        let m = &self.marker;

        let size = match ctx
            .property_value(props, PropertyKey::Size, m.size)
            .and_then(|v| v.as_f64())
        {
            Some(v) => m.scale_method.apply(v),
            None => m.size,
        };
        let angle = ctx.property_f64(props, PropertyKey::Angle, m.angle) + m.line_angle;
        let offset = ctx.property_point(props, PropertyKey::Offset, m.offset);
        let stroke_width = ctx.property_f64(props, PropertyKey::StrokeWidth, self.stroke_width);

        let scale = &m.size_map_unit_scale;
        let offset_px = Point::new(
            ctx.convert_to_painter_units(offset.x, m.offset_unit, scale),
            ctx.convert_to_painter_units(offset.y, m.offset_unit, scale),
        );
        StaticMarker {
            size: ctx.convert_to_painter_units(size, m.size_unit, scale),
            angle,
            offset: if angle != 0.0 { offset_px.rotate(angle) } else { offset_px },
            stroke_width: ctx.convert_to_painter_units(
                stroke_width,
                self.stroke_width_unit,
                &MapUnitScale::default(),
            ),
        }
    }

    fn glyph(&self, point: Point, resolved: StaticMarker, ctx: &mut SymbolRenderContext<'_>) -> MarkerGlyph {
        let props = &self.common.properties;
        let mut fill = ctx.property_color(props, PropertyKey::FillColor, self.common.color);
        if ctx.is_selected() {
            fill = ctx.selection_color();
        }
        let stroke_color = ctx.property_color(props, PropertyKey::StrokeColor, self.stroke_color);
        let opacity = ctx.opacity();

        MarkerGlyph {
            center: point.translate(resolved.offset.x, resolved.offset.y),
            shape: self.shape,
            size: resolved.size,
            angle: resolved.angle,
            fill: self.shape.is_filled().then(|| fill.with_opacity(opacity)),
            stroke: (resolved.stroke_width > 0.0)
                .then(|| Stroke::new(stroke_color.with_opacity(opacity), resolved.stroke_width)),
        }
    }
}

impl SymbolLayer for SimpleMarkerLayer {
    fn common(&self) -> &LayerCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut LayerCommon {
        &mut self.common
    }

    fn layer_type(&self) -> &'static str {
        "SimpleMarker"
    }

    fn kind(&self) -> SymbolType {
        SymbolType::Marker
    }

    fn clone_layer(&self) -> Box<dyn SymbolLayer> {
        Box::new(Self {
            common: self.common.duplicate(),
            cached: None,
            ..self.clone()
        })
    }

    fn marker_properties(&self) -> Option<&MarkerProperties> {
        Some(&self.marker)
    }

    fn marker_properties_mut(&mut self) -> Option<&mut MarkerProperties> {
        Some(&mut self.marker)
    }

    fn output_unit(&self) -> RenderUnit {
        RenderUnit::common([
            self.marker.size_unit,
            self.marker.offset_unit,
            self.stroke_width_unit,
        ])
    }

    fn set_output_unit(&mut self, unit: RenderUnit) {
        self.marker.size_unit = unit;
        self.marker.offset_unit = unit;
        self.stroke_width_unit = unit;
    }

    fn map_unit_scale(&self) -> MapUnitScale {
        self.marker.size_map_unit_scale
    }

    fn set_map_unit_scale(&mut self, scale: MapUnitScale) {
        self.marker.size_map_unit_scale = scale;
    }

    fn start_render(&mut self, ctx: &mut SymbolRenderContext<'_>) {
        let dynamic = self.has_data_defined_properties()
            || ctx.render_hints().contains(RenderHints::DYNAMIC_ROTATION);
        self.cached = (!dynamic).then(|| self.resolve_geometry(ctx));
    }

    fn stop_render(&mut self, _ctx: &mut SymbolRenderContext<'_>) {
        self.cached = None;
    }

    fn render_point(&mut self, point: Option<Point>, ctx: &mut SymbolRenderContext<'_>) {
        let Some(point) = point else {
            return;
        };
        let resolved = match self.cached {
            Some(cached) => cached,
            None => self.resolve_geometry(ctx),
        };
        let glyph = self.glyph(point, resolved, ctx);
        ctx.canvas().draw_marker(&glyph);
    }

    fn bounds(&self, point: Point, ctx: &mut SymbolRenderContext<'_>) -> Option<BBox> {
        let resolved = self.resolve_geometry(ctx);
        let glyph = self.glyph(point, resolved, ctx);
        let half_stroke = glyph.stroke.as_ref().map_or(0.0, |s| s.width / 2.0);
        BBox::from_points(&glyph.outline()).map(|b| b.buffered(half_stroke, half_stroke))
    }

    fn style_properties(&self) -> StyleProperties {
        let m = &self.marker;
        let mut props = StyleProperties::new();
        props.insert("name".into(), self.shape.name().into());
        props.insert("color".into(), self.common.color.encode());
        props.insert("outline_color".into(), self.stroke_color.encode());
        props.insert("outline_width".into(), self.stroke_width.to_string());
        props.insert("outline_width_unit".into(), self.stroke_width_unit.name().into());
        props.insert("size".into(), m.size.to_string());
        props.insert("size_unit".into(), m.size_unit.name().into());
        props.insert("angle".into(), m.angle.to_string());
        props.insert("offset".into(), format!("{},{}", m.offset.x, m.offset.y));
        props.insert("offset_unit".into(), m.offset_unit.name().into());
        props.insert(
            "scale_method".into(),
            match m.scale_method {
                ScaleMethod::ScaleArea => "area",
                ScaleMethod::ScaleDiameter => "diameter",
            }
            .into(),
        );
        props
    }
}
