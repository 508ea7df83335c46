use cartosym_core::geometry::{translate_rings, Point};
use cartosym_core::property::PropertyKey;
use cartosym_core::units::{MapUnitScale, RenderUnit};
use cartosym_core::Color;
use serde::{Deserialize, Serialize};

use crate::canvas::{JoinStyle, PenStyle, Stroke};
use crate::style::StyleProperties;
use crate::symbol::{SymbolRenderContext, SymbolType};

use super::{FillProperties, LayerCommon, SymbolLayer, DEFAULT_LINE_WIDTH};

const DEFAULT_FILL: Color = Color::rgb(125, 139, 143);
const DEFAULT_STROKE: Color = Color::rgb(35, 35, 35);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrushStyle {
    #[default]
    Solid,
    NoBrush,
}

/// Solid interior with an optional outline, drawn in a single polygon call.
#[derive(Debug, Clone)]
pub struct SimpleFillLayer {
    common: LayerCommon,
    fill: FillProperties,
    brush: BrushStyle,
    stroke_color: Color,
    stroke_width: f64,
    stroke_width_unit: RenderUnit,
    stroke_style: PenStyle,
    join: JoinStyle,
    offset: Point,
    offset_unit: RenderUnit,
    map_unit_scale: MapUnitScale,
}

impl Default for SimpleFillLayer {
    fn default() -> Self {
        Self {
            common: LayerCommon::new(DEFAULT_FILL),
            fill: FillProperties::default(),
            brush: BrushStyle::Solid,
            stroke_color: DEFAULT_STROKE,
            stroke_width: DEFAULT_LINE_WIDTH,
            stroke_width_unit: RenderUnit::Millimeters,
            stroke_style: PenStyle::Solid,
            join: JoinStyle::default(),
            offset: Point::default(),
            offset_unit: RenderUnit::Millimeters,
            map_unit_scale: MapUnitScale::default(),
        }
    }
}

impl SimpleFillLayer {
    pub fn new(color: Color, stroke_color: Color, stroke_width: f64) -> Self {
        Self::default().with_color(color).with_stroke(stroke_color, stroke_width)
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.common.color = color;
        self
    }

    pub fn with_stroke(mut self, color: Color, width: f64) -> Self {
        self.stroke_color = color;
        self.stroke_width = width;
        self
    }

    pub fn with_stroke_style(mut self, style: PenStyle) -> Self {
        self.stroke_style = style;
        self
    }

    pub fn with_brush(mut self, brush: BrushStyle) -> Self {
        self.brush = brush;
        self
    }

    pub fn with_offset(mut self, offset: Point) -> Self {
        self.offset = offset;
        self
    }

    pub fn brush(&self) -> BrushStyle {
        self.brush
    }

    pub fn stroke_color(&self) -> Color {
        self.stroke_color
    }

    pub fn stroke_width(&self) -> f64 {
        self.stroke_width
    }

    fn fill_color(&self, ctx: &mut SymbolRenderContext<'_>) -> Option<Color> {
        if self.brush == BrushStyle::NoBrush {
            return None;
        }
        let mut color = ctx.property_color(&self.common.properties, PropertyKey::FillColor, self.common.color);
        if ctx.is_selected() {
            color = ctx.selection_color();
        }
        Some(color.with_opacity(ctx.opacity()))
    }

    fn outline(&self, ctx: &mut SymbolRenderContext<'_>) -> Option<Stroke> {
        if self.stroke_style == PenStyle::NoPen {
            return None;
        }
        let props = &self.common.properties;
        let color = ctx.property_color(props, PropertyKey::StrokeColor, self.stroke_color);
        let width = ctx.property_f64(props, PropertyKey::StrokeWidth, self.stroke_width);
        let mut stroke = Stroke::new(
            color.with_opacity(ctx.opacity()),
            ctx.convert_to_painter_units(width, self.stroke_width_unit, &self.map_unit_scale),
        );
        stroke.style = self.stroke_style;
        stroke.join = self.join;
        Some(stroke)
    }
}

impl SymbolLayer for SimpleFillLayer {
    fn common(&self) -> &LayerCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut LayerCommon {
        &mut self.common
    }

    fn layer_type(&self) -> &'static str {
        "SimpleFill"
    }

    fn kind(&self) -> SymbolType {
        SymbolType::Fill
    }

    fn clone_layer(&self) -> Box<dyn SymbolLayer> {
        Box::new(Self {
            common: self.common.duplicate(),
            ..self.clone()
        })
    }

    fn fill_properties(&self) -> Option<&FillProperties> {
        Some(&self.fill)
    }

    fn fill_properties_mut(&mut self) -> Option<&mut FillProperties> {
        Some(&mut self.fill)
    }

    fn output_unit(&self) -> RenderUnit {
        RenderUnit::common([self.stroke_width_unit, self.offset_unit])
    }

    fn set_output_unit(&mut self, unit: RenderUnit) {
        self.stroke_width_unit = unit;
        self.offset_unit = unit;
    }

    fn map_unit_scale(&self) -> MapUnitScale {
        self.map_unit_scale
    }

    fn set_map_unit_scale(&mut self, scale: MapUnitScale) {
        self.map_unit_scale = scale;
    }

    fn render_polygon(
        &mut self,
        exterior: &[Point],
        holes: Option<&[Vec<Point>]>,
        ctx: &mut SymbolRenderContext<'_>,
    ) {
        if exterior.is_empty() {
            return;
        }
        let fill = self.fill_color(ctx);
        let stroke = self.outline(ctx);
        if fill.is_none() && stroke.is_none() {
            return;
        }

        let offset = ctx.property_point(&self.common.properties, PropertyKey::Offset, self.offset);
        let dx = ctx.convert_to_painter_units(offset.x, self.offset_unit, &self.map_unit_scale);
        let dy = ctx.convert_to_painter_units(offset.y, self.offset_unit, &self.map_unit_scale);
        let holes = holes.unwrap_or_default();

        if dx != 0.0 || dy != 0.0 {
            let shifted: Vec<Point> = exterior.iter().map(|p| p.translate(dx, dy)).collect();
            let shifted_holes = translate_rings(holes, dx, dy);
            ctx.canvas().draw_polygon(&shifted, &shifted_holes, fill, stroke.as_ref());
        } else {
            ctx.canvas().draw_polygon(exterior, holes, fill, stroke.as_ref());
        }
    }

    fn style_properties(&self) -> StyleProperties {
        let mut props = StyleProperties::new();
        props.insert("color".into(), self.common.color.encode());
        props.insert(
            "style".into(),
            match self.brush {
                BrushStyle::Solid => "solid",
                BrushStyle::NoBrush => "no",
            }
            .into(),
        );
        props.insert("angle".into(), self.fill.angle.to_string());
        props.insert("outline_color".into(), self.stroke_color.encode());
        props.insert("outline_width".into(), self.stroke_width.to_string());
        props.insert("outline_width_unit".into(), self.stroke_width_unit.name().into());
        props.insert("outline_style".into(), format!("{:?}", self.stroke_style).to_lowercase());
        props.insert("joinstyle".into(), format!("{:?}", self.join).to_lowercase());
        props.insert("offset".into(), format!("{},{}", self.offset.x, self.offset.y));
        props.insert("offset_unit".into(), self.offset_unit.name().into());
        props
    }
}
