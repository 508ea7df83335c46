//! Symbol layers: the individual paint rules a [`Symbol`](crate::symbol::Symbol)
//! stacks on top of each other.
//!
//! A layer declares the geometry kind it paints natively. Every paint entry
//! point is optional and does nothing by default, so a layer only implements
//! the ones matching its kind.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use cartosym_core::geometry::{BBox, Point};
use cartosym_core::property::PropertyCollection;
use cartosym_core::units::{MapUnitScale, RenderUnit};
use cartosym_core::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::RenderContext;
use crate::style::{StyleProperties, StyleWriter};
use crate::symbol::{SymbolRenderContext, SymbolType};

pub mod simple_fill;
pub mod simple_line;
pub mod simple_marker;

pub use simple_fill::{BrushStyle, SimpleFillLayer};
pub use simple_line::{offset_polyline, SimpleLineLayer};
pub use simple_marker::SimpleMarkerLayer;

/// Default marker diameter in millimetres.
pub const DEFAULT_MARKER_SIZE: f64 = 2.0;
/// Default stroke width in millimetres.
pub const DEFAULT_LINE_WIDTH: f64 = 0.26;

/// State every layer carries regardless of its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerCommon {
    pub id: Uuid,
    pub enabled: bool,
    /// Locked layers keep their color when the symbol color changes.
    pub locked: bool,
    pub color: Color,
    pub properties: PropertyCollection,
}

impl LayerCommon {
    pub fn new(color: Color) -> Self {
        Self {
            id: Uuid::new_v4(),
            enabled: true,
            locked: false,
            color,
            properties: PropertyCollection::new(),
        }
    }

    /// Copy with a fresh identity, for cloning a layer.
    pub fn duplicate(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            ..self.clone()
        }
    }
}

/// How a data-defined marker size maps to the drawn diameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleMethod {
    /// The value is proportional to the marker area.
    ScaleArea,
    #[default]
    ScaleDiameter,
}

impl ScaleMethod {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            ScaleMethod::ScaleArea => value.max(0.0).sqrt(),
            ScaleMethod::ScaleDiameter => value,
        }
    }
}

/// Attributes shared by marker layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerProperties {
    pub size: f64,
    pub size_unit: RenderUnit,
    pub size_map_unit_scale: MapUnitScale,
    /// Clockwise rotation in degrees.
    pub angle: f64,
    /// Orientation of the line the marker is placed on, added to `angle`.
    pub line_angle: f64,
    pub offset: Point,
    pub offset_unit: RenderUnit,
    pub scale_method: ScaleMethod,
}

impl Default for MarkerProperties {
    fn default() -> Self {
        Self {
            size: DEFAULT_MARKER_SIZE,
            size_unit: RenderUnit::Millimeters,
            size_map_unit_scale: MapUnitScale::default(),
            angle: 0.0,
            line_angle: 0.0,
            offset: Point::default(),
            offset_unit: RenderUnit::Millimeters,
            scale_method: ScaleMethod::default(),
        }
    }
}

/// Attributes shared by line layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineProperties {
    pub width: f64,
    pub width_unit: RenderUnit,
    pub width_map_unit_scale: MapUnitScale,
    /// Perpendicular offset, positive to the left of the line direction.
    pub offset: f64,
    pub offset_unit: RenderUnit,
}

impl Default for LineProperties {
    fn default() -> Self {
        Self {
            width: DEFAULT_LINE_WIDTH,
            width_unit: RenderUnit::Millimeters,
            width_map_unit_scale: MapUnitScale::default(),
            offset: 0.0,
            offset_unit: RenderUnit::Millimeters,
        }
    }
}

/// Attributes shared by fill layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FillProperties {
    /// Fill pattern angle in degrees.
    pub angle: f64,
}

/// One paint rule of a symbol.
pub trait SymbolLayer: fmt::Debug + Send {
    fn common(&self) -> &LayerCommon;

    fn common_mut(&mut self) -> &mut LayerCommon;

    /// Short identifier of the concrete layer, e.g. `"SimpleMarker"`.
    fn layer_type(&self) -> &'static str;

    /// The geometry kind this layer paints natively.
    fn kind(&self) -> SymbolType;

    /// Deep copy with a fresh layer id.
    fn clone_layer(&self) -> Box<dyn SymbolLayer>;

    // ── Capabilities ─────────────────────────────────────────────

    fn marker_properties(&self) -> Option<&MarkerProperties> {
        None
    }

    fn marker_properties_mut(&mut self) -> Option<&mut MarkerProperties> {
        None
    }

    fn line_properties(&self) -> Option<&LineProperties> {
        None
    }

    fn line_properties_mut(&mut self) -> Option<&mut LineProperties> {
        None
    }

    fn fill_properties(&self) -> Option<&FillProperties> {
        None
    }

    fn fill_properties_mut(&mut self) -> Option<&mut FillProperties> {
        None
    }

    // ── Shared attributes ────────────────────────────────────────

    fn id(&self) -> Uuid {
        self.common().id
    }

    fn is_enabled(&self) -> bool {
        self.common().enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.common_mut().enabled = enabled;
    }

    fn is_locked(&self) -> bool {
        self.common().locked
    }

    fn set_locked(&mut self, locked: bool) {
        self.common_mut().locked = locked;
    }

    fn color(&self) -> Color {
        self.common().color
    }

    fn set_color(&mut self, color: Color) {
        self.common_mut().color = color;
    }

    fn data_defined_properties(&self) -> &PropertyCollection {
        &self.common().properties
    }

    fn data_defined_properties_mut(&mut self) -> &mut PropertyCollection {
        &mut self.common_mut().properties
    }

    fn has_data_defined_properties(&self) -> bool {
        self.common().properties.has_active_properties()
    }

    /// The unit sizes of this layer are expressed in, or `Unknown` if mixed.
    fn output_unit(&self) -> RenderUnit {
        RenderUnit::Unknown
    }

    fn set_output_unit(&mut self, _unit: RenderUnit) {}

    fn map_unit_scale(&self) -> MapUnitScale {
        MapUnitScale::default()
    }

    fn set_map_unit_scale(&mut self, _scale: MapUnitScale) {}

    /// Fields read by this layer's data-defined properties.
    fn used_attributes(&self, context: &RenderContext) -> BTreeSet<String> {
        self.common()
            .properties
            .referenced_fields(context.expression_engine())
    }

    // ── Painting ─────────────────────────────────────────────────

    fn start_render(&mut self, _context: &mut SymbolRenderContext<'_>) {}

    fn stop_render(&mut self, _context: &mut SymbolRenderContext<'_>) {}

    /// Paint at a device-space point. `None` is the empty geometry handed to
    /// layers that do not match the symbol's geometry.
    fn render_point(&mut self, _point: Option<Point>, _context: &mut SymbolRenderContext<'_>) {}

    fn render_polyline(&mut self, _points: &[Point], _context: &mut SymbolRenderContext<'_>) {}

    fn render_polygon(
        &mut self,
        _exterior: &[Point],
        _holes: Option<&[Vec<Point>]>,
        _context: &mut SymbolRenderContext<'_>,
    ) {
    }

    /// Outline a polygon with a line layer: the exterior, then every hole.
    fn render_polygon_stroke(
        &mut self,
        exterior: &[Point],
        holes: Option<&[Vec<Point>]>,
        context: &mut SymbolRenderContext<'_>,
    ) {
        self.render_polyline(exterior, context);
        for hole in holes.unwrap_or_default() {
            self.render_polyline(hole, context);
        }
    }

    /// Paint a representative sample into a `width` x `height` box.
    fn draw_preview_icon(
        &mut self,
        context: &mut SymbolRenderContext<'_>,
        width: f64,
        height: f64,
    ) {
        match self.kind() {
            SymbolType::Marker => {
                self.render_point(Some(Point::new(width / 2.0, height / 2.0)), context)
            }
            SymbolType::Line => self.render_polyline(
                &[Point::new(0.0, height / 2.0), Point::new(width, height / 2.0)],
                context,
            ),
            SymbolType::Fill => {
                let rect = BBox::from_coords(0.0, 0.0, width, height).corners();
                self.render_polygon(&rect, None, context)
            }
            SymbolType::Hybrid => {}
        }
    }

    /// Device-space footprint of a marker drawn at `point`.
    fn bounds(&self, _point: Point, _context: &mut SymbolRenderContext<'_>) -> Option<BBox> {
        None
    }

    // ── Style interchange ────────────────────────────────────────

    /// Attributes written to a style document.
    fn style_properties(&self) -> StyleProperties {
        StyleProperties::new()
    }

    /// Write this layer through `writer`. `props` carries symbol-level values.
    fn to_style(&self, writer: &mut dyn StyleWriter, props: &StyleProperties) {
        let mut merged: BTreeMap<String, String> = props.clone();
        merged.extend(self.style_properties());
        writer.write_layer(self.layer_type(), &merged);
    }
}

/// Whether `layer` paints natively inside a symbol of type `symbol_type`.
/// Line layers outline fill symbols; hybrid layers fit anywhere.
pub fn paints_natively(layer: SymbolType, symbol_type: SymbolType) -> bool {
    layer == symbol_type
        || layer == SymbolType::Hybrid
        || (layer == SymbolType::Line && symbol_type == SymbolType::Fill)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_gets_fresh_id() {
        let common = LayerCommon::new(Color::BLACK);
        let copy = common.duplicate();
        assert_ne!(common.id, copy.id);
        assert_eq!(common.color, copy.color);
    }

    #[test]
    fn test_scale_method() {
        assert!((ScaleMethod::ScaleArea.apply(16.0) - 4.0).abs() < 1e-10);
        assert!((ScaleMethod::ScaleDiameter.apply(16.0) - 16.0).abs() < 1e-10);
        assert_eq!(ScaleMethod::default(), ScaleMethod::ScaleDiameter);
    }

    #[test]
    fn test_native_compatibility() {
        assert!(paints_natively(SymbolType::Marker, SymbolType::Marker));
        assert!(paints_natively(SymbolType::Line, SymbolType::Fill));
        assert!(paints_natively(SymbolType::Hybrid, SymbolType::Line));
        assert!(!paints_natively(SymbolType::Marker, SymbolType::Line));
        assert!(!paints_natively(SymbolType::Fill, SymbolType::Line));
    }
}
