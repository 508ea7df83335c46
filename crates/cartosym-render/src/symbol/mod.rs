//! Symbols: ordered stacks of symbol layers that paint one feature.
//!
//! A symbol is a marker, line or fill symbol. Kind-specific operations live
//! in [`marker`], [`line`] and [`fill`] and fail with
//! [`SymbolError::SymbolTypeMismatch`] on the wrong kind of symbol.
//!
//! Rendering happens inside a [`RenderSession`] obtained from
//! [`Symbol::start_render`]. The session borrows the symbol exclusively, so a
//! second session cannot be started, and nothing can be rendered, outside of
//! one.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::BitOr;

use cartosym_core::expression::{vars, ExpressionContextScope};
use cartosym_core::geometry::GeometryType;
use cartosym_core::units::{MapUnitScale, RenderUnit};
use cartosym_core::Color;
use serde::{Deserialize, Serialize};

use crate::context::RenderContext;
use crate::error::SymbolError;
use crate::layer::{SimpleFillLayer, SimpleLineLayer, SimpleMarkerLayer, SymbolLayer};
use crate::style::{StyleProperties, StyleWriter};

pub mod fill;
pub mod line;
pub mod marker;
pub mod preview;
mod render_context;
pub mod session;

pub use render_context::SymbolRenderContext;
pub use session::{FeatureRenderOptions, LayerSelection, RenderSession, VertexMarker, VertexMarkerKind};

/// Geometry kind of a symbol or symbol layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolType {
    Marker,
    Line,
    Fill,
    /// Layers that build their own geometry. Only a classification label for
    /// symbols, never a symbol's own type.
    Hybrid,
}

impl SymbolType {
    pub fn name(&self) -> &'static str {
        match self {
            SymbolType::Marker => "MARKER",
            SymbolType::Line => "LINE",
            SymbolType::Fill => "FILL",
            SymbolType::Hybrid => "HYBRID",
        }
    }
}

/// Hints for how layers may cache between paint calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderHints(u32);

impl RenderHints {
    pub const NONE: RenderHints = RenderHints(0);
    /// Rotation may change with every paint call; layers must not cache it.
    pub const DYNAMIC_ROTATION: RenderHints = RenderHints(2);

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, other: RenderHints) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: RenderHints) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: RenderHints) {
        self.0 &= !other.0;
    }
}

impl BitOr for RenderHints {
    type Output = RenderHints;

    fn bitor(self, rhs: RenderHints) -> RenderHints {
        RenderHints(self.0 | rhs.0)
    }
}

/// An ordered stack of symbol layers. Later layers paint on top.
pub struct Symbol {
    symbol_type: SymbolType,
    layers: Vec<Box<dyn SymbolLayer>>,
    opacity: f64,
    render_hints: RenderHints,
    clip_features_to_extent: bool,
}

impl Symbol {
    fn new(symbol_type: SymbolType, layers: Vec<Box<dyn SymbolLayer>>) -> Self {
        Self {
            symbol_type,
            layers,
            opacity: 1.0,
            render_hints: RenderHints::NONE,
            clip_features_to_extent: true,
        }
    }

    pub fn marker(layers: Vec<Box<dyn SymbolLayer>>) -> Self {
        Self::new(SymbolType::Marker, layers)
    }

    pub fn line(layers: Vec<Box<dyn SymbolLayer>>) -> Self {
        Self::new(SymbolType::Line, layers)
    }

    pub fn fill(layers: Vec<Box<dyn SymbolLayer>>) -> Self {
        Self::new(SymbolType::Fill, layers)
    }

    /// A marker symbol with a single simple marker layer.
    pub fn default_marker() -> Self {
        Self::marker(vec![Box::new(SimpleMarkerLayer::default())])
    }

    pub fn default_line() -> Self {
        Self::line(vec![Box::new(SimpleLineLayer::default())])
    }

    pub fn default_fill() -> Self {
        Self::fill(vec![Box::new(SimpleFillLayer::default())])
    }

    /// The default symbol for features of `geometry_type`, or `None` when
    /// the type is unknown.
    pub fn default_symbol(geometry_type: GeometryType) -> Option<Self> {
        match geometry_type {
            GeometryType::Point => Some(Self::default_marker()),
            GeometryType::Line => Some(Self::default_line()),
            GeometryType::Polygon => Some(Self::default_fill()),
            GeometryType::Unknown => None,
        }
    }

    pub fn symbol_type(&self) -> SymbolType {
        self.symbol_type
    }

    /// `Hybrid` if the layers are of mixed kinds, else the common layer kind.
    pub fn layer_classification(&self) -> SymbolType {
        let mut kinds = self.layers.iter().map(|l| l.kind());
        match kinds.next() {
            Some(first) if kinds.all(|k| k == first) => first,
            Some(_) => SymbolType::Hybrid,
            None => self.symbol_type,
        }
    }

    fn require(&self, expected: SymbolType) -> Result<(), SymbolError> {
        if self.symbol_type == expected {
            Ok(())
        } else {
            Err(SymbolError::SymbolTypeMismatch {
                expected,
                found: self.symbol_type,
            })
        }
    }

    // ── Layer list ───────────────────────────────────────────────

    pub fn symbol_layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn symbol_layer(&self, index: usize) -> Option<&dyn SymbolLayer> {
        self.layers.get(index).map(|l| &**l)
    }

    pub fn symbol_layer_mut(&mut self, index: usize) -> Option<&mut (dyn SymbolLayer + 'static)> {
        self.layers.get_mut(index).map(|l| &mut **l)
    }

    pub fn symbol_layers(&self) -> &[Box<dyn SymbolLayer>] {
        &self.layers
    }

    fn check_index(&self, index: usize) -> Result<(), SymbolError> {
        if index < self.layers.len() {
            Ok(())
        } else {
            Err(SymbolError::LayerIndexOutOfRange {
                index,
                count: self.layers.len(),
            })
        }
    }

    /// Insert before `index`; `index == count` appends.
    pub fn insert_symbol_layer(&mut self, index: usize, layer: Box<dyn SymbolLayer>) -> Result<(), SymbolError> {
        if index > self.layers.len() {
            return Err(SymbolError::LayerIndexOutOfRange {
                index,
                count: self.layers.len(),
            });
        }
        self.layers.insert(index, layer);
        Ok(())
    }

    pub fn append_symbol_layer(&mut self, layer: Box<dyn SymbolLayer>) {
        self.layers.push(layer);
    }

    pub fn delete_symbol_layer(&mut self, index: usize) -> Result<(), SymbolError> {
        self.take_symbol_layer(index).map(drop)
    }

    /// Remove the layer at `index` and hand it to the caller.
    pub fn take_symbol_layer(&mut self, index: usize) -> Result<Box<dyn SymbolLayer>, SymbolError> {
        self.check_index(index)?;
        Ok(self.layers.remove(index))
    }

    /// Replace the layer at `index`, returning the previous one.
    pub fn change_symbol_layer(
        &mut self,
        index: usize,
        layer: Box<dyn SymbolLayer>,
    ) -> Result<Box<dyn SymbolLayer>, SymbolError> {
        self.check_index(index)?;
        Ok(std::mem::replace(&mut self.layers[index], layer))
    }

    // ── Shared attributes ────────────────────────────────────────

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f64) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    pub fn render_hints(&self) -> RenderHints {
        self.render_hints
    }

    pub fn set_render_hints(&mut self, hints: RenderHints) {
        self.render_hints = hints;
    }

    pub fn clip_features_to_extent(&self) -> bool {
        self.clip_features_to_extent
    }

    pub fn set_clip_features_to_extent(&mut self, clip: bool) {
        self.clip_features_to_extent = clip;
    }

    /// The unit shared by every layer, or `Unknown` if they disagree.
    pub fn output_unit(&self) -> RenderUnit {
        RenderUnit::common(self.layers.iter().map(|l| l.output_unit()))
    }

    pub fn set_output_unit(&mut self, unit: RenderUnit) {
        for layer in &mut self.layers {
            layer.set_output_unit(unit);
        }
    }

    /// The map unit scale shared by every layer, or the default if they disagree.
    pub fn map_unit_scale(&self) -> MapUnitScale {
        let mut scales = self.layers.iter().map(|l| l.map_unit_scale());
        match scales.next() {
            Some(first) if scales.all(|s| s == first) => first,
            _ => MapUnitScale::default(),
        }
    }

    pub fn set_map_unit_scale(&mut self, scale: MapUnitScale) {
        for layer in &mut self.layers {
            layer.set_map_unit_scale(scale);
        }
    }

    /// Color of the first unlocked layer.
    pub fn color(&self) -> Color {
        self.layers
            .iter()
            .find(|l| !l.is_locked())
            .map(|l| l.color())
            .unwrap_or(Color::BLACK)
    }

    /// Recolor every unlocked layer.
    pub fn set_color(&mut self, color: Color) {
        for layer in self.layers.iter_mut().filter(|l| !l.is_locked()) {
            layer.set_color(color);
        }
    }

    // ── Introspection ────────────────────────────────────────────

    /// Fields any layer reads, without needing a render session.
    pub fn used_attributes(&self, context: &RenderContext) -> BTreeSet<String> {
        self.layers
            .iter()
            .flat_map(|l| l.used_attributes(context))
            .collect()
    }

    pub fn has_data_defined_properties(&self) -> bool {
        self.layers.iter().any(|l| l.has_data_defined_properties())
    }

    /// One-line description, e.g. `MARKER SYMBOL (1 layers) color 255,0,0,255`.
    pub fn dump(&self) -> String {
        format!(
            "{} SYMBOL ({} layers) color {}",
            self.symbol_type.name(),
            self.layers.len(),
            self.color().encode()
        )
    }

    /// Write the symbol and its layers through `writer`.
    pub fn to_style_document(&self, writer: &mut dyn StyleWriter, props: &StyleProperties) {
        let mut props = props.clone();
        props.insert("alpha".to_string(), self.opacity.to_string());
        props.insert("uom".to_string(), self.output_unit().name().to_string());
        writer.begin_symbol(self.symbol_type, &props);
        for layer in &self.layers {
            layer.to_style(writer, &props);
        }
        writer.end_symbol();
    }

    /// Evaluation scope seeded with symbol-level variables.
    pub(crate) fn symbol_scope(&self) -> ExpressionContextScope {
        let mut scope = ExpressionContextScope::new("symbol");
        scope.set_variable(vars::SYMBOL_COLOR, self.color().encode());
        if let Some(marker) = self.layers.iter().find_map(|l| l.marker_properties()) {
            scope.set_variable(vars::SYMBOL_ANGLE, marker.angle);
        }
        scope
    }
}

impl Clone for Symbol {
    fn clone(&self) -> Self {
        Self {
            symbol_type: self.symbol_type,
            layers: self.layers.iter().map(|l| l.clone_layer()).collect(),
            opacity: self.opacity,
            render_hints: self.render_hints,
            clip_features_to_extent: self.clip_features_to_extent,
        }
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Symbol")
            .field("symbol_type", &self.symbol_type)
            .field("layers", &self.layers)
            .field("opacity", &self.opacity)
            .field("render_hints", &self.render_hints)
            .field("clip_features_to_extent", &self.clip_features_to_extent)
            .finish()
    }
}
