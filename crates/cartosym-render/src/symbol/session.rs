//! The bracketed render pass of a symbol.
//!
//! [`Symbol::start_render`] prepares every layer and returns a
//! [`RenderSession`]; dropping the session (or calling
//! [`RenderSession::stop_render`]) lets every layer release what it cached.
//! The session holds the symbol's exclusive borrow, so starting a second one
//! while the first is alive is rejected at compile time:
//!
//! ```compile_fail
//! use cartosym_core::Fields;
//! use cartosym_render::canvas::NullCanvas;
//! use cartosym_render::context::RenderContext;
//! use cartosym_render::symbol::Symbol;
//!
//! let mut symbol = Symbol::default_marker();
//! let context = RenderContext::for_device();
//! let fields = Fields::new();
//! let (mut a, mut b) = (NullCanvas, NullCanvas);
//! let first = symbol.start_render(&context, &mut a, &fields);
//! let second = symbol.start_render(&context, &mut b, &fields);
//! first.stop_render();
//! second.stop_render();
//! ```

use cartosym_core::feature::{Feature, Fields};
use cartosym_core::geometry::{BBox, Geometry, GeometryType, Point, Polygon};
use cartosym_core::property::PropertyKey;
use cartosym_core::units::{MapUnitScale, RenderUnit};
use cartosym_core::Color;

use crate::canvas::{Canvas, MarkerGlyph, MarkerShape, Stroke};
use crate::context::RenderContext;
use crate::error::SymbolError;
use crate::layer::{paints_natively, SymbolLayer};
use crate::projector;

use super::render_context::SessionState;
use super::{Symbol, SymbolRenderContext, SymbolType};

/// Which layers of the symbol paint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LayerSelection {
    #[default]
    All,
    /// Only the layer at this index, e.g. to preview one layer while editing.
    Only(usize),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VertexMarkerKind {
    #[default]
    SemiTransparentCircle,
    Cross,
    NoMarker,
}

/// Editing marker drawn on every vertex of a feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexMarker {
    pub kind: VertexMarkerKind,
    /// Size in millimetres.
    pub size: f64,
}

impl Default for VertexMarker {
    fn default() -> Self {
        Self {
            kind: VertexMarkerKind::default(),
            size: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeatureRenderOptions {
    pub layer: LayerSelection,
    pub selected: bool,
    pub vertex_marker: Option<VertexMarker>,
}

impl FeatureRenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, index: usize) -> Self {
        self.layer = LayerSelection::Only(index);
        self
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    pub fn with_vertex_marker(mut self, marker: VertexMarker) -> Self {
        self.vertex_marker = Some(marker);
        self
    }
}

/// Device-space geometry handed to layers.
#[derive(Clone, Copy)]
enum DeviceGeometry<'g> {
    Point(Point),
    Line(&'g [Point]),
    Polygon(&'g [Point], Option<&'g [Vec<Point>]>),
}

#[derive(Debug, Clone, Copy)]
struct Part {
    num: usize,
    count: usize,
    geometry_type: GeometryType,
}

impl Part {
    fn single(geometry_type: GeometryType) -> Self {
        Self {
            num: 1,
            count: 1,
            geometry_type,
        }
    }
}

const VERTEX_MARKER_COLOR: Color = Color::rgb(255, 0, 0);

impl Symbol {
    /// Begin a render pass painting onto `canvas`. Every layer is prepared
    /// before this returns.
    pub fn start_render<'a>(
        &'a mut self,
        context: &'a RenderContext,
        canvas: &'a mut dyn Canvas,
        fields: &'a Fields,
    ) -> RenderSession<'a> {
        RenderSession::start(self, context, canvas, fields)
    }
}

/// An active render pass of one symbol.
pub struct RenderSession<'a> {
    symbol: &'a mut Symbol,
    state: SessionState<'a>,
    stopped: bool,
}

impl<'a> RenderSession<'a> {
    fn start(
        symbol: &'a mut Symbol,
        context: &'a RenderContext,
        canvas: &'a mut dyn Canvas,
        fields: &'a Fields,
    ) -> Self {
        let mut state = SessionState::new(symbol, context, canvas, fields);
        {
            let mut ctx = state.context(None, false);
            for layer in symbol.layers.iter_mut() {
                layer.start_render(&mut ctx);
            }
        }
        log::debug!(
            "Started render of {:?} symbol with {} layers",
            symbol.symbol_type,
            symbol.layers.len()
        );
        Self {
            symbol,
            state,
            stopped: false,
        }
    }

    /// End the pass. Dropping the session has the same effect.
    pub fn stop_render(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        {
            let mut ctx = self.state.context(None, false);
            for layer in self.symbol.layers.iter_mut() {
                layer.stop_render(&mut ctx);
            }
        }
        self.state.scope = None;
        log::debug!("Stopped render of {:?} symbol", self.symbol.symbol_type);
    }

    pub fn symbol(&self) -> &Symbol {
        self.symbol
    }

    pub fn render_context(&self) -> &RenderContext {
        self.state.render_context
    }

    pub fn fields(&self) -> &Fields {
        self.state.fields
    }

    // ── Typed entry points (device-space geometry) ───────────────

    /// Paint a marker symbol at an already projected point.
    pub fn render_point(
        &mut self,
        point: Point,
        feature: Option<&Feature>,
        layer: LayerSelection,
        selected: bool,
    ) -> Result<(), SymbolError> {
        self.symbol.require(SymbolType::Marker)?;
        let part = Part::single(GeometryType::Point);
        self.paint(DeviceGeometry::Point(point), feature, layer, selected, part)
    }

    /// Paint a line symbol along an already projected polyline.
    pub fn render_polyline(
        &mut self,
        points: &[Point],
        feature: Option<&Feature>,
        layer: LayerSelection,
        selected: bool,
    ) -> Result<(), SymbolError> {
        self.symbol.require(SymbolType::Line)?;
        let part = Part::single(GeometryType::Line);
        self.paint(DeviceGeometry::Line(points), feature, layer, selected, part)
    }

    /// Paint a fill symbol over an already projected polygon.
    pub fn render_polygon(
        &mut self,
        exterior: &[Point],
        holes: Option<&[Vec<Point>]>,
        feature: Option<&Feature>,
        layer: LayerSelection,
        selected: bool,
    ) -> Result<(), SymbolError> {
        self.symbol.require(SymbolType::Fill)?;
        let part = Part::single(GeometryType::Polygon);
        self.paint(
            DeviceGeometry::Polygon(exterior, holes),
            feature,
            layer,
            selected,
            part,
        )
    }

    // ── Features (map-space geometry) ────────────────────────────

    /// Project and paint every part of `feature`'s geometry.
    ///
    /// A geometry the symbol cannot draw (a line under a marker symbol, ...)
    /// is skipped, as is a feature without geometry.
    pub fn render_feature(
        &mut self,
        feature: &Feature,
        options: &FeatureRenderOptions,
    ) -> Result<(), SymbolError> {
        self.check_selection(options.layer)?;
        let Some(geometry) = feature.geometry.as_ref() else {
            log::debug!("Feature {} has no geometry, nothing to render", feature.id);
            return Ok(());
        };

        let geometry_type = geometry.geometry_type();
        let expected = match geometry_type {
            GeometryType::Point => SymbolType::Marker,
            GeometryType::Line => SymbolType::Line,
            GeometryType::Polygon => SymbolType::Fill,
            GeometryType::Unknown => return Ok(()),
        };
        if expected != self.symbol.symbol_type {
            log::debug!(
                "Cannot render {:?} geometry of feature {} with a {:?} symbol",
                geometry_type,
                feature.id,
                self.symbol.symbol_type
            );
            return Ok(());
        }

        let count = geometry.part_count();
        let part = |i: usize| Part {
            num: i + 1,
            count,
            geometry_type,
        };
        match geometry {
            Geometry::Point(p) => self.render_point_part(feature, p, options, part(0)),
            Geometry::MultiPoint(points) => {
                for (i, p) in points.iter().enumerate() {
                    self.render_point_part(feature, p, options, part(i))?;
                }
                Ok(())
            }
            Geometry::LineString(points) => self.render_line_part(feature, points, options, part(0)),
            Geometry::MultiLineString(lines) => {
                for (i, line) in lines.iter().enumerate() {
                    self.render_line_part(feature, line, options, part(i))?;
                }
                Ok(())
            }
            Geometry::Polygon(polygon) => {
                self.render_polygon_part(feature, polygon, options, part(0))
            }
            Geometry::MultiPolygon(polygons) => {
                for (i, polygon) in polygons.iter().enumerate() {
                    self.render_polygon_part(feature, polygon, options, part(i))?;
                }
                Ok(())
            }
        }
    }

    fn render_point_part(
        &mut self,
        feature: &Feature,
        point: &Point,
        options: &FeatureRenderOptions,
        part: Part,
    ) -> Result<(), SymbolError> {
        let device = match projector::project_point(self.state.render_context, point) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("Skipping part {} of feature {}: {}", part.num, feature.id, e);
                return Ok(());
            }
        };
        self.paint(
            DeviceGeometry::Point(device),
            Some(feature),
            options.layer,
            options.selected,
            part,
        )?;
        self.draw_vertex_markers(options, &[device]);
        Ok(())
    }

    fn render_line_part(
        &mut self,
        feature: &Feature,
        points: &[Point],
        options: &FeatureRenderOptions,
        part: Part,
    ) -> Result<(), SymbolError> {
        let chains = projector::project_line_string(
            self.state.render_context,
            points,
            self.state.clip_features_to_extent,
        );
        for chain in &chains {
            self.paint(
                DeviceGeometry::Line(chain.as_slice()),
                Some(feature),
                options.layer,
                options.selected,
                part,
            )?;
            self.draw_vertex_markers(options, chain);
        }
        Ok(())
    }

    fn render_polygon_part(
        &mut self,
        feature: &Feature,
        polygon: &Polygon,
        options: &FeatureRenderOptions,
        part: Part,
    ) -> Result<(), SymbolError> {
        let (exterior, holes) = projector::project_polygon(
            self.state.render_context,
            polygon,
            self.state.clip_features_to_extent,
        );
        if exterior.is_empty() {
            log::trace!("Part {} of feature {} is outside the extent", part.num, feature.id);
            return Ok(());
        }
        let hole_slice = (!holes.is_empty()).then_some(holes.as_slice());
        self.paint(
            DeviceGeometry::Polygon(exterior.as_slice(), hole_slice),
            Some(feature),
            options.layer,
            options.selected,
            part,
        )?;
        self.draw_vertex_markers(options, &exterior);
        for hole in &holes {
            self.draw_vertex_markers(options, hole);
        }
        Ok(())
    }

    // ── Dispatch ─────────────────────────────────────────────────

    fn check_selection(&self, selection: LayerSelection) -> Result<(), SymbolError> {
        match selection {
            LayerSelection::Only(index) if index >= self.symbol.layers.len() => {
                Err(SymbolError::LayerIndexOutOfRange {
                    index,
                    count: self.symbol.layers.len(),
                })
            }
            _ => Ok(()),
        }
    }

    fn paint(
        &mut self,
        geometry: DeviceGeometry<'_>,
        feature: Option<&Feature>,
        selection: LayerSelection,
        selected: bool,
        part: Part,
    ) -> Result<(), SymbolError> {
        self.check_selection(selection)?;
        let symbol_type = self.symbol.symbol_type;
        let mut ctx = self.state.context(feature, selected);
        ctx.set_geometry_part_num(part.num);
        ctx.set_geometry_part_count(part.count);
        ctx.set_original_geometry_type(part.geometry_type);

        match selection {
            LayerSelection::All => {
                for layer in self.symbol.layers.iter_mut() {
                    paint_layer(layer.as_mut(), symbol_type, geometry, &mut ctx);
                }
            }
            LayerSelection::Only(index) => {
                if let Some(layer) = self.symbol.layers.get_mut(index) {
                    paint_layer(layer.as_mut(), symbol_type, geometry, &mut ctx);
                }
            }
        }
        Ok(())
    }

    fn draw_vertex_markers(&mut self, options: &FeatureRenderOptions, points: &[Point]) {
        let Some(marker) = options.vertex_marker else {
            return;
        };
        let size = self.state.render_context.convert_to_painter_units(
            marker.size,
            RenderUnit::Millimeters,
            &MapUnitScale::default(),
        );
        let stroke = Stroke::new(VERTEX_MARKER_COLOR, 1.0);
        let (shape, fill) = match marker.kind {
            VertexMarkerKind::SemiTransparentCircle => {
                (MarkerShape::Circle, Some(VERTEX_MARKER_COLOR.with_alpha(63)))
            }
            VertexMarkerKind::Cross => (MarkerShape::Cross, None),
            VertexMarkerKind::NoMarker => return,
        };
        for p in points {
            self.state.canvas.draw_marker(&MarkerGlyph {
                center: *p,
                shape,
                size,
                angle: 0.0,
                fill,
                stroke: Some(stroke.clone()),
            });
        }
    }

    /// Paint each layer's preview into a `width` x `height` box. Line layers
    /// of a fill symbol outline the box.
    pub(crate) fn paint_preview_icon(&mut self, width: f64, height: f64) {
        let symbol_type = self.symbol.symbol_type;
        let mut ctx = self.state.context(None, false);
        let mut outline = BBox::from_coords(0.0, 0.0, width, height).corners().to_vec();
        outline.push(outline[0]);
        for layer in self.symbol.layers.iter_mut().filter(|l| l.is_enabled()) {
            if symbol_type == SymbolType::Fill && layer.kind() == SymbolType::Line {
                layer.render_polygon_stroke(&outline, None, &mut ctx);
            } else {
                layer.draw_preview_icon(&mut ctx, width, height);
            }
        }
    }

    pub(crate) fn canvas(&mut self) -> &mut dyn Canvas {
        &mut *self.state.canvas
    }
}

impl Drop for RenderSession<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Paint one layer, honouring its enabled state. Layers that do not paint
/// this geometry natively still run, with an empty geometry.
fn paint_layer(
    layer: &mut dyn SymbolLayer,
    symbol_type: SymbolType,
    geometry: DeviceGeometry<'_>,
    ctx: &mut SymbolRenderContext<'_>,
) {
    if !layer.is_enabled()
        || !ctx.property_bool(layer.data_defined_properties(), PropertyKey::LayerEnabled, true)
    {
        return;
    }

    let kind = layer.kind();
    if !paints_natively(kind, symbol_type) {
        log::trace!(
            "{} layer inside a {:?} symbol gets an empty geometry",
            layer.layer_type(),
            symbol_type
        );
        match kind {
            SymbolType::Marker => layer.render_point(None, ctx),
            SymbolType::Line => layer.render_polyline(&[], ctx),
            SymbolType::Fill => layer.render_polygon(&[], None, ctx),
            SymbolType::Hybrid => {}
        }
        return;
    }

    match geometry {
        DeviceGeometry::Point(p) => layer.render_point(Some(p), ctx),
        DeviceGeometry::Line(points) => layer.render_polyline(points, ctx),
        DeviceGeometry::Polygon(exterior, holes) if kind == SymbolType::Line => {
            layer.render_polygon_stroke(exterior, holes, ctx)
        }
        DeviceGeometry::Polygon(exterior, holes) => layer.render_polygon(exterior, holes, ctx),
    }
}
