use cartosym_core::expression::{vars, ExpressionContext, ExpressionContextScope};
use cartosym_core::feature::{AttributeValue, Feature, Fields};
use cartosym_core::geometry::{GeometryType, Point};
use cartosym_core::property::{PropertyCollection, PropertyKey};
use cartosym_core::units::{MapUnitScale, RenderUnit};
use cartosym_core::Color;

use crate::canvas::Canvas;
use crate::context::RenderContext;

use super::{RenderHints, Symbol};

/// State a render session owns for its whole lifetime.
pub(crate) struct SessionState<'a> {
    pub(crate) render_context: &'a RenderContext,
    pub(crate) canvas: &'a mut dyn Canvas,
    pub(crate) fields: &'a Fields,
    /// Symbol-level evaluation scope, created on first use.
    pub(crate) scope: Option<ExpressionContextScope>,
    pub(crate) output_unit: RenderUnit,
    pub(crate) map_unit_scale: MapUnitScale,
    pub(crate) opacity: f64,
    pub(crate) render_hints: RenderHints,
    pub(crate) clip_features_to_extent: bool,
}

impl<'a> SessionState<'a> {
    pub(crate) fn new(
        symbol: &Symbol,
        render_context: &'a RenderContext,
        canvas: &'a mut dyn Canvas,
        fields: &'a Fields,
    ) -> Self {
        let scope = symbol
            .has_data_defined_properties()
            .then(|| symbol.symbol_scope());
        Self {
            render_context,
            canvas,
            fields,
            scope,
            output_unit: symbol.output_unit(),
            map_unit_scale: symbol.map_unit_scale(),
            opacity: symbol.opacity(),
            render_hints: symbol.render_hints(),
            clip_features_to_extent: symbol.clip_features_to_extent(),
        }
    }

    /// Context for one paint call. The feature is only borrowed for the call.
    pub(crate) fn context<'c>(
        &'c mut self,
        feature: Option<&'c Feature>,
        selected: bool,
    ) -> SymbolRenderContext<'c> {
        SymbolRenderContext {
            render_context: self.render_context,
            canvas: &mut *self.canvas,
            fields: self.fields,
            scope: &mut self.scope,
            output_unit: self.output_unit,
            map_unit_scale: self.map_unit_scale,
            opacity: self.opacity,
            render_hints: self.render_hints,
            selected,
            feature,
            geometry_part_num: 1,
            geometry_part_count: 1,
            original_geometry_type: GeometryType::Unknown,
            evaluate_properties: true,
        }
    }
}

/// What a symbol layer sees while painting: the render context, the canvas,
/// symbol-wide settings and the feature currently being drawn.
pub struct SymbolRenderContext<'c> {
    render_context: &'c RenderContext,
    canvas: &'c mut dyn Canvas,
    fields: &'c Fields,
    scope: &'c mut Option<ExpressionContextScope>,
    output_unit: RenderUnit,
    map_unit_scale: MapUnitScale,
    opacity: f64,
    render_hints: RenderHints,
    selected: bool,
    feature: Option<&'c Feature>,
    geometry_part_num: usize,
    geometry_part_count: usize,
    original_geometry_type: GeometryType,
    evaluate_properties: bool,
}

impl<'c> SymbolRenderContext<'c> {
    pub fn render_context(&self) -> &RenderContext {
        self.render_context
    }

    pub fn canvas(&mut self) -> &mut dyn Canvas {
        &mut *self.canvas
    }

    pub fn fields(&self) -> &Fields {
        self.fields
    }

    pub fn feature(&self) -> Option<&Feature> {
        self.feature
    }

    pub fn output_unit(&self) -> RenderUnit {
        self.output_unit
    }

    pub fn map_unit_scale(&self) -> &MapUnitScale {
        &self.map_unit_scale
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn selection_color(&self) -> Color {
        self.render_context.selection_color()
    }

    pub fn render_hints(&self) -> RenderHints {
        self.render_hints
    }

    /// 1-based index of the geometry part being painted.
    pub fn geometry_part_num(&self) -> usize {
        self.geometry_part_num
    }

    pub fn set_geometry_part_num(&mut self, num: usize) {
        self.geometry_part_num = num;
    }

    pub fn geometry_part_count(&self) -> usize {
        self.geometry_part_count
    }

    pub fn set_geometry_part_count(&mut self, count: usize) {
        self.geometry_part_count = count;
    }

    pub fn original_geometry_type(&self) -> GeometryType {
        self.original_geometry_type
    }

    pub fn set_original_geometry_type(&mut self, geometry_type: GeometryType) {
        self.original_geometry_type = geometry_type;
    }

    pub(crate) fn set_evaluate_properties(&mut self, evaluate: bool) {
        self.evaluate_properties = evaluate;
    }

    pub fn expression_scope(&self) -> Option<&ExpressionContextScope> {
        self.scope.as_ref()
    }

    /// The symbol scope, created if this is the first time it is needed.
    pub fn expression_scope_mut(&mut self) -> &mut ExpressionContextScope {
        self.scope
            .get_or_insert_with(|| ExpressionContextScope::new("symbol"))
    }

    /// Feature, render-context scopes and the symbol scope, in that order.
    pub fn expression_context(&self) -> ExpressionContext<'_> {
        let mut context = ExpressionContext::new().with_feature(self.feature);
        for scope in self.render_context.expression_scopes() {
            context.push_scope(scope);
        }
        if let Some(scope) = self.scope.as_ref() {
            context.push_scope(scope);
        }
        context
    }

    /// Evaluate the data-defined property `key` with `original` exposed as
    /// the `value` variable. `None` means "keep the static value".
    pub fn property_value(
        &mut self,
        properties: &PropertyCollection,
        key: PropertyKey,
        original: impl Into<AttributeValue>,
    ) -> Option<AttributeValue> {
        if !self.evaluate_properties || !properties.is_active(key) {
            return None;
        }
        let (num, count) = (self.geometry_part_num, self.geometry_part_count);
        let scope = self.expression_scope_mut();
        scope.set_variable(vars::ORIGINAL_VALUE, original);
        scope.set_variable(vars::GEOMETRY_PART_NUM, num as i64);
        scope.set_variable(vars::GEOMETRY_PART_COUNT, count as i64);

        let context = self.expression_context();
        properties.value(key, &context, self.render_context.expression_engine())
    }

    pub fn property_f64(&mut self, properties: &PropertyCollection, key: PropertyKey, default: f64) -> f64 {
        self.property_value(properties, key, default)
            .and_then(|v| v.as_f64())
            .unwrap_or(default)
    }

    pub fn property_bool(&mut self, properties: &PropertyCollection, key: PropertyKey, default: bool) -> bool {
        self.property_value(properties, key, default)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    pub fn property_color(&mut self, properties: &PropertyCollection, key: PropertyKey, default: Color) -> Color {
        match self.property_value(properties, key, default.encode()) {
            Some(AttributeValue::Text(s)) => Color::decode(&s).unwrap_or(default),
            _ => default,
        }
    }

    /// Points are exchanged as `"x,y"` text.
    pub fn property_point(&mut self, properties: &PropertyCollection, key: PropertyKey, default: Point) -> Point {
        let original = format!("{},{}", default.x, default.y);
        match self.property_value(properties, key, original) {
            Some(AttributeValue::Text(s)) => {
                let mut parts = s.split(',').map(|p| p.trim().parse::<f64>());
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(Ok(x)), Some(Ok(y)), None) => Point::new(x, y),
                    _ => default,
                }
            }
            _ => default,
        }
    }

    /// Convert `size` in `unit` to painter pixels.
    pub fn convert_to_painter_units(&self, size: f64, unit: RenderUnit, scale: &MapUnitScale) -> f64 {
        self.render_context.convert_to_painter_units(size, unit, scale)
    }

    /// A line width in the symbol's output unit, in pixels.
    pub fn output_line_width(&self, width: f64) -> f64 {
        self.convert_to_painter_units(width, self.output_unit, &self.map_unit_scale)
    }

    /// A marker size in the symbol's output unit, in pixels.
    pub fn output_pixel_size(&self, size: f64) -> f64 {
        self.convert_to_painter_units(size, self.output_unit, &self.map_unit_scale)
    }
}
