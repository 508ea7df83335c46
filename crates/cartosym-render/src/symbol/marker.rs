//! Marker symbol operations.
//!
//! Symbol-level setters fan out to every marker layer while keeping the
//! layers' proportions to each other. Data-defined angle and size are stored
//! on each layer rewritten relative to the symbol value ("en masse"), e.g.
//! `15 + (<expr>)` for a layer rotated 15 degrees further than the symbol.

use cartosym_core::feature::{Feature, Fields};
use cartosym_core::geometry::{BBox, GeometryType, Point};
use cartosym_core::property::{Property, PropertyKey};
use cartosym_core::units::{MapUnitScale, RenderUnit};

use crate::canvas::NullCanvas;
use crate::context::RenderContext;
use crate::error::SymbolError;
use crate::layer::{MarkerProperties, ScaleMethod};

use super::render_context::SessionState;
use super::{Symbol, SymbolType};

pub(super) fn near(a: f64, b: f64) -> bool {
    (a - b).abs() <= 4.0 * f64::EPSILON
}

fn rewritten(expression: String, like: &Property) -> Property {
    let mut property = Property::from_expression(&expression);
    property.set_active(like.is_active());
    property
}

/// `property` rotated by a further `rotation` degrees.
pub(super) fn rotate_whole_symbol(rotation: f64, property: &Property) -> Property {
    rewritten(format!("{} + ({})", rotation, property.as_expression()), property)
}

/// `property` multiplied by `factor`.
pub(super) fn scale_whole_symbol(factor: f64, property: &Property) -> Property {
    rewritten(format!("{}*({})", factor, property.as_expression()), property)
}

/// An `"x,y"` offset scaling `property` by separate x and y factors.
pub(super) fn scale_whole_symbol_xy(factor_x: f64, factor_y: f64, property: &Property) -> Property {
    let expr = property.as_expression();
    rewritten(
        format!(
            "tostring({}*({}))||','||tostring({}*({}))",
            factor_x, expr, factor_y, expr
        ),
        property,
    )
}

impl Symbol {
    fn marker_layer_properties(&self) -> impl Iterator<Item = &MarkerProperties> + '_ {
        self.layers.iter().filter_map(|l| l.marker_properties())
    }

    fn for_each_marker(&mut self, mut f: impl FnMut(&mut MarkerProperties)) {
        for layer in self.layers.iter_mut() {
            if let Some(marker) = layer.marker_properties_mut() {
                f(marker);
            }
        }
    }

    /// Rotation of the first marker layer.
    pub fn angle(&self) -> Result<f64, SymbolError> {
        self.require(SymbolType::Marker)?;
        Ok(self.marker_layer_properties().next().map_or(0.0, |m| m.angle))
    }

    /// Rotate the whole symbol. Marker layers keep their rotation relative to
    /// the first one; fill symbols set the pattern angle of every fill layer.
    pub fn set_angle(&mut self, angle: f64) -> Result<(), SymbolError> {
        if self.symbol_type == SymbolType::Fill {
            self.set_fill_angle(angle);
            return Ok(());
        }
        let diff = angle - self.angle()?;
        self.for_each_marker(|m| m.angle += diff);
        Ok(())
    }

    /// Orientation of the line markers are placed along.
    pub fn set_line_angle(&mut self, line_angle: f64) -> Result<(), SymbolError> {
        self.require(SymbolType::Marker)?;
        self.for_each_marker(|m| m.line_angle = line_angle);
        Ok(())
    }

    /// The largest marker layer size.
    pub fn size(&self) -> Result<f64, SymbolError> {
        self.require(SymbolType::Marker)?;
        Ok(self.marker_layer_properties().fold(0.0, |max, m| max.max(m.size)))
    }

    /// Resize the symbol so its largest layer has `size`. Other layers and
    /// non-zero offsets scale by the same factor.
    pub fn set_size(&mut self, size: f64) -> Result<(), SymbolError> {
        let original = self.size()?;
        self.for_each_marker(|m| {
            if near(m.size, original) {
                m.size = size;
            } else if !near(original, 0.0) {
                m.size = m.size * size / original;
            }
            if !near(original, 0.0) && (!near(m.offset.x, 0.0) || !near(m.offset.y, 0.0)) {
                m.offset = Point::new(m.offset.x * size / original, m.offset.y * size / original);
            }
        });
        Ok(())
    }

    /// Unit shared by every marker layer's size, or `Unknown` if mixed.
    pub fn size_unit(&self) -> Result<RenderUnit, SymbolError> {
        self.require(SymbolType::Marker)?;
        Ok(RenderUnit::common(self.marker_layer_properties().map(|m| m.size_unit)))
    }

    pub fn set_size_unit(&mut self, unit: RenderUnit) -> Result<(), SymbolError> {
        self.require(SymbolType::Marker)?;
        self.for_each_marker(|m| m.size_unit = unit);
        Ok(())
    }

    pub fn size_map_unit_scale(&self) -> Result<MapUnitScale, SymbolError> {
        self.require(SymbolType::Marker)?;
        Ok(self
            .marker_layer_properties()
            .next()
            .map(|m| m.size_map_unit_scale)
            .unwrap_or_default())
    }

    pub fn set_size_map_unit_scale(&mut self, scale: MapUnitScale) -> Result<(), SymbolError> {
        self.require(SymbolType::Marker)?;
        self.for_each_marker(|m| m.size_map_unit_scale = scale);
        Ok(())
    }

    pub fn scale_method(&self) -> Result<ScaleMethod, SymbolError> {
        self.require(SymbolType::Marker)?;
        Ok(self
            .marker_layer_properties()
            .next()
            .map(|m| m.scale_method)
            .unwrap_or_default())
    }

    pub fn set_scale_method(&mut self, method: ScaleMethod) -> Result<(), SymbolError> {
        self.require(SymbolType::Marker)?;
        self.for_each_marker(|m| m.scale_method = method);
        Ok(())
    }

    // ── Data-defined angle and size ──────────────────────────────

    /// Bind (or with `None`, clear) a rotation for the whole symbol.
    pub fn set_data_defined_angle(&mut self, property: Option<Property>) -> Result<(), SymbolError> {
        let symbol_rotation = self.angle()?;
        for layer in self.layers.iter_mut() {
            let Some(angle) = layer.marker_properties().map(|m| m.angle) else {
                continue;
            };
            let bound = property.as_ref().map(|p| {
                if near(angle, symbol_rotation) {
                    p.clone()
                } else {
                    rotate_whole_symbol(angle - symbol_rotation, p)
                }
            });
            layer
                .data_defined_properties_mut()
                .set_property(PropertyKey::Angle, bound);
        }
        Ok(())
    }

    /// The symbol-level rotation property, if every marker layer still
    /// follows it.
    pub fn data_defined_angle(&self) -> Result<Option<Property>, SymbolError> {
        let symbol_rotation = self.angle()?;
        let base = self.layers.iter().find_map(|l| {
            let marker = l.marker_properties()?;
            let props = l.data_defined_properties();
            (near(marker.angle, symbol_rotation) && props.is_active(PropertyKey::Angle))
                .then(|| props.property(PropertyKey::Angle).cloned())
                .flatten()
        });
        let Some(base) = base else {
            return Ok(None);
        };

        for layer in self.layers.iter() {
            let Some(marker) = layer.marker_properties() else {
                continue;
            };
            let expected = if near(marker.angle, symbol_rotation) {
                base.clone()
            } else {
                rotate_whole_symbol(marker.angle - symbol_rotation, &base)
            };
            if layer.data_defined_properties().property(PropertyKey::Angle) != Some(&expected) {
                return Ok(None);
            }
        }
        Ok(Some(base))
    }

    /// Bind (or with `None`, clear) a size for the whole symbol. Layers of a
    /// different size, and non-zero offsets, get the property scaled.
    pub fn set_data_defined_size(&mut self, property: Option<Property>) -> Result<(), SymbolError> {
        let symbol_size = self.size()?;
        for layer in self.layers.iter_mut() {
            let Some((size, offset)) = layer.marker_properties().map(|m| (m.size, m.offset)) else {
                continue;
            };
            let props = layer.data_defined_properties_mut();
            let Some(p) = property.as_ref() else {
                props.set_property(PropertyKey::Size, None);
                props.set_property(PropertyKey::Offset, None);
                continue;
            };
            if near(symbol_size, 0.0) || near(size, symbol_size) {
                props.set_property(PropertyKey::Size, Some(p.clone()));
            } else {
                props.set_property(PropertyKey::Size, Some(scale_whole_symbol(size / symbol_size, p)));
            }
            if !near(symbol_size, 0.0) && (!near(offset.x, 0.0) || !near(offset.y, 0.0)) {
                props.set_property(
                    PropertyKey::Offset,
                    Some(scale_whole_symbol_xy(offset.x / symbol_size, offset.y / symbol_size, p)),
                );
            }
        }
        Ok(())
    }

    /// The symbol-level size property, if every marker layer still follows it.
    pub fn data_defined_size(&self) -> Result<Option<Property>, SymbolError> {
        let symbol_size = self.size()?;
        let base = self.layers.iter().find_map(|l| {
            let marker = l.marker_properties()?;
            let props = l.data_defined_properties();
            (near(marker.size, symbol_size) && props.is_active(PropertyKey::Size))
                .then(|| props.property(PropertyKey::Size).cloned())
                .flatten()
        });
        let Some(base) = base else {
            return Ok(None);
        };

        for layer in self.layers.iter() {
            let Some(marker) = layer.marker_properties() else {
                continue;
            };
            let props = layer.data_defined_properties();
            let expected = if near(marker.size, symbol_size) {
                base.clone()
            } else if near(symbol_size, 0.0) {
                return Ok(None);
            } else {
                scale_whole_symbol(marker.size / symbol_size, &base)
            };
            if props.property(PropertyKey::Size) != Some(&expected) {
                return Ok(None);
            }
            if !near(marker.offset.x, 0.0) || !near(marker.offset.y, 0.0) {
                let offset = scale_whole_symbol_xy(
                    marker.offset.x / symbol_size,
                    marker.offset.y / symbol_size,
                    &base,
                );
                if props.property(PropertyKey::Offset) != Some(&offset) {
                    return Ok(None);
                }
            }
        }
        Ok(Some(base))
    }

    // ── Bounds ───────────────────────────────────────────────────

    /// Device-space bounds of the symbol drawn at `point`. Data-defined
    /// size, rotation and offset are only considered when `feature` is given.
    pub fn bounds(
        &self,
        point: Point,
        context: &RenderContext,
        feature: Option<&Feature>,
    ) -> Result<Option<BBox>, SymbolError> {
        self.require(SymbolType::Marker)?;
        let empty = Fields::new();
        let fields = feature.map_or(&empty, Feature::fields);
        let mut canvas = NullCanvas;
        let mut state = SessionState::new(self, context, &mut canvas, fields);
        let mut ctx = state.context(feature, false);
        ctx.set_evaluate_properties(feature.is_some());
        ctx.set_original_geometry_type(GeometryType::Point);

        Ok(self
            .layers
            .iter()
            .filter(|l| l.is_enabled())
            .filter_map(|l| l.bounds(point, &mut ctx))
            .reduce(|a, b| a.union(&b)))
    }
}
