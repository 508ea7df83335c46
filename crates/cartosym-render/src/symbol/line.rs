//! Line symbol operations. Widths fan out to every line layer the way marker
//! sizes do, keeping the layers' proportions and relative offsets.

use cartosym_core::property::{Property, PropertyKey};
use cartosym_core::units::{MapUnitScale, RenderUnit};

use crate::error::SymbolError;
use crate::layer::LineProperties;

use super::marker::{near, scale_whole_symbol};
use super::{Symbol, SymbolType};

impl Symbol {
    fn line_layer_properties(&self) -> impl Iterator<Item = &LineProperties> + '_ {
        self.layers.iter().filter_map(|l| l.line_properties())
    }

    fn for_each_line(&mut self, mut f: impl FnMut(&mut LineProperties)) {
        for layer in self.layers.iter_mut() {
            if let Some(line) = layer.line_properties_mut() {
                f(line);
            }
        }
    }

    /// The widest line layer.
    pub fn width(&self) -> Result<f64, SymbolError> {
        self.require(SymbolType::Line)?;
        Ok(self.line_layer_properties().fold(0.0, |max, l| max.max(l.width)))
    }

    /// Set the width of the widest layer to `width`, scaling the others and
    /// their offsets by the same factor.
    pub fn set_width(&mut self, width: f64) -> Result<(), SymbolError> {
        let original = self.width()?;
        self.for_each_line(|l| {
            if near(l.width, original) {
                l.width = width;
            } else if !near(original, 0.0) {
                l.width = l.width * width / original;
            }
            if !near(original, 0.0) && !near(l.offset, 0.0) {
                l.offset = l.offset * width / original;
            }
        });
        Ok(())
    }

    pub fn width_unit(&self) -> Result<RenderUnit, SymbolError> {
        self.require(SymbolType::Line)?;
        Ok(RenderUnit::common(self.line_layer_properties().map(|l| l.width_unit)))
    }

    pub fn set_width_unit(&mut self, unit: RenderUnit) -> Result<(), SymbolError> {
        self.require(SymbolType::Line)?;
        self.for_each_line(|l| l.width_unit = unit);
        Ok(())
    }

    pub fn set_width_map_unit_scale(&mut self, scale: MapUnitScale) -> Result<(), SymbolError> {
        self.require(SymbolType::Line)?;
        self.for_each_line(|l| l.width_map_unit_scale = scale);
        Ok(())
    }

    /// Bind (or with `None`, clear) a width for the whole symbol.
    pub fn set_data_defined_width(&mut self, property: Option<Property>) -> Result<(), SymbolError> {
        let symbol_width = self.width()?;
        for layer in self.layers.iter_mut() {
            let Some((width, offset)) = layer.line_properties().map(|l| (l.width, l.offset)) else {
                continue;
            };
            let props = layer.data_defined_properties_mut();
            let Some(p) = property.as_ref() else {
                props.set_property(PropertyKey::Width, None);
                props.set_property(PropertyKey::Offset, None);
                continue;
            };
            if near(symbol_width, 0.0) || near(width, symbol_width) {
                props.set_property(PropertyKey::Width, Some(p.clone()));
            } else {
                props.set_property(PropertyKey::Width, Some(scale_whole_symbol(width / symbol_width, p)));
            }
            if !near(symbol_width, 0.0) && !near(offset, 0.0) {
                props.set_property(PropertyKey::Offset, Some(scale_whole_symbol(offset / symbol_width, p)));
            }
        }
        Ok(())
    }

    /// The symbol-level width property, if every line layer still follows it.
    pub fn data_defined_width(&self) -> Result<Option<Property>, SymbolError> {
        let symbol_width = self.width()?;
        let base = self.layers.iter().find_map(|l| {
            let line = l.line_properties()?;
            let props = l.data_defined_properties();
            (near(line.width, symbol_width) && props.is_active(PropertyKey::Width))
                .then(|| props.property(PropertyKey::Width).cloned())
                .flatten()
        });
        let Some(base) = base else {
            return Ok(None);
        };

        for layer in self.layers.iter() {
            let Some(line) = layer.line_properties() else {
                continue;
            };
            let props = layer.data_defined_properties();
            let expected = if near(line.width, symbol_width) {
                base.clone()
            } else if near(symbol_width, 0.0) {
                return Ok(None);
            } else {
                scale_whole_symbol(line.width / symbol_width, &base)
            };
            if props.property(PropertyKey::Width) != Some(&expected) {
                return Ok(None);
            }
            if !near(line.offset, 0.0) {
                let offset = scale_whole_symbol(line.offset / symbol_width, &base);
                if props.property(PropertyKey::Offset) != Some(&offset) {
                    return Ok(None);
                }
            }
        }
        Ok(Some(base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{SimpleLineLayer, SymbolLayer};
    use cartosym_core::Color;

    fn line_with_widths(widths: &[f64]) -> Symbol {
        Symbol::line(
            widths
                .iter()
                .map(|&w| Box::new(SimpleLineLayer::new(Color::BLACK, w)) as Box<dyn SymbolLayer>)
                .collect(),
        )
    }

    fn widths(symbol: &Symbol) -> Vec<f64> {
        symbol.line_layer_properties().map(|l| l.width).collect()
    }

    #[test]
    fn test_set_width_keeps_proportions_and_offsets() {
        let mut symbol = Symbol::line(vec![
            Box::new(SimpleLineLayer::new(Color::BLACK, 1.0).with_offset(0.5)),
            Box::new(SimpleLineLayer::new(Color::WHITE, 2.0)),
        ]);
        symbol.set_width(4.0).unwrap();
        let w = widths(&symbol);
        assert!((w[0] - 2.0).abs() < 1e-10);
        assert!((w[1] - 4.0).abs() < 1e-10);
        let offset = symbol.symbol_layer(0).unwrap().line_properties().unwrap().offset;
        assert!((offset - 1.0).abs() < 1e-10);
        assert!((symbol.width().unwrap() - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_width_operations_reject_marker_symbol() {
        let mut symbol = Symbol::default_marker();
        assert_eq!(
            symbol.set_width(1.0),
            Err(SymbolError::SymbolTypeMismatch {
                expected: SymbolType::Line,
                found: SymbolType::Marker
            })
        );
        assert!(symbol.data_defined_width().is_err());
    }

    #[test]
    fn test_width_unit() {
        let mut symbol = line_with_widths(&[1.0, 2.0]);
        assert_eq!(symbol.width_unit().unwrap(), RenderUnit::Millimeters);
        symbol.set_width_unit(RenderUnit::Points).unwrap();
        assert_eq!(symbol.width_unit().unwrap(), RenderUnit::Points);
    }

    #[test]
    fn test_data_defined_width_en_masse() {
        let mut symbol = Symbol::line(vec![
            Box::new(SimpleLineLayer::new(Color::BLACK, 1.0).with_offset(0.5)),
            Box::new(SimpleLineLayer::new(Color::WHITE, 2.0)),
        ]);
        let property = Property::from_field("lanes");
        symbol.set_data_defined_width(Some(property.clone())).unwrap();

        let first = symbol.symbol_layer(0).unwrap().data_defined_properties();
        assert_eq!(
            first.property(PropertyKey::Width).unwrap().as_expression(),
            "0.5*(\"lanes\")"
        );
        assert_eq!(
            first.property(PropertyKey::Offset).unwrap().as_expression(),
            "0.25*(\"lanes\")"
        );
        assert_eq!(symbol.data_defined_width().unwrap(), Some(property));

        symbol
            .symbol_layer_mut(0)
            .unwrap()
            .data_defined_properties_mut()
            .set_property(PropertyKey::Offset, None);
        assert_eq!(symbol.data_defined_width().unwrap(), None);

        symbol.set_data_defined_width(None).unwrap();
        assert!(!symbol.has_data_defined_properties());
    }
}
