use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::EvalError;
use crate::expression::{ExpressionContext, ExpressionEngine};
use crate::feature::AttributeValue;
use crate::geometry::Point;

/// Symbol attributes that can be overridden per feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PropertyKey {
    Size,
    Angle,
    Offset,
    Width,
    FillColor,
    StrokeColor,
    StrokeWidth,
    LayerEnabled,
}

/// Where a data-defined value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertySource {
    Static(AttributeValue),
    Field(String),
    Expression(String),
}

/// A data-defined override bound to one symbol attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub source: PropertySource,
    pub active: bool,
}

impl Property {
    pub fn from_value(value: impl Into<AttributeValue>) -> Self {
        Self {
            source: PropertySource::Static(value.into()),
            active: true,
        }
    }

    pub fn from_field(name: &str) -> Self {
        Self {
            source: PropertySource::Field(name.to_string()),
            active: true,
        }
    }

    pub fn from_expression(expression: &str) -> Self {
        Self {
            source: PropertySource::Expression(expression.to_string()),
            active: true,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Evaluate against `context`. Inactive properties are not special-cased
    /// here; [`PropertyCollection`] skips them.
    pub fn value(
        &self,
        context: &ExpressionContext<'_>,
        engine: Option<&dyn ExpressionEngine>,
    ) -> Result<AttributeValue, EvalError> {
        match &self.source {
            PropertySource::Static(v) => Ok(v.clone()),
            PropertySource::Field(name) => {
                let feature = context.feature().ok_or(EvalError::NoFeature)?;
                feature
                    .attribute(name)
                    .cloned()
                    .ok_or_else(|| EvalError::MissingField(name.clone()))
            }
            PropertySource::Expression(expr) => {
                let engine = engine.ok_or(EvalError::NoEngine)?;
                engine.evaluate(expr, context)
            }
        }
    }

    /// Fields this property reads. Expressions are analysed by the engine;
    /// without one they report nothing.
    pub fn referenced_fields(&self, engine: Option<&dyn ExpressionEngine>) -> BTreeSet<String> {
        match &self.source {
            PropertySource::Static(_) => BTreeSet::new(),
            PropertySource::Field(name) => BTreeSet::from([name.clone()]),
            PropertySource::Expression(expr) => match engine {
                Some(engine) => engine.referenced_columns(expr).unwrap_or_else(|e| {
                    log::debug!("Cannot analyse expression '{}': {}", expr, e);
                    BTreeSet::new()
                }),
                None => BTreeSet::new(),
            },
        }
    }

    /// The property written as an expression, for composing larger formulas.
    pub fn as_expression(&self) -> String {
        match &self.source {
            PropertySource::Static(AttributeValue::Text(s)) => format!("'{}'", s.replace('\'', "''")),
            PropertySource::Static(v) => v.to_string(),
            PropertySource::Field(name) => format!("\"{}\"", name.replace('"', "\"\"")),
            PropertySource::Expression(expr) => expr.clone(),
        }
    }
}

/// The set of data-defined overrides of a symbol layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyCollection {
    properties: BTreeMap<PropertyKey, Property>,
}

impl PropertyCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind or (with `None`) clear the property for `key`.
    pub fn set_property(&mut self, key: PropertyKey, property: Option<Property>) {
        match property {
            Some(p) => {
                self.properties.insert(key, p);
            }
            None => {
                self.properties.remove(&key);
            }
        }
    }

    pub fn property(&self, key: PropertyKey) -> Option<&Property> {
        self.properties.get(&key)
    }

    pub fn is_active(&self, key: PropertyKey) -> bool {
        self.properties.get(&key).is_some_and(Property::is_active)
    }

    pub fn has_active_properties(&self) -> bool {
        self.properties.values().any(Property::is_active)
    }

    pub fn keys(&self) -> impl Iterator<Item = PropertyKey> + '_ {
        self.properties.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Union of the fields read by every active property.
    pub fn referenced_fields(&self, engine: Option<&dyn ExpressionEngine>) -> BTreeSet<String> {
        self.properties
            .values()
            .filter(|p| p.is_active())
            .flat_map(|p| p.referenced_fields(engine))
            .collect()
    }

    /// Evaluated value for `key`, or `None` if unbound, inactive or failing.
    pub fn value(
        &self,
        key: PropertyKey,
        context: &ExpressionContext<'_>,
        engine: Option<&dyn ExpressionEngine>,
    ) -> Option<AttributeValue> {
        let property = self.properties.get(&key).filter(|p| p.is_active())?;
        match property.value(context, engine) {
            Ok(AttributeValue::Null) => None,
            Ok(value) => Some(value),
            Err(e) => {
                log::debug!("Data defined {:?} falls back to static value: {}", key, e);
                None
            }
        }
    }

    pub fn value_as_f64(
        &self,
        key: PropertyKey,
        context: &ExpressionContext<'_>,
        engine: Option<&dyn ExpressionEngine>,
        default: f64,
    ) -> f64 {
        self.value(key, context, engine)
            .and_then(|v| v.as_f64())
            .unwrap_or(default)
    }

    pub fn value_as_bool(
        &self,
        key: PropertyKey,
        context: &ExpressionContext<'_>,
        engine: Option<&dyn ExpressionEngine>,
        default: bool,
    ) -> bool {
        self.value(key, context, engine)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    pub fn value_as_color(
        &self,
        key: PropertyKey,
        context: &ExpressionContext<'_>,
        engine: Option<&dyn ExpressionEngine>,
        default: Color,
    ) -> Color {
        match self.value(key, context, engine) {
            Some(AttributeValue::Text(s)) => Color::decode(&s).unwrap_or(default),
            _ => default,
        }
    }

    /// Points are encoded as `"x,y"` text.
    pub fn value_as_point(
        &self,
        key: PropertyKey,
        context: &ExpressionContext<'_>,
        engine: Option<&dyn ExpressionEngine>,
        default: Point,
    ) -> Point {
        match self.value(key, context, engine) {
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Feature, FieldType, Fields};

    fn feature() -> Feature {
        let fields = Fields::new()
            .with_field("size", FieldType::Double)
            .with_field("color", FieldType::Text)
            .with_field("shift", FieldType::Text);
        Feature::new(7, fields)
            .with_attribute("size", 12.0)
            .with_attribute("color", "255,0,0")
            .with_attribute("shift", "1.5, -2")
    }

    #[test]
    fn test_field_property_reads_feature() {
        let f = feature();
        let ctx = ExpressionContext::new().with_feature(Some(&f));
        let mut props = PropertyCollection::new();
        props.set_property(PropertyKey::Size, Some(Property::from_field("size")));
        assert!((props.value_as_f64(PropertyKey::Size, &ctx, None, 3.0) - 12.0).abs() < 1e-10);
    }

    #[test]
    fn test_missing_field_falls_back() {
        let f = feature();
        let ctx = ExpressionContext::new().with_feature(Some(&f));
        let mut props = PropertyCollection::new();
        props.set_property(PropertyKey::Size, Some(Property::from_field("height")));
        assert!((props.value_as_f64(PropertyKey::Size, &ctx, None, 3.0) - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_expression_without_engine_falls_back() {
        let ctx = ExpressionContext::new();
        let mut props = PropertyCollection::new();
        props.set_property(PropertyKey::Angle, Some(Property::from_expression("45 + 1")));
        assert!((props.value_as_f64(PropertyKey::Angle, &ctx, None, 10.0) - 10.0).abs() < 1e-10);
    }

    #[test]
    fn test_inactive_property_is_ignored() {
        let f = feature();
        let ctx = ExpressionContext::new().with_feature(Some(&f));
        let mut prop = Property::from_field("size");
        prop.set_active(false);
        let mut props = PropertyCollection::new();
        props.set_property(PropertyKey::Size, Some(prop));
        assert!(!props.has_active_properties());
        assert!((props.value_as_f64(PropertyKey::Size, &ctx, None, 3.0) - 3.0).abs() < 1e-10);
        assert!(props.referenced_fields(None).is_empty());
    }

    #[test]
    fn test_color_and_point_values() {
        let f = feature();
        let ctx = ExpressionContext::new().with_feature(Some(&f));
        let mut props = PropertyCollection::new();
        props.set_property(PropertyKey::FillColor, Some(Property::from_field("color")));
        props.set_property(PropertyKey::Offset, Some(Property::from_field("shift")));
        assert_eq!(
            props.value_as_color(PropertyKey::FillColor, &ctx, None, Color::BLACK),
            Color::rgb(255, 0, 0)
        );
        assert_eq!(
            props.value_as_point(PropertyKey::Offset, &ctx, None, Point::default()),
            Point::new(1.5, -2.0)
        );
    }

    #[test]
    fn test_clearing_property() {
        let mut props = PropertyCollection::new();
        props.set_property(PropertyKey::Width, Some(Property::from_value(2.0)));
        assert!(props.is_active(PropertyKey::Width));
        props.set_property(PropertyKey::Width, None);
        assert!(props.is_empty());
    }

    #[test]
    fn test_as_expression_quotes_fields() {
        assert_eq!(Property::from_field("rot").as_expression(), "\"rot\"");
        assert_eq!(Property::from_value(3.5).as_expression(), "3.5");
        assert_eq!(Property::from_expression("a + 1").as_expression(), "a + 1");
    }
}
