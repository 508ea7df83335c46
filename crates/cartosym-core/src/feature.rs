use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;

/// Unique feature identifier within a data source.
pub type FeatureId = u64;

/// A single attribute value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Numeric view of the value. Text is parsed; booleans map to 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            AttributeValue::Int(i) => Some(*i as f64),
            AttributeValue::Double(d) if d.is_finite() => Some(*d),
            AttributeValue::Double(_) => None,
            AttributeValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            AttributeValue::Int(i) => Some(*i != 0),
            AttributeValue::Double(d) => Some(*d != 0.0),
            AttributeValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            AttributeValue::Null => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Null => "null",
            AttributeValue::Bool(_) => "bool",
            AttributeValue::Int(_) => "int",
            AttributeValue::Double(_) => "double",
            AttributeValue::Text(_) => "text",
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "NULL"),
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::Int(i) => write!(f, "{i}"),
            AttributeValue::Double(d) => write!(f, "{d}"),
            AttributeValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Double(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Text(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Bool,
    Int,
    Double,
    Text,
}

/// A named, typed column of the data source schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
}

impl Field {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
        }
    }
}

/// Ordered schema of a data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fields {
    fields: Vec<Field>,
}

impl Fields {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn with_field(mut self, name: &str, field_type: FieldType) -> Self {
        self.append(Field::new(name, field_type));
        self
    }

    /// Append a field. Returns false if a field with the same name exists.
    pub fn append(&mut self, field: Field) -> bool {
        if self.index_of(&field.name).is_some() {
            return false;
        }
        self.fields.push(field);
        true
    }

    /// Case-insensitive lookup of a field index by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A read-only feature record: optional geometry plus attributes aligned with `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub geometry: Option<Geometry>,
    fields: Fields,
    attributes: Vec<AttributeValue>,
}

impl Feature {
    pub fn new(id: FeatureId, fields: Fields) -> Self {
        let attributes = vec![AttributeValue::Null; fields.len()];
        Self {
            id,
            geometry: None,
            fields,
            attributes,
        }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Set an attribute by field name. Returns false if there is no such field.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<AttributeValue>) -> bool {
        match self.fields.index_of(name) {
            Some(idx) => {
                self.attributes[idx] = value.into();
                true
            }
            None => false,
        }
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Look up an attribute by field name; `None` means "no such field".
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.fields
            .index_of(name)
            .and_then(|idx| self.attributes.get(idx))
    }

    pub fn attribute_at(&self, index: usize) -> Option<&AttributeValue> {
        self.attributes.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn schema() -> Fields {
        Fields::new()
            .with_field("name", FieldType::Text)
            .with_field("size", FieldType::Double)
    }

    #[test]
    fn test_attribute_lookup_by_name() {
        let f = Feature::new(1, schema())
            .with_attribute("size", 4.5)
            .with_geometry(Geometry::Point(Point::new(1.0, 2.0)));
        assert_eq!(f.attribute("SIZE"), Some(&AttributeValue::Double(4.5)));
        assert_eq!(f.attribute("name"), Some(&AttributeValue::Null));
        assert!(f.attribute("missing").is_none());
    }

    #[test]
    fn test_set_unknown_field_fails() {
        let mut f = Feature::new(1, schema());
        assert!(!f.set_attribute("height", 3.0));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut fields = schema();
        assert!(!fields.append(Field::new("Name", FieldType::Text)));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(AttributeValue::from("12.5").as_f64(), Some(12.5));
        assert_eq!(AttributeValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(AttributeValue::Null.as_f64(), None);
        assert_eq!(AttributeValue::Double(f64::NAN).as_f64(), None);
    }
}
