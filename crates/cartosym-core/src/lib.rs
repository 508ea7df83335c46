//! # Cartosym Core
//!
//! Data model shared by the symbol renderer: map geometries (points, lines,
//! polygons with holes and their multi-part forms), read-only feature records,
//! colors, render units, and data-defined properties evaluated through an
//! external expression engine. Also carries an R-tree index over feature
//! bounds for extent culling.

pub mod geometry;
pub mod color;
pub mod feature;
pub mod units;
pub mod expression;
pub mod property;
pub mod spatial;
pub mod error;

pub use color::Color;
pub use error::EvalError;
pub use expression::{ExpressionContext, ExpressionContextScope, ExpressionEngine};
pub use feature::{AttributeValue, Feature, FeatureId, Field, FieldType, Fields};
pub use geometry::{BBox, Geometry, GeometryType, Point, Polygon};
pub use property::{Property, PropertyCollection, PropertyKey, PropertySource};
pub use spatial::FeatureIndex;
pub use units::{MapUnitScale, RenderUnit};
