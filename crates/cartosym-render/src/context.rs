use std::fmt;
use std::sync::Arc;

use cartosym_core::expression::{ExpressionContextScope, ExpressionEngine};
use cartosym_core::geometry::BBox;
use cartosym_core::units::{MapUnitScale, RenderUnit, INCH_TO_MM, POINTS_TO_MM};
use cartosym_core::Color;

use crate::error::TransformError;
use crate::map_to_pixel::MapToPixel;

/// Pixels per millimetre at 96 dpi.
pub const DEFAULT_SCALE_FACTOR: f64 = 96.0 / 25.4;

/// Reprojection between coordinate reference systems, supplied by the caller.
pub trait CoordinateTransform: fmt::Debug + Send + Sync {
    /// An invalid (unset) transform means "skip reprojection".
    fn is_valid(&self) -> bool {
        true
    }

    fn transform_point(&self, x: f64, y: f64, z: f64) -> Result<(f64, f64, f64), TransformError>;
}

/// Everything a render pass needs to turn map geometry into paint calls,
/// apart from the canvas itself.
#[derive(Debug, Clone)]
pub struct RenderContext {
    map_to_pixel: MapToPixel,
    /// Visible extent in the map coordinate system, used for clipping and
    /// culling after reprojection.
    extent: Option<BBox>,
    coordinate_transform: Option<Arc<dyn CoordinateTransform>>,
    /// Pixels per millimetre.
    scale_factor: f64,
    /// Map scale denominator.
    renderer_scale: f64,
    selection_color: Color,
    expression_engine: Option<Arc<dyn ExpressionEngine>>,
    expression_scopes: Vec<ExpressionContextScope>,
}

impl RenderContext {
    pub fn new(map_to_pixel: MapToPixel) -> Self {
        let extent = (!map_to_pixel.is_identity() && map_to_pixel.has_canvas_size())
            .then(|| map_to_pixel.visible_extent());
        Self {
            map_to_pixel,
            extent,
            coordinate_transform: None,
            scale_factor: DEFAULT_SCALE_FACTOR,
            renderer_scale: map_to_pixel.map_units_per_pixel() * DEFAULT_SCALE_FACTOR * 1000.0,
            selection_color: Color::SELECTION,
            expression_engine: None,
            expression_scopes: Vec::new(),
        }
    }

    /// Context for drawing straight in device pixels, e.g. symbol previews.
    pub fn for_device() -> Self {
        Self::new(MapToPixel::identity())
    }

    pub fn with_extent(mut self, extent: Option<BBox>) -> Self {
        self.extent = extent;
        self
    }

    pub fn with_coordinate_transform(mut self, ct: Arc<dyn CoordinateTransform>) -> Self {
        self.coordinate_transform = Some(ct);
        self
    }

    pub fn with_scale_factor(mut self, pixels_per_mm: f64) -> Self {
        self.scale_factor = pixels_per_mm;
        self
    }

    pub fn with_renderer_scale(mut self, scale: f64) -> Self {
        self.renderer_scale = scale;
        self
    }

    pub fn with_selection_color(mut self, color: Color) -> Self {
        self.selection_color = color;
        self
    }

    pub fn with_expression_engine(mut self, engine: Arc<dyn ExpressionEngine>) -> Self {
        self.expression_engine = Some(engine);
        self
    }

    pub fn with_expression_scope(mut self, scope: ExpressionContextScope) -> Self {
        self.expression_scopes.push(scope);
        self
    }

    pub fn map_to_pixel(&self) -> &MapToPixel {
        &self.map_to_pixel
    }

    pub fn extent(&self) -> Option<&BBox> {
        self.extent.as_ref()
    }

    /// The configured transform, if any and valid.
    pub fn coordinate_transform(&self) -> Option<&dyn CoordinateTransform> {
        self.coordinate_transform
            .as_deref()
            .filter(|ct| ct.is_valid())
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn renderer_scale(&self) -> f64 {
        self.renderer_scale
    }

    pub fn selection_color(&self) -> Color {
        self.selection_color
    }

    pub fn expression_engine(&self) -> Option<&dyn ExpressionEngine> {
        self.expression_engine.as_deref()
    }

    pub fn expression_scopes(&self) -> &[ExpressionContextScope] {
        &self.expression_scopes
    }

    /// Convert `size` expressed in `unit` to painter pixels.
    pub fn convert_to_painter_units(&self, size: f64, unit: RenderUnit, scale: &MapUnitScale) -> f64 {
        let factor = match unit {
            RenderUnit::Millimeters => self.scale_factor,
            RenderUnit::Points => self.scale_factor * POINTS_TO_MM,
            RenderUnit::Inches => self.scale_factor * INCH_TO_MM,
            RenderUnit::MapUnits => {
                let mup = scale.compute_map_units_per_pixel(
                    self.map_to_pixel.map_units_per_pixel(),
                    self.renderer_scale,
                );
                if mup > 0.0 {
                    1.0 / mup
                } else {
                    1.0
                }
            }
            RenderUnit::Pixels | RenderUnit::Percentage | RenderUnit::Unknown => 1.0,
        };
        let mut converted = size * factor;
        if unit == RenderUnit::MapUnits {
            if let Some(min_mm) = scale.min_size_mm {
                converted = converted.max(min_mm * self.scale_factor);
            }
            if let Some(max_mm) = scale.max_size_mm {
                converted = converted.min(max_mm * self.scale_factor);
            }
        }
        converted
    }
}
