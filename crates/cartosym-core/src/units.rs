use serde::{Deserialize, Serialize};

/// Millimetres per typographic point.
pub const POINTS_TO_MM: f64 = 1.0 / 2.834_645_67;
/// Millimetres per inch.
pub const INCH_TO_MM: f64 = 25.4;

/// Units in which symbol sizes, widths and offsets are expressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderUnit {
    #[default]
    Millimeters,
    MapUnits,
    Pixels,
    Percentage,
    Points,
    Inches,
    /// Unknown, or mixed across the layers of a symbol.
    Unknown,
}

impl RenderUnit {
    pub fn name(&self) -> &'static str {
        match self {
            RenderUnit::Millimeters => "MM",
            RenderUnit::MapUnits => "MapUnit",
            RenderUnit::Pixels => "Pixel",
            RenderUnit::Percentage => "Percentage",
            RenderUnit::Points => "Point",
            RenderUnit::Inches => "Inch",
            RenderUnit::Unknown => "Unknown",
        }
    }

    /// Fold a sequence of units into their common value, or `Unknown` if they disagree.
    pub fn common<I: IntoIterator<Item = RenderUnit>>(units: I) -> RenderUnit {
        let mut iter = units.into_iter();
        let Some(first) = iter.next() else {
            return RenderUnit::Unknown;
        };
        if iter.all(|u| u == first) {
            first
        } else {
            RenderUnit::Unknown
        }
    }
}

/// Limits applied to map-unit sizes as the map scale changes.
///
/// `min_scale` and `max_scale` are scale denominators (0 = unbounded). Past
/// them the effective map-units-per-pixel is held at the value it has at the
/// limit, so sizes stop growing or shrinking. The optional millimetre bounds
/// clamp the final painter size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MapUnitScale {
    pub min_scale: f64,
    pub max_scale: f64,
    pub min_size_mm: Option<f64>,
    pub max_size_mm: Option<f64>,
}

impl MapUnitScale {
    pub fn new(min_scale: f64, max_scale: f64) -> Self {
        Self {
            min_scale,
            max_scale,
            min_size_mm: None,
            max_size_mm: None,
        }
    }

    pub fn with_size_limits_mm(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_size_mm = min;
        self.max_size_mm = max;
        self
    }

    /// Effective map units per pixel for the given raw value and renderer scale.
    pub fn compute_map_units_per_pixel(&self, map_units_per_pixel: f64, renderer_scale: f64) -> f64 {
        let mut mup = map_units_per_pixel;
        if renderer_scale <= 0.0 {
            return mup;
        }
        if self.min_scale > 0.0 {
            mup = mup.min(map_units_per_pixel * self.min_scale / renderer_scale);
        }
        if self.max_scale > 0.0 {
            mup = mup.max(map_units_per_pixel * self.max_scale / renderer_scale);
        }
        mup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_unit() {
        assert_eq!(
            RenderUnit::common([RenderUnit::Pixels, RenderUnit::Pixels]),
            RenderUnit::Pixels
        );
        assert_eq!(
            RenderUnit::common([RenderUnit::Pixels, RenderUnit::Millimeters]),
            RenderUnit::Unknown
        );
        assert_eq!(RenderUnit::common([]), RenderUnit::Unknown);
    }

    #[test]
    fn test_unbounded_scale_is_passthrough() {
        let s = MapUnitScale::default();
        assert!((s.compute_map_units_per_pixel(2.0, 5000.0) - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_min_scale_holds_size_when_zoomed_out() {
        // Rendering at 1:20000 with a 1:10000 limit behaves like 1:10000.
        let s = MapUnitScale::new(10_000.0, 0.0);
        let mup = s.compute_map_units_per_pixel(4.0, 20_000.0);
        assert!((mup - 2.0).abs() < 1e-10);
        // Inside the window nothing changes.
        assert!((s.compute_map_units_per_pixel(1.0, 5_000.0) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_max_scale_caps_size_when_zoomed_in() {
        let s = MapUnitScale::new(0.0, 1_000.0);
        let mup = s.compute_map_units_per_pixel(0.1, 500.0);
        assert!((mup - 0.2).abs() < 1e-10);
    }
}
