//! Drawing a batch of features with a single symbol.

use std::collections::{BTreeSet, HashSet};

use cartosym_core::feature::{Feature, FeatureId, Fields};
use cartosym_core::spatial::FeatureIndex;

use crate::canvas::Canvas;
use crate::context::RenderContext;
use crate::projector;
use crate::symbol::{FeatureRenderOptions, Symbol, VertexMarker};

/// Renders every feature of a batch with the same symbol, inside one session.
#[derive(Debug, Clone)]
pub struct SingleSymbolRenderer {
    symbol: Symbol,
    vertex_marker: Option<VertexMarker>,
}

impl SingleSymbolRenderer {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            vertex_marker: None,
        }
    }

    pub fn with_vertex_marker(mut self, marker: VertexMarker) -> Self {
        self.vertex_marker = Some(marker);
        self
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn symbol_mut(&mut self) -> &mut Symbol {
        &mut self.symbol
    }

    /// Replace the symbol, returning the previous one.
    pub fn set_symbol(&mut self, symbol: Symbol) -> Symbol {
        std::mem::replace(&mut self.symbol, symbol)
    }

    /// Fields the symbol reads, so callers can fetch only those.
    pub fn used_attributes(&self, context: &RenderContext) -> BTreeSet<String> {
        self.symbol.used_attributes(context)
    }

    /// Render the features whose bounds meet the visible extent, in batch
    /// order. Features in `selected` are drawn in the selection color.
    /// Returns how many features were handed to the symbol.
    pub fn render_features(
        &mut self,
        features: &[Feature],
        fields: &Fields,
        context: &RenderContext,
        canvas: &mut dyn Canvas,
        selected: &HashSet<FeatureId>,
    ) -> usize {
        // Cull in the map coordinate system against the same buffered
        // rectangle geometry is clipped to.
        let candidates: Vec<usize> = match projector::clip_rect(context) {
            Some(rect) => {
                let index = FeatureIndex::from_features_with(features, |bbox| {
                    projector::map_bounds(context, bbox)
                });
                let mut hits: Vec<usize> = index
                    .query_extent(&rect)
                    .into_iter()
                    .map(|entry| entry.feature_index)
                    .collect();
                hits.sort_unstable();
                hits
            }
            None => (0..features.len())
                .filter(|&i| features[i].geometry.is_some())
                .collect(),
        };
        log::debug!(
            "Rendering {} of {} features with a {:?} symbol",
            candidates.len(),
            features.len(),
            self.symbol.symbol_type()
        );

        let mut session = self.symbol.start_render(context, canvas, fields);
        let mut rendered = 0;
        for i in candidates {
            let feature = &features[i];
            let mut options = FeatureRenderOptions::new().with_selected(selected.contains(&feature.id));
            if let Some(marker) = self.vertex_marker {
                options = options.with_vertex_marker(marker);
            }
            match session.render_feature(feature, &options) {
                Ok(()) => rendered += 1,
                Err(e) => log::warn!("Feature {} not rendered: {}", feature.id, e),
            }
        }
        session.stop_render();
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CoordinateTransform;
    use crate::error::TransformError;
    use crate::map_to_pixel::MapToPixel;
    use crate::recording::{DrawCommand, RecordingCanvas};
    use crate::test_support::TestEngine;
    use cartosym_core::geometry::{Geometry, Point};
    use cartosym_core::property::{Property, PropertyKey};
    use cartosym_core::Color;
    use std::sync::Arc;

    fn point_feature(id: FeatureId, fields: &Fields, x: f64, y: f64) -> Feature {
        Feature::new(id, fields.clone()).with_geometry(Geometry::Point(Point::new(x, y)))
    }

    #[test]
    fn test_features_outside_extent_are_culled() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut renderer = SingleSymbolRenderer::new(Symbol::default_marker());
        let ctx = RenderContext::new(MapToPixel::new(1.0, 50.0, 50.0, 100.0, 100.0, 0.0));
        let fields = Fields::new();
        let features = vec![
            point_feature(1, &fields, 10.0, 10.0),
            point_feature(2, &fields, 500.0, 500.0),
            point_feature(3, &fields, 90.0, 20.0),
        ];
        let mut canvas = RecordingCanvas::new();
        let count = renderer.render_features(&features, &fields, &ctx, &mut canvas, &HashSet::new());
        assert_eq!(count, 2);
        assert_eq!(canvas.len(), 2);
        match (&canvas.commands()[0], &canvas.commands()[1]) {
            (DrawCommand::Marker(a), DrawCommand::Marker(b)) => assert!(a.center.x < b.center.x),
            other => panic!("unexpected commands {:?}", other),
        }
    }

    #[derive(Debug)]
    struct ShiftX(f64);

    impl CoordinateTransform for ShiftX {
        fn transform_point(&self, x: f64, y: f64, z: f64) -> Result<(f64, f64, f64), TransformError> {
            Ok((x + self.0, y, z))
        }
    }

    #[test]
    fn test_culling_uses_reprojected_bounds() {
        // The view covers map x 1000..1100; sources are shifted by +1000.
        let mut renderer = SingleSymbolRenderer::new(Symbol::default_line());
        let ctx = RenderContext::new(MapToPixel::new(1.0, 1050.0, 50.0, 100.0, 100.0, 0.0))
            .with_coordinate_transform(Arc::new(ShiftX(1000.0)));
        let fields = Fields::new();
        let features = vec![
            Feature::new(1, fields.clone()).with_geometry(Geometry::LineString(vec![
                Point::new(40.0, 50.0),
                Point::new(60.0, 50.0),
            ])),
            Feature::new(2, fields.clone()).with_geometry(Geometry::LineString(vec![
                Point::new(1040.0, 50.0),
                Point::new(1060.0, 50.0),
            ])),
        ];
        let mut canvas = RecordingCanvas::new();
        let count = renderer.render_features(&features, &fields, &ctx, &mut canvas, &HashSet::new());
        assert_eq!(count, 1);
        match canvas.commands() {
            [DrawCommand::Polyline { points, .. }] => {
                assert_eq!(points.len(), 2);
                assert!(points[0].distance_to(&Point::new(40.0, 50.0)) < 1e-9);
                assert!(points[1].distance_to(&Point::new(60.0, 50.0)) < 1e-9);
            }
            other => panic!("unexpected commands {:?}", other),
        }
    }

    #[test]
    fn test_features_in_clip_buffer_are_kept() {
        // Extent is 0..100; the clip buffer reaches out to -10..110.
        let mut renderer = SingleSymbolRenderer::new(Symbol::default_marker());
        let ctx = RenderContext::new(MapToPixel::new(1.0, 50.0, 50.0, 100.0, 100.0, 0.0));
        let fields = Fields::new();
        let features = vec![
            point_feature(1, &fields, 104.0, 50.0),
            point_feature(2, &fields, 130.0, 50.0),
        ];
        let mut canvas = RecordingCanvas::new();
        let count = renderer.render_features(&features, &fields, &ctx, &mut canvas, &HashSet::new());
        assert_eq!(count, 1);
        assert_eq!(canvas.len(), 1);
    }

    #[test]
    fn test_selected_ids_use_selection_color() {
        let mut renderer = SingleSymbolRenderer::new(Symbol::default_marker());
        let ctx = RenderContext::for_device().with_selection_color(Color::rgb(0, 255, 0));
        let fields = Fields::new();
        let features = vec![
            point_feature(1, &fields, 1.0, 1.0),
            point_feature(2, &fields, 2.0, 2.0),
            Feature::new(3, fields.clone()),
        ];
        let mut canvas = RecordingCanvas::new();
        let selected = HashSet::from([2]);
        let count = renderer.render_features(&features, &fields, &ctx, &mut canvas, &selected);
        assert_eq!(count, 2);
        assert_ne!(canvas.commands()[0].color(), Some(Color::rgb(0, 255, 0)));
        assert_eq!(canvas.commands()[1].color(), Some(Color::rgb(0, 255, 0)));
    }

    #[test]
    fn test_used_attributes_come_from_symbol() {
        let mut renderer = SingleSymbolRenderer::new(Symbol::default_line());
        renderer
            .symbol_mut()
            .symbol_layer_mut(0)
            .unwrap()
            .data_defined_properties_mut()
            .set_property(PropertyKey::Width, Some(Property::from_expression("\"lanes\" * 0.5")));
        let ctx = RenderContext::for_device().with_expression_engine(Arc::new(TestEngine));
        assert_eq!(
            renderer.used_attributes(&ctx),
            BTreeSet::from(["lanes".to_string()])
        );

        let previous = renderer.set_symbol(Symbol::default_fill());
        assert_eq!(previous.symbol_layer_count(), 1);
        assert!(renderer.used_attributes(&ctx).is_empty());
    }
}
