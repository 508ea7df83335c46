//! Symbol previews for pickers and legends. Preview failures are logged and
//! leave the image as far as it got.

use cartosym_core::feature::Fields;
use cartosym_core::geometry::Point;
use cartosym_core::Color;
use image::RgbaImage;

use crate::canvas::{Canvas, Stroke};
use crate::context::RenderContext;
use crate::raster::RasterCanvas;

use super::{LayerSelection, Symbol, SymbolType};

/// Edge length of [`Symbol::big_symbol_preview_image`].
pub const BIG_PREVIEW_SIZE: u32 = 100;

const CROSSHAIR_COLOR: Color = Color::rgb(160, 160, 164);

impl Symbol {
    /// Paint every enabled layer's preview into a `width` x `height` box at
    /// the canvas origin. Without a context the preview is drawn in device
    /// pixels at 96 dpi.
    pub fn draw_preview_icon(
        &mut self,
        canvas: &mut dyn Canvas,
        width: f64,
        height: f64,
        context: Option<&RenderContext>,
    ) {
        let device;
        let context = match context {
            Some(context) => context,
            None => {
                device = RenderContext::for_device();
                &device
            }
        };
        let fields = Fields::new();
        let mut session = self.start_render(context, canvas, &fields);
        session.paint_preview_icon(width, height);
    }

    /// The preview icon rendered to a transparent image.
    pub fn as_image(&mut self, width: u32, height: u32) -> RgbaImage {
        let mut canvas = RasterCanvas::new(width, height);
        self.draw_preview_icon(&mut canvas, width as f64, height as f64, None);
        canvas.into_image()
    }

    /// A 100 x 100 sample: a marker over a crosshair, a horizontal line, or a
    /// filled square.
    pub fn big_symbol_preview_image(&mut self) -> RgbaImage {
        let mut canvas = RasterCanvas::new(BIG_PREVIEW_SIZE, BIG_PREVIEW_SIZE);
        let context = RenderContext::for_device();
        let fields = Fields::new();
        let size = BIG_PREVIEW_SIZE as f64;
        let mid = size / 2.0;
        let symbol_type = self.symbol_type;

        let mut session = self.start_render(&context, &mut canvas, &fields);
        let result = match symbol_type {
            SymbolType::Marker => {
                let pen = Stroke::new(CROSSHAIR_COLOR, 1.0);
                let canvas = session.canvas();
                canvas.draw_polyline(&[Point::new(0.0, mid), Point::new(size, mid)], &pen);
                canvas.draw_polyline(&[Point::new(mid, 0.0), Point::new(mid, size)], &pen);
                session.render_point(Point::new(mid, mid), None, LayerSelection::All, false)
            }
            SymbolType::Line => session.render_polyline(
                &[Point::new(0.0, mid), Point::new(size - 1.0, mid)],
                None,
                LayerSelection::All,
                false,
            ),
            SymbolType::Fill => {
                let square = [
                    Point::new(20.0, 20.0),
                    Point::new(80.0, 20.0),
                    Point::new(80.0, 80.0),
                    Point::new(20.0, 80.0),
                    Point::new(20.0, 20.0),
                ];
                session.render_polygon(&square, None, None, LayerSelection::All, false)
            }
            SymbolType::Hybrid => Ok(()),
        };
        if let Err(e) = result {
            log::warn!("Symbol preview incomplete: {}", e);
        }
        session.stop_render();
        canvas.into_image()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::SimpleLineLayer;
    use crate::recording::{DrawCommand, RecordingCanvas};

    #[test]
    fn test_marker_preview_is_centered() {
        let mut symbol = Symbol::default_marker();
        let mut canvas = RecordingCanvas::new();
        symbol.draw_preview_icon(&mut canvas, 16.0, 10.0, None);
        assert_eq!(canvas.len(), 1);
        match &canvas.commands()[0] {
            DrawCommand::Marker(glyph) => assert_eq!(glyph.center, Point::new(8.0, 5.0)),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_fill_preview_covers_icon() {
        let mut symbol = Symbol::default_fill();
        let image = symbol.as_image(16, 16);
        assert_eq!(image.dimensions(), (16, 16));
        assert_eq!(image.get_pixel(8, 8)[3], 255);
    }

    #[test]
    fn test_line_layer_outlines_fill_preview() {
        let mut symbol = Symbol::fill(vec![Box::new(SimpleLineLayer::default())]);
        let image = symbol.as_image(20, 20);
        assert_eq!(image.get_pixel(10, 10)[3], 0);
        assert!(image.get_pixel(0, 10)[3] > 0);
    }

    #[test]
    fn test_big_marker_preview_has_crosshair() {
        let mut symbol = Symbol::default_marker();
        let image = symbol.big_symbol_preview_image();
        assert_eq!(image.dimensions(), (BIG_PREVIEW_SIZE, BIG_PREVIEW_SIZE));
        // The one pixel crosshair straddles columns 49 and 50 when antialiased.
        let near = |px: &image::Rgba<u8>, rgb: [u8; 3]| {
            (0..3).all(|i| (px[i] as i16 - rgb[i] as i16).abs() <= 2)
        };
        let gray = image.get_pixel(50, 5);
        assert!(gray[3] > 0);
        assert!(near(gray, [160, 160, 164]), "{:?}", gray);
        let center = image.get_pixel(50, 50);
        assert!(near(center, [255, 0, 0]), "{:?}", center);
    }

    #[test]
    fn test_big_line_and_fill_previews() {
        let image = Symbol::default_line().big_symbol_preview_image();
        assert!((48..=51).any(|y| image.get_pixel(10, y)[3] > 0));
        assert_eq!(image.get_pixel(10, 10)[3], 0);

        let image = Symbol::default_fill().big_symbol_preview_image();
        assert_eq!(image.get_pixel(50, 50)[3], 255);
        assert_eq!(image.get_pixel(5, 5)[3], 0);
    }
}
