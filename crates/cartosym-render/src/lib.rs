//! # Cartosym Renderer
//!
//! Symbol rendering engine. A [`Symbol`] stacks symbol layers that paint
//! points, lines or polygons onto a [`Canvas`]. Rendering happens inside a
//! [`RenderSession`], which projects map geometry to device pixels, clips it to
//! the visible extent and evaluates data-defined overrides per feature.
//!
//! The canvas, coordinate transform and expression engine are capabilities
//! supplied by the caller. A recording canvas and a raster canvas are
//! included.

pub mod map_to_pixel;
pub mod error;
pub mod context;
pub mod canvas;
pub mod recording;
pub mod raster;
pub mod projector;
pub mod layer;
pub mod symbol;
pub mod style;
pub mod renderer;

#[cfg(test)]
mod test_support;

pub use canvas::{Canvas, MarkerGlyph, MarkerShape, NullCanvas, Stroke};
pub use context::{CoordinateTransform, RenderContext};
pub use error::{SymbolError, TransformError};
pub use layer::{SimpleFillLayer, SimpleLineLayer, SimpleMarkerLayer, SymbolLayer};
pub use map_to_pixel::MapToPixel;
pub use raster::RasterCanvas;
pub use recording::{DrawCommand, RecordingCanvas};
pub use renderer::SingleSymbolRenderer;
pub use style::{StyleDocument, StyleWriter};
pub use symbol::{
    FeatureRenderOptions, LayerSelection, RenderSession, Symbol, SymbolRenderContext, SymbolType,
};
