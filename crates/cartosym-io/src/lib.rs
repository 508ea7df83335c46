//! # Cartosym I/O
//!
//! Exporting symbol previews: an SVG canvas and raster image output in the
//! formats the `image` crate is built with.

pub mod svg;
pub mod export;

pub use export::{export_image, ExportError, SUPPORTED_FORMATS};
pub use svg::SvgCanvas;
