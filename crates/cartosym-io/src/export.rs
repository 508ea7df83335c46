//! Writing symbol preview images to disk.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use cartosym_render::Symbol;
use image::{DynamicImage, ImageFormat};
use thiserror::Error;

use crate::svg::SvgCanvas;

// ── Errors ────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unsupported export format '{0}'")]
    UnsupportedFormat(String),
}

// ── Export ────────────────────────────────────────────────────────────

/// Formats accepted by [`export_image`], by file extension.
pub const SUPPORTED_FORMATS: &[&str] = &["svg", "png", "jpg", "jpeg"];

/// Render the symbol's preview icon at `width` x `height` pixels and write it
/// to `path`. `format` is a file extension such as `"svg"` or `"png"`; case is
/// ignored.
pub fn export_image(
    symbol: &mut Symbol,
    path: impl AsRef<Path>,
    format: &str,
    width: u32,
    height: u32,
) -> Result<(), ExportError> {
    let path = path.as_ref();
    let format = format.to_ascii_lowercase();
    match format.as_str() {
        "svg" => {
            let mut canvas = SvgCanvas::new(width as f64, height as f64);
            symbol.draw_preview_icon(&mut canvas, width as f64, height as f64, None);
            canvas.write_to(BufWriter::new(File::create(path)?))?;
        }
        other => {
            let image_format = match ImageFormat::from_extension(other) {
                Some(f @ (ImageFormat::Png | ImageFormat::Jpeg)) => f,
                _ => return Err(ExportError::UnsupportedFormat(other.to_string())),
            };
            let image = symbol.as_image(width, height);
            if image_format == ImageFormat::Jpeg {
                // JPEG has no alpha channel
                DynamicImage::ImageRgba8(image)
                    .into_rgb8()
                    .save_with_format(path, image_format)?;
            } else {
                image.save_with_format(path, image_format)?;
            }
        }
    }
    log::info!(
        "Exported {:?} symbol preview ({}x{}) to {}",
        symbol.symbol_type(),
        width,
        height,
        path.display()
    );
    Ok(())
}
