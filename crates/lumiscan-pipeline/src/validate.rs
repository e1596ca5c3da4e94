//! Entry validation: reject unusable images before anything else happens.
//!
//! Runs strictly before the pre-call persistence hook and before any
//! network call, so a too-small or unreadable photo costs nothing and
//! leaves no record.

use std::io::Cursor;

use lumiscan_types::{ClassifiedError, ErrorKind, PipelineConfig};

/// Decoded pixel dimensions of an accepted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDims {
    pub width: u32,
    pub height: u32,
}

/// Check that `image` decodes and meets the minimum dimensions.
///
/// Only the header is read; the pixel data is not decoded.
pub fn validate_image(
    image: &[u8],
    config: &PipelineConfig,
) -> Result<ImageDims, ClassifiedError> {
    if image.is_empty() {
        return Err(ClassifiedError::from_kind(ErrorKind::InvalidImage)
            .with_raw("empty image payload"));
    }

    let reader = image::ImageReader::new(Cursor::new(image))
        .with_guessed_format()
        .map_err(|e| {
            ClassifiedError::from_kind(ErrorKind::InvalidImage)
                .with_raw(format!("unreadable image: {e}"))
        })?;
    let (width, height) = reader.into_dimensions().map_err(|e| {
        ClassifiedError::from_kind(ErrorKind::InvalidImage)
            .with_raw(format!("image decode failed: {e}"))
    })?;

    if width < config.min_image_width || height < config.min_image_height {
        return Err(ClassifiedError::from_kind(ErrorKind::ImageTooSmall).with_raw(format!(
            "{width}x{height} below minimum {}x{}",
            config.min_image_width, config.min_image_height
        )));
    }

    Ok(ImageDims { width, height })
}
