use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use thiserror::Error;
use tracing::debug;

/// JPEG qualities tried in order: least compression first.
pub const QUALITY_LADDER: [u8; 5] = [100, 75, 50, 25, 1];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("could not decode image: {0}")]
    Undecodable(String),
    #[error("image is {smallest} bytes at the lowest quality, limit is {limit}")]
    TooLarge { smallest: usize, limit: usize },
}

/// A JPEG ready for upload plus the quality it was encoded at
/// (`None` when the original bytes were passed through).
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub jpeg: Bytes,
    pub quality: Option<u8>,
}

fn is_jpeg(raw: &[u8]) -> bool {
    raw.starts_with(&[0xFF, 0xD8, 0xFF])
}

/// Upload content type to file-extension style name, for logging.
pub fn format_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Produces a JPEG no larger than `limit` bytes.
///
/// A JPEG that already fits is sent as is. Anything else is decoded and
/// re-encoded down [`QUALITY_LADDER`] until it fits.
pub fn prepare_jpeg(raw: &[u8], limit: usize) -> Result<PreparedImage, ImageError> {
    if is_jpeg(raw) && raw.len() <= limit {
        return Ok(PreparedImage {
            jpeg: Bytes::copy_from_slice(raw),
            quality: None,
        });
    }

    let img = image::load_from_memory(raw).map_err(|e| ImageError::Undecodable(e.to_string()))?;
    // JPEG has no alpha channel.
    let img = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut smallest = usize::MAX;
    for quality in QUALITY_LADDER {
        let encoded = encode(&img, quality)?;
        debug!(quality, bytes = encoded.len(), limit, "jpeg encoded");
        if encoded.len() <= limit {
            return Ok(PreparedImage {
                jpeg: Bytes::from(encoded),
                quality: Some(quality),
            });
        }
        smallest = smallest.min(encoded.len());
    }
    Err(ImageError::TooLarge { smallest, limit })
}

pub(crate) fn encode(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    img.write_with_encoder(encoder)
        .map_err(|e| ImageError::Undecodable(e.to_string()))?;
    Ok(buf.into_inner())
}
