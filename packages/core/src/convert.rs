//! Media conversion: normalizes uploaded image bytes into a display-ready
//! blob, or fails with a structured error the caller can surface.
//!
//! The converter is an injected capability so batch import can be tested
//! without real codecs and so a HEIC-capable converter can be slotted in
//! behind the same trait.

use std::io::Cursor;

use crate::timeline::ImageBlob;
use crate::{FlipbookError, FlipbookResult};

/// Input bytes + declared file name in, display-ready blob out.
pub trait ImageConverter {
    fn convert(&self, bytes: &[u8], name: &str) -> FlipbookResult<ImageBlob>;
}

/// ISO-BMFF brands used by HEIC/HEIF containers.
const HEIF_BRANDS: [&[u8; 4]; 8] = [
    b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1",
];

/// True when the bytes or the file name identify a HEIC/HEIF container.
fn is_heif(bytes: &[u8], name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".heic") || lower.ends_with(".heif") {
        return true;
    }
    bytes.len() >= 12
        && &bytes[4..8] == b"ftyp"
        && HEIF_BRANDS.iter().any(|brand| &bytes[8..12] == *brand)
}

/// Converter backed by the `image` crate.
///
/// Browser-safe raster formats (PNG/JPEG/GIF/WebP/BMP) are validated by a
/// full decode and passed through unchanged; anything else that decodes is
/// transcoded to PNG. HEIC input is recognized but not decodable here and
/// yields `UnsupportedEncoding` with guidance for the user.
#[derive(Debug, Default)]
pub struct RasterConverter;

impl RasterConverter {
    pub fn new() -> Self {
        Self
    }
}

impl ImageConverter for RasterConverter {
    fn convert(&self, bytes: &[u8], name: &str) -> FlipbookResult<ImageBlob> {
        if is_heif(bytes, name) {
            return Err(FlipbookError::UnsupportedEncoding(format!(
                "{name}: HEIC/HEIF needs conversion to JPEG or PNG before import"
            )));
        }

        let format = image::guess_format(bytes).map_err(|_| {
            FlipbookError::UnsupportedEncoding(format!("{name}: unrecognized image format"))
        })?;

        let decoded = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| FlipbookError::ConversionFailed(format!("{name}: {e}")))?;

        use image::ImageFormat::*;
        match format {
            Png | Jpeg | Gif | WebP | Bmp => {
                Ok(ImageBlob::new(bytes.to_vec(), format.to_mime_type()))
            }
            _ => {
                tracing::debug!(name, ?format, "transcoding to png");
                let mut out = Cursor::new(Vec::new());
                decoded
                    .write_to(&mut out, Png)
                    .map_err(|e| FlipbookError::ConversionFailed(format!("{name}: {e}")))?;
                Ok(ImageBlob::new(out.into_inner(), "image/png"))
            }
        }
    }
}
