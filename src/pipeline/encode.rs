//! Image encoding: page bitmap → base64 PNG/JPEG wrapped in `ImageData`.
//!
//! Vision APIs accept images as base64 data embedded in the JSON body.
//! PNG is the default because printed prices and small descriptions lose
//! legibility under JPEG artefacts; JPEG is available for large photographed
//! menus where upload size dominates. `detail: "high"` lets GPT-4-class
//! models tile the full image instead of a single 512 px overview.

use crate::config::ImageEncoding;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a page bitmap for the vision request.
///
/// The image is flattened to RGB first: menus exported with transparency
/// would otherwise render text on black in some JPEG decoders.
pub fn encode_page(img: &DynamicImage, encoding: ImageEncoding) -> Result<ImageData, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();

    let mime = match encoding {
        ImageEncoding::Png => {
            rgb.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
            "image/png"
        }
        ImageEncoding::Jpeg { quality } => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            rgb.write_with_encoder(encoder)?;
            "image/jpeg"
        }
    };

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page image → {} bytes base64 ({})", b64.len(), mime);

    Ok(ImageData::new(b64, mime).with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn red_square() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn encode_png() {
        let data = encode_page(&red_square(), ImageEncoding::Png).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[..4], b"\x89PNG");
    }

    #[test]
    fn encode_jpeg() {
        let data = encode_page(&red_square(), ImageEncoding::Jpeg { quality: 85 })
            .expect("encode should succeed");
        assert_eq!(data.mime_type, "image/jpeg");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[..2], &[0xFF, 0xD8]);
    }
}
