//! Page rasterisation: turn each resolved input into RGB page bitmaps.
//!
//! PDFs are rendered through pdfium inside `spawn_blocking` (pdfium keeps
//! thread-local state and is CPU-bound); PNG/JPEG files are decoded with
//! the `image` crate. Every page comes out as an RGB bitmap whose longest
//! edge is capped at `max_rendered_pixels`.

use crate::error::MenuError;
use crate::pipeline::input::{InputKind, ResolvedInput};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// One page of menu, ready for encoding.
#[derive(Debug, Clone)]
pub struct MenuPage {
    /// 1-indexed position across all inputs, in upload order.
    pub page_num: usize,
    /// File name or URL the page came from.
    pub source: String,
    pub image: DynamicImage,
}

/// Rasterise every page of one resolved input.
///
/// Returns bitmaps in document order; numbering across inputs is the
/// caller's job.
pub async fn render_input(
    input: &ResolvedInput,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<Vec<DynamicImage>, MenuError> {
    let path = input.path().to_path_buf();
    let kind = input.kind();
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || match kind {
        InputKind::Pdf => render_pdf_blocking(&path, max_pixels, password.as_deref()),
        InputKind::Png | InputKind::Jpeg => decode_image_blocking(&path, max_pixels).map(|img| vec![img]),
    })
    .await
    .map_err(|e| MenuError::Internal(format!("Render task panicked: {}", e)))?
}

/// Bind pdfium from `PDFIUM_LIB_PATH` (a directory) or the system library.
fn bind_pdfium() -> Result<Pdfium, MenuError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(dir) if !dir.is_empty() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| MenuError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn render_pdf_blocking(
    pdf_path: &Path,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<Vec<DynamicImage>, MenuError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                MenuError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                MenuError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            MenuError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF {} loaded: {} pages", pdf_path.display(), total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(total_pages);

    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            MenuError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = DynamicImage::ImageRgb8(bitmap.as_image().to_rgb8());
        debug!(
            "Rendered PDF page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        results.push(image);
    }

    Ok(results)
}

fn decode_image_blocking(path: &Path, max_pixels: u32) -> Result<DynamicImage, MenuError> {
    let img = image::open(path).map_err(|e| MenuError::ImageDecodeFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let img = cap_longest_edge(img, max_pixels);
    debug!("Decoded image {} → {}x{} px", path.display(), img.width(), img.height());
    Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
}

/// Downscale so neither edge exceeds `max_pixels`; smaller images pass through.
pub fn cap_longest_edge(img: DynamicImage, max_pixels: u32) -> DynamicImage {
    if img.width() <= max_pixels && img.height() <= max_pixels {
        return img;
    }
    img.resize(max_pixels, max_pixels, image::imageops::FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn small_images_are_untouched() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, Rgb([1, 2, 3])));
        let out = cap_longest_edge(img, 100);
        assert_eq!((out.width(), out.height()), (40, 20));
    }

    #[test]
    fn large_images_keep_aspect_ratio() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 200, Rgb([1, 2, 3])));
        let out = cap_longest_edge(img, 100);
        assert_eq!((out.width(), out.height()), (100, 50));
    }

    #[tokio::test]
    async fn png_input_renders_one_rgb_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("menu.png");
        image::RgbaImage::from_pixel(8, 8, image::Rgba([0, 0, 0, 255]))
            .save(&path)
            .unwrap();

        let input = ResolvedInput::Local {
            path,
            kind: InputKind::Png,
        };
        let pages = render_input(&input, 2000, None).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert!(matches!(pages[0], DynamicImage::ImageRgb8(_)));
    }
}
