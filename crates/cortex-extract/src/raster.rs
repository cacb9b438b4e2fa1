use cortex_core::CortexError;
use pdfium_render::prelude::*;

const RASTER_DPI: f32 = 150.0;

/// Rasterise every page of a PDF to a PNG-encoded image, for OCR fallback
/// when a PDF carries no selectable text. Pure CPU work; callers on an
/// async runtime should run this inside `tokio::task::spawn_blocking`.
///
/// Requires the system `pdfium` shared library to be resolvable at
/// runtime (bundled or provided by the deployment environment); a
/// missing library surfaces as an `UpstreamError` rather than a panic.
pub fn rasterize_pages(bytes: &[u8]) -> Result<Vec<Vec<u8>>, CortexError> {
    let pdfium = Pdfium::new(
        Pdfium::bind_to_system_library()
            .map_err(|e| CortexError::upstream(format!("pdfium library unavailable: {e}")))?,
    );

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| CortexError::upstream(format!("failed to load pdf for rasterization: {e}")))?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(RASTER_DPI / 72.0);

    let mut pages = Vec::new();
    for page in document.pages().iter() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| CortexError::upstream(format!("failed to render pdf page: {e}")))?;
        let image = bitmap
            .as_image()
            .into_rgb8();
        let mut png_bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
            .map_err(|e| CortexError::upstream(format!("failed to encode rasterized page: {e}")))?;
        pages.push(png_bytes);
    }

    Ok(pages)
}
