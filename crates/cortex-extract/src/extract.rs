use cortex_chunking::{chunk_elements, chunk_text};
use cortex_core::{CortexError, ExtractConfig};

use crate::docx;
use crate::pdf;
use crate::raster::rasterize_pages;
use crate::vision::VisionService;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// The generic fallback chunk used for any file field whose content does
/// not get dedicated extraction (§4.2.1) or whose extraction degraded
/// because no capable provider was configured (§4.4).
pub fn fallback_chunk(filename: &str) -> Vec<String> {
    vec![format!("File uploaded: {filename}")]
}

/// Dispatch a file-field upload through the extractor appropriate for
/// its content type, then chunk the result. Never fails on a missing
/// optional capability (no vision provider configured): that degrades
/// to `fallback_chunk` rather than propagating an error.
pub async fn extract_and_chunk(
    content_type: &str,
    filename: &str,
    bytes: &[u8],
    extract_config: Option<&ExtractConfig>,
    chunk_size: u32,
    chunk_overlap: u32,
    vision: Option<&dyn VisionService>,
) -> Result<Vec<String>, CortexError> {
    let chunk_size = chunk_size as usize;
    let chunk_overlap = chunk_overlap as usize;
    let structured = extract_config.map(|c| c.structured).unwrap_or(false);
    let ocr_if_needed = extract_config.map(|c| c.ocr_if_needed).unwrap_or(true);

    if content_type == "application/pdf" {
        return extract_pdf(bytes, structured, ocr_if_needed, chunk_size, chunk_overlap, vision).await;
    }

    if content_type == DOCX_MIME {
        return extract_docx(bytes, structured, chunk_size, chunk_overlap).await;
    }

    if content_type.starts_with("image/") {
        return extract_image(bytes, content_type, filename, structured, chunk_size, chunk_overlap, vision).await;
    }

    Ok(fallback_chunk(filename))
}

async fn extract_pdf(
    bytes: &[u8],
    structured: bool,
    ocr_if_needed: bool,
    chunk_size: usize,
    chunk_overlap: usize,
    vision: Option<&dyn VisionService>,
) -> Result<Vec<String>, CortexError> {
    let owned = bytes.to_vec();

    if structured {
        let owned_for_elements = owned.clone();
        let elements = tokio::task::spawn_blocking(move || pdf::extract_structured_elements(&owned_for_elements))
            .await
            .map_err(|e| CortexError::upstream(format!("pdf extraction task panicked: {e}")))??;

        if !elements.is_empty() {
            return Ok(chunk_elements(&elements, chunk_size, chunk_overlap));
        }

        let ocr_text = ocr_pdf_fallback(&owned, ocr_if_needed, vision).await?;
        return match ocr_text {
            Some(text) => Ok(chunk_elements(
                &text.split('\n').map(|s| s.to_string()).collect::<Vec<_>>(),
                chunk_size,
                chunk_overlap,
            )),
            None => Ok(fallback_chunk("document.pdf")),
        };
    }

    let text = tokio::task::spawn_blocking(move || pdf::extract_native_text(&owned))
        .await
        .map_err(|e| CortexError::upstream(format!("pdf extraction task panicked: {e}")))??;

    if !text.trim().is_empty() {
        return Ok(chunk_text(&text, chunk_size, chunk_overlap));
    }

    let ocr_text = ocr_pdf_fallback(bytes, ocr_if_needed, vision).await?;
    match ocr_text {
        Some(text) => Ok(chunk_text(&text, chunk_size, chunk_overlap)),
        None => Ok(fallback_chunk("document.pdf")),
    }
}

/// Rasterise every page and run OCR across them, concatenating results
/// with newlines. Returns `None` (degrade to generic fallback, not an
/// error) when no vision provider is configured or rasterization yields
/// nothing useful.
async fn ocr_pdf_fallback(
    bytes: &[u8],
    ocr_if_needed: bool,
    vision: Option<&dyn VisionService>,
) -> Result<Option<String>, CortexError> {
    if !ocr_if_needed {
        return Ok(None);
    }
    let Some(vision) = vision else {
        return Ok(None);
    };

    let owned = bytes.to_vec();
    let pages = tokio::task::spawn_blocking(move || rasterize_pages(&owned))
        .await
        .map_err(|e| CortexError::upstream(format!("pdf rasterization task panicked: {e}")))?;

    let pages = match pages {
        Ok(pages) => pages,
        Err(err) => {
            tracing::warn!(error = %err, "pdf rasterization failed, falling back to generic chunk");
            return Ok(None);
        }
    };

    let mut texts = Vec::with_capacity(pages.len());
    for page_png in pages {
        let text = vision.ocr_image(&page_png, "image/png").await?;
        texts.push(text);
    }
    Ok(Some(texts.join("\n")))
}

async fn extract_docx(
    bytes: &[u8],
    structured: bool,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<String>, CortexError> {
    let owned = bytes.to_vec();

    if structured {
        let elements = tokio::task::spawn_blocking(move || docx::extract_structured_elements(&owned))
            .await
            .map_err(|e| CortexError::upstream(format!("docx extraction task panicked: {e}")))??;
        return Ok(chunk_elements(&elements, chunk_size, chunk_overlap));
    }

    let text = tokio::task::spawn_blocking(move || docx::extract_native_text(&owned))
        .await
        .map_err(|e| CortexError::upstream(format!("docx extraction task panicked: {e}")))??;
    Ok(chunk_text(&text, chunk_size, chunk_overlap))
}

async fn extract_image(
    bytes: &[u8],
    content_type: &str,
    filename: &str,
    text_only: bool,
    chunk_size: usize,
    chunk_overlap: usize,
    vision: Option<&dyn VisionService>,
) -> Result<Vec<String>, CortexError> {
    let Some(vision) = vision else {
        return Ok(fallback_chunk(filename));
    };

    let text = if text_only {
        vision.ocr_image(bytes, content_type).await?
    } else {
        vision.describe_image(bytes, content_type).await?
    };

    Ok(chunk_text(&text, chunk_size, chunk_overlap))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unrecognized_content_type_falls_back_to_generic_chunk() {
        let chunks = extract_and_chunk("application/octet-stream", "data.bin", b"whatever", None, 500, 50, None)
            .await
            .unwrap();
        assert_eq!(chunks, vec!["File uploaded: data.bin".to_string()]);
    }

    #[tokio::test]
    async fn image_without_vision_provider_degrades_to_fallback() {
        let chunks = extract_and_chunk("image/png", "photo.png", b"not-really-png", None, 500, 50, None)
            .await
            .unwrap();
        assert_eq!(chunks, vec!["File uploaded: photo.png".to_string()]);
    }
}
