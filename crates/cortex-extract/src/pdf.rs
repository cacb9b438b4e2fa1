use cortex_core::CortexError;

/// Extract selectable text from a PDF, page by page, concatenated with
/// newlines. Pure CPU work; callers on an async runtime should run this
/// inside `tokio::task::spawn_blocking`.
pub fn extract_native_text(bytes: &[u8]) -> Result<String, CortexError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| CortexError::upstream(format!("pdf text extraction failed: {e}")))?;
    Ok(pages.join("\n"))
}

/// The structured extractor's unit of work: one string per layout
/// element (paragraph, table row, list item). `pdf-extract` does not
/// preserve layout, so this mode approximates elements as paragraphs
/// (text separated by blank lines) rather than true structural blocks —
/// enough to exercise the element-accumulation chunking algorithm
/// without pulling in a full layout-analysis dependency.
pub fn extract_structured_elements(bytes: &[u8]) -> Result<Vec<String>, CortexError> {
    let text = extract_native_text(bytes)?;
    let elements = text
        .split("\n\n")
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
        .collect();
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bytes_fail_gracefully() {
        assert!(extract_native_text(&[]).is_err());
    }
}
