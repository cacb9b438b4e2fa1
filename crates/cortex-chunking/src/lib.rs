//! Token-window chunking, split by whitespace.
//!
//! `chunk_text` is the default, uniform splitter used for plain
//! extracted text. `chunk_elements` is the alternate, opt-in splitter
//! used by the structured extractor, which accumulates whole elements
//! (paragraphs, table rows, list items) instead of slicing blindly
//! through raw text.

/// Clamp an overlap that is too large relative to its chunk size down to
/// `size / 4`, matching the reference clamp rule.
fn clamp_overlap(size: usize, overlap: usize) -> usize {
    if overlap >= size {
        size / 4
    } else {
        overlap
    }
}

/// Split `text` by whitespace tokens into sliding windows of `size`
/// tokens stepping by `size - overlap`. Deterministic and pure. Empty
/// input yields the empty list.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    assert!(chunk_size > 0, "chunk_size must be greater than zero");
    let overlap = clamp_overlap(chunk_size, chunk_overlap);

    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut i = 0usize;
    loop {
        let end = (i + chunk_size).min(tokens.len());
        chunks.push(tokens[i..end].join(" "));
        if i + chunk_size >= tokens.len() {
            break;
        }
        i += step;
    }
    chunks
}

/// Split a single oversized element the same way `chunk_text` would, for
/// use inside `chunk_elements` when one element alone exceeds `chunk_size`.
fn split_oversized(element: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    chunk_text(element, chunk_size, overlap)
}

/// Structured-extraction chunking: accumulate whole elements until the
/// running token count would exceed `chunk_size`, then emit a chunk and
/// seed the next one with the last `overlap` tokens of the one just
/// emitted. An element larger than `chunk_size` on its own is split with
/// the ordinary sliding-window rule first.
pub fn chunk_elements(elements: &[String], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    assert!(chunk_size > 0, "chunk_size must be greater than zero");
    let overlap = clamp_overlap(chunk_size, chunk_overlap);

    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;

    let mut flush = |current: &mut Vec<String>, current_len: &mut usize, chunks: &mut Vec<String>| {
        if !current.is_empty() {
            chunks.push(current.join(" "));
            let joined = current.join(" ");
            let tail: Vec<&str> = joined.split_whitespace().rev().take(overlap).collect();
            let tail: Vec<String> = tail.into_iter().rev().map(|s| s.to_string()).collect();
            *current_len = tail.len();
            *current = tail;
        }
    };

    for element in elements {
        let element_tokens: Vec<&str> = element.split_whitespace().collect();
        if element_tokens.len() > chunk_size {
            flush(&mut current, &mut current_len, &mut chunks);
            for piece in split_oversized(element, chunk_size, overlap) {
                chunks.push(piece);
            }
            current.clear();
            current_len = 0;
            continue;
        }

        if current_len + element_tokens.len() > chunk_size && !current.is_empty() {
            flush(&mut current, &mut current_len, &mut chunks);
        }

        current_len += element_tokens.len();
        current.push(element.clone());
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", 10, 2).is_empty());
        assert!(chunk_text("   ", 10, 2).is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("the quick brown fox", 10, 2);
        assert_eq!(chunks, vec!["the quick brown fox"]);
    }

    #[test]
    fn sliding_window_overlaps() {
        let text = "a b c d e f g h i j";
        let chunks = chunk_text(text, 4, 2);
        assert_eq!(chunks[0], "a b c d");
        assert_eq!(chunks[1], "c d e f");
        assert!(chunks.last().unwrap().ends_with('j'));
    }

    #[test]
    fn overlap_too_large_is_clamped() {
        let text = "a b c d e f g h";
        let clamped_chunks = chunk_text(text, 4, 4);
        let expected_overlap_chunks = chunk_text(text, 4, 1);
        assert_eq!(clamped_chunks, expected_overlap_chunks);
    }

    #[test]
    fn concatenation_reconstructs_text_modulo_whitespace() {
        let text = "one two three four five six seven";
        let chunks = chunk_text(text, 3, 0);
        let rebuilt = chunks.join(" ");
        assert_eq!(rebuilt.split_whitespace().collect::<Vec<_>>(), text.split_whitespace().collect::<Vec<_>>());
    }

    #[test]
    fn chunk_elements_accumulates_until_overflow() {
        let elements = vec!["one two".to_string(), "three four".to_string(), "five six".to_string()];
        let chunks = chunk_elements(&elements, 4, 0);
        assert_eq!(chunks[0], "one two three four");
        assert_eq!(chunks[1], "five six");
    }

    #[test]
    fn chunk_elements_splits_oversized_element() {
        let elements = vec!["a b c d e f g h".to_string()];
        let chunks = chunk_elements(&elements, 3, 0);
        assert!(chunks.len() > 1);
    }
}
