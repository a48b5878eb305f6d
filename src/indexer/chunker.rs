use crate::models::Chunk;

/// Rounds a byte position up to the next char boundary.
fn ceil_char_boundary(text: &str, byte_pos: usize) -> usize {
    if byte_pos >= text.len() {
        return text.len();
    }
    let mut pos = byte_pos;
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}

/// Rounds a byte position down to the previous char boundary.
fn floor_char_boundary(text: &str, byte_pos: usize) -> usize {
    if byte_pos >= text.len() {
        return text.len();
    }
    let mut pos = byte_pos;
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Splits one page into chunks of at most `max_chunk_size` bytes with `overlap`
/// bytes carried between neighbours. Every chunk keeps the page's index.
pub fn split_page(
    text: &str,
    source_file: &str,
    page_index: usize,
    max_chunk_size: usize,
    overlap: usize,
) -> Vec<Chunk> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let make = |text: &str| Chunk {
        text: text.to_string(),
        source_file: source_file.to_string(),
        page_index,
    };

    if max_chunk_size == 0 || text.len() <= max_chunk_size {
        return vec![make(text)];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = floor_char_boundary(text, (start + max_chunk_size).min(text.len()));
        if end <= start {
            end = ceil_char_boundary(text, start + 1);
        }

        let actual_end = if end < text.len() {
            find_break_point(text, start, end)
        } else {
            end
        };

        let piece = text[start..actual_end].trim();
        if !piece.is_empty() {
            chunks.push(make(piece));
        }

        if actual_end >= text.len() {
            break;
        }

        let next_start = if actual_end > overlap {
            floor_char_boundary(text, actual_end - overlap)
        } else {
            actual_end
        };

        start = if next_start <= start { actual_end } else { next_start };
    }

    chunks
}

fn find_break_point(text: &str, start: usize, max_end: usize) -> usize {
    let segment = &text[start..max_end];

    if let Some(pos) = segment.rfind("\n\n") {
        return start + pos + 2;
    }
    if let Some(pos) = segment.rfind('\n') {
        return start + pos + 1;
    }
    for sentinel in [". ", "? ", "! ", "; "] {
        if let Some(pos) = segment.rfind(sentinel) {
            return start + pos + sentinel.len();
        }
    }
    if let Some(pos) = segment.rfind(' ') {
        return start + pos + 1;
    }
    max_end
}
