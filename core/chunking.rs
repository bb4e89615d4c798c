use crate::error::{AppError, Result};
use byte_unit::Byte;
use log;
use std::str::FromStr;

/// One byte-bounded slice of the assembled stream. `continues_paragraph` is
/// true when the chunk starts mid-paragraph (its predecessor was split at a
/// sentence or byte boundary), which decides the separator on rejoin.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub text: String,
    pub continues_paragraph: bool,
}

/// Parses a human chunk size like "64KB" or "1MB" into bytes.
pub fn parse_chunk_size(chunk_size_str: &str) -> Result<usize> {
    let byte_value = Byte::from_str(chunk_size_str).map_err(|e| {
        AppError::Chunking(format!(
            "Invalid chunk size format '{}': {}. Use KB, MB, etc.",
            chunk_size_str, e
        ))
    })?;
    let bytes: u128 = byte_value.into();
    let bytes_usize = bytes.try_into().map_err(|_| {
        AppError::Chunking("Chunk size exceeds maximum usize value on this platform.".to_string())
    })?;
    if bytes_usize == 0 {
        return Err(AppError::Chunking(
            "Chunk size must be greater than 0 bytes".to_string(),
        ));
    }
    Ok(bytes_usize)
}

/// Splits `text` into chunks of at most `max_bytes`, never breaking inside a
/// paragraph when the paragraph fits, never inside a sentence when the
/// sentence fits, and at a UTF-8 char boundary otherwise. Pure segmentation:
/// `rejoin_chunks` reproduces the input verbatim.
pub fn split_text_into_chunks(text: &str, max_bytes: usize) -> Result<Vec<TextChunk>> {
    if max_bytes == 0 {
        return Err(AppError::Chunking(
            "Chunk size must be greater than 0 bytes".to_string(),
        ));
    }
    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Units either open a paragraph (rejoined with "\n\n") or continue one
    // (sentence/byte fragments that carry their own separators).
    struct Unit<'a> {
        text: &'a str,
        starts_paragraph: bool,
    }

    let mut units = Vec::<Unit>::new();
    for paragraph in text.split("\n\n") {
        if paragraph.len() <= max_bytes {
            units.push(Unit {
                text: paragraph,
                starts_paragraph: true,
            });
            continue;
        }
        let mut first = true;
        for sentence in split_sentences(paragraph) {
            if sentence.len() <= max_bytes {
                units.push(Unit {
                    text: sentence,
                    starts_paragraph: first,
                });
                first = false;
            } else {
                log::debug!(
                    "Sentence of {} bytes exceeds chunk size {}, slicing at char boundaries",
                    sentence.len(),
                    max_bytes
                );
                for slice in split_char_slices(sentence, max_bytes) {
                    units.push(Unit {
                        text: slice,
                        starts_paragraph: first,
                    });
                    first = false;
                }
            }
        }
    }

    // The separator owed before each unit is fixed by its stream position,
    // never by how the chunks happen to fall. A chunk boundary placed at a
    // paragraph break consumes exactly one owed separator (the next chunk's
    // `continues_paragraph` stays false and rejoin restores it); every other
    // separator is written into the chunk text itself. Empty paragraph units
    // (separator runs, trailing separators) therefore survive verbatim.
    let mut chunks = Vec::<TextChunk>::new();
    let mut current = String::new();
    let mut current_continues = false;
    // Set when a flush consumed a separator but no text followed, so the
    // chunk in progress must be emitted even while empty.
    let mut final_chunk_owed = false;
    let mut first = true;
    for unit in units {
        let separator = if unit.starts_paragraph && !first {
            "\n\n"
        } else {
            ""
        };
        first = false;
        let fits = current.len() + separator.len() + unit.text.len() <= max_bytes;
        if fits || (current.is_empty() && separator.is_empty()) {
            // The second arm lets an indivisible oversized slice start its
            // own chunk instead of flushing an empty one.
            current.push_str(separator);
            current.push_str(unit.text);
            continue;
        }
        chunks.push(TextChunk {
            text: std::mem::take(&mut current),
            continues_paragraph: current_continues,
        });
        current_continues = separator.is_empty();
        final_chunk_owed = !separator.is_empty();
        current.push_str(unit.text);
    }
    if !current.is_empty() || chunks.is_empty() || final_chunk_owed {
        chunks.push(TextChunk {
            text: current,
            continues_paragraph: current_continues,
        });
    }

    log::info!("Split stream into {} chunks.", chunks.len());
    Ok(chunks)
}

/// Inverse of `split_text_into_chunks`.
pub fn rejoin_chunks(chunks: &[TextChunk]) -> String {
    let mut out = String::new();
    for (idx, chunk) in chunks.iter().enumerate() {
        if idx > 0 && !chunk.continues_paragraph {
            out.push_str("\n\n");
        }
        out.push_str(&chunk.text);
    }
    out
}

/// Splits a paragraph at sentence boundaries (terminal `.`, `!` or `?`
/// followed by whitespace). Each sentence keeps its trailing whitespace so
/// their concatenation reproduces the paragraph.
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let bytes = paragraph.as_bytes();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if matches!(bytes[i], b'.' | b'!' | b'?') {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if j > i + 1 {
                sentences.push(&paragraph[start..j]);
                start = j;
                i = j;
                continue;
            }
        }
        i += 1;
    }
    if start < paragraph.len() {
        sentences.push(&paragraph[start..]);
    }
    sentences
}

/// Slices at the largest char boundary <= max_bytes. A single char wider than
/// the bound is emitted alone (the documented escape hatch).
fn split_char_slices(text: &str, max_bytes: usize) -> Vec<&str> {
    let mut slices = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let mut end = (start + max_bytes).min(text.len());
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            end = start
                + text[start..]
                    .chars()
                    .next()
                    .map_or(1, |c| c.len_utf8());
        }
        slices.push(&text[start..end]);
        start = end;
    }
    slices
}
