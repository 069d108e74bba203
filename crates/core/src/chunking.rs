use crate::error::IngestError;
use crate::models::IngestionOptions;
use std::collections::VecDeque;
use tracing::warn;

pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
    pub min_chars: usize,
}

impl From<IngestionOptions> for ChunkingConfig {
    fn from(value: IngestionOptions) -> Self {
        Self {
            max_chars: value.chunk_max_chars,
            overlap_chars: value.chunk_overlap_chars,
            min_chars: value.min_chunk_chars,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::from(IngestionOptions::default())
    }
}

impl ChunkingConfig {
    fn validate(&self) -> Result<(), IngestError> {
        if self.max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk size {}",
                self.overlap_chars, self.max_chars
            )));
        }
        Ok(())
    }
}

/// Collapses horizontal whitespace and blank-line runs while keeping
/// paragraph breaks. A whitespace run holding two or more newlines becomes a
/// single blank line; whatever surrounds the outermost newlines in that run
/// is kept and then squeezed like any other spaces or tabs.
pub fn normalize_text(text: &str) -> String {
    let mut paragraphs = String::with_capacity(text.len());
    let mut run = String::new();

    for ch in text.chars() {
        if ch.is_whitespace() {
            run.push(ch);
            continue;
        }
        flush_whitespace_run(&mut paragraphs, &run);
        run.clear();
        paragraphs.push(ch);
    }
    flush_whitespace_run(&mut paragraphs, &run);

    let mut squeezed = String::with_capacity(paragraphs.len());
    let mut in_blank = false;
    for ch in paragraphs.chars() {
        if ch == ' ' || ch == '\t' {
            if !in_blank {
                squeezed.push(' ');
            }
            in_blank = true;
        } else {
            squeezed.push(ch);
            in_blank = false;
        }
    }

    squeezed.trim().to_string()
}

fn flush_whitespace_run(target: &mut String, run: &str) {
    let first = run.find('\n');
    let last = run.rfind('\n');
    match (first, last) {
        (Some(first), Some(last)) if first != last => {
            target.push_str(&run[..first]);
            target.push_str("\n\n");
            target.push_str(&run[last + 1..]);
        }
        _ => target.push_str(run),
    }
}

/// Splits `text` into overlapping chunks of at most `max_chars` characters
/// where natural boundaries allow it, trying `separators` in order.
///
/// Pieces that are still too long after the last separator are emitted as-is.
pub fn split_text(
    text: &str,
    config: ChunkingConfig,
    separators: &[&str],
) -> Result<Vec<String>, IngestError> {
    config.validate()?;
    Ok(split_recursive(text, config, separators))
}

fn split_recursive(text: &str, config: ChunkingConfig, separators: &[&str]) -> Vec<String> {
    let mut separator = separators.last().copied().unwrap_or("");
    let mut remaining: &[&str] = &[];
    for (position, candidate) in separators.iter().copied().enumerate() {
        if candidate.is_empty() {
            separator = candidate;
            break;
        }
        if text.contains(candidate) {
            separator = candidate;
            remaining = &separators[position + 1..];
            break;
        }
    }

    let mut chunks = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) < config.max_chars {
            pending.push(piece);
            continue;
        }

        if !pending.is_empty() {
            chunks.extend(merge_pieces(&pending, config));
            pending.clear();
        }

        if remaining.is_empty() {
            chunks.push(piece.to_string());
        } else {
            chunks.extend(split_recursive(piece, config, remaining));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_pieces(&pending, config));
    }

    chunks
}

/// Splits on `separator`, attaching each separator to the start of the piece
/// that follows it. An empty separator splits into characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(start, ch)| &text[start..start + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (position, _) in text.match_indices(separator) {
        if position > start {
            pieces.push(&text[start..position]);
        }
        start = position;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces.into_iter().filter(|piece| !piece.is_empty()).collect()
}

/// Greedily packs pieces into chunks, carrying at most `overlap_chars` of
/// trailing pieces into the next chunk.
fn merge_pieces(pieces: &[&str], config: ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0usize;

    for &piece in pieces {
        let length = char_len(piece);

        if total + length > config.max_chars {
            if total > config.max_chars {
                warn!(
                    chunk_chars = total,
                    max_chars = config.max_chars,
                    "created a chunk longer than the configured size"
                );
            }

            if !window.is_empty() {
                push_joined(&mut chunks, &window);

                while total > config.overlap_chars
                    || (total + length > config.max_chars && total > 0)
                {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }
        }

        window.push_back((piece, length));
        total += length;
    }

    push_joined(&mut chunks, &window);
    chunks
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined = window.iter().map(|(piece, _)| *piece).collect::<String>();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Splits already-normalized text and drops chunks whose trimmed length does
/// not exceed `min_chars`.
pub fn build_chunks(normalized: &str, config: ChunkingConfig) -> Result<Vec<String>, IngestError> {
    let chunks = split_text(normalized, config, &DEFAULT_SEPARATORS)?
        .into_iter()
        .filter(|chunk| char_len(chunk.trim()) > config.min_chars)
        .collect::<Vec<_>>();

    if chunks.is_empty() {
        return Err(IngestError::NoUsableChunks);
    }

    Ok(chunks)
}
