use crate::error::AgentError;

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Marker appended to text cut by [`truncate_chars`].
pub const ELLIPSIS: char = '…';

/// Sizes are counted in characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, AgentError> {
        if chunk_size == 0 {
            return Err(AgentError::InvalidChunkConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(AgentError::InvalidChunkConfig(format!(
                "overlap {overlap} must be smaller than chunk size {chunk_size}"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn chunk_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    let chars: Vec<char> = normalized.chars().collect();

    segment_windows(chars.len(), config)
        .into_iter()
        .filter_map(|(start, end)| {
            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            (!piece.is_empty()).then(|| piece.to_string())
        })
        .collect()
}

/// Character ranges `[start, end)` covering a text of `len` characters.
pub fn segment_windows(len: usize, config: ChunkingConfig) -> Vec<(usize, usize)> {
    let mut windows = Vec::new();
    let mut start = 0;
    while start < len {
        let end = (start + config.chunk_size).min(len);
        windows.push((start, end));
        if end == len {
            break;
        }
        // overlap < chunk_size, so end - overlap > start.
        start = end.saturating_sub(config.overlap);
    }
    windows
}

/// Keeps the head of `text` so that the result, marker included, fits in
/// `max_chars` characters. Text already within budget is returned unchanged.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }

    let mut cut: String = text.chars().take(max_chars - 1).collect();
    cut.push(ELLIPSIS);
    cut
}
