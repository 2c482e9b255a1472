
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{Chunk, Document, content_id};

/// Configuration for word-window splitting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Number of words per chunk
    pub split_length: usize,
    /// Number of words shared by consecutive chunks of the same document
    pub split_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            split_length: 200,
            split_overlap: 20,
        }
    }
}

impl ChunkingConfig {
    /// Words between the starts of consecutive chunks
    #[inline]
    pub fn step(&self) -> usize {
        self.split_length - self.split_overlap
    }

    fn check(&self) -> Result<()> {
        if self.split_length == 0 {
            bail!("split_length must be greater than zero");
        }
        if self.split_overlap >= self.split_length {
            bail!(
                "split_overlap ({}) must be smaller than split_length ({})",
                self.split_overlap,
                self.split_length
            );
        }
        Ok(())
    }
}

/// Split every document into word-window chunks
#[inline]
pub fn split_documents(documents: &[Document], config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    for document in documents {
        chunks.extend(split_document(document, config)?);
    }

    debug!(
        "Split {} documents into {} chunks (avg {} words)",
        documents.len(),
        chunks.len(),
        chunks.iter().map(|c| c.word_count).sum::<usize>() / chunks.len().max(1)
    );

    Ok(chunks)
}

/// Split a single document into chunks of `split_length` words
///
/// Each chunk starts `split_length - split_overlap` words after the previous
/// one, so consecutive chunks share `split_overlap` words. The last chunk may
/// be shorter. A document with no words produces no chunks.
#[inline]
pub fn split_document(document: &Document, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    config.check()?;

    let text = document.content.as_str();
    let starts = word_starts(text);
    let word_count = starts.len();

    let mut chunks = Vec::new();
    let mut first_word = 0;

    while first_word < word_count {
        let last_word = (first_word + config.split_length).min(word_count);
        let byte_start = starts[first_word];
        let byte_end = starts.get(last_word).copied().unwrap_or(text.len());

        let content = text
            .get(byte_start..byte_end)
            .unwrap_or_default()
            .trim_end()
            .to_string();

        chunks.push(make_chunk(
            document,
            content,
            chunks.len(),
            byte_start,
            last_word - first_word,
        ));

        if last_word == word_count {
            break;
        }
        first_word += config.step();
    }

    Ok(chunks)
}

fn make_chunk(
    document: &Document,
    content: String,
    split_id: usize,
    split_idx_start: usize,
    word_count: usize,
) -> Chunk {
    let mut meta = document.meta.clone();
    meta.insert("source_id".to_string(), Value::from(document.id.as_str()));
    meta.insert("split_id".to_string(), Value::from(split_id));
    meta.insert("split_idx_start".to_string(), Value::from(split_idx_start));

    Chunk {
        id: content_id(&content, &meta),
        content,
        source_id: document.id.clone(),
        split_id,
        split_idx_start,
        word_count,
        meta,
    }
}

/// Byte offsets at which each whitespace-separated word begins
fn word_starts(text: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut in_word = false;

    for (offset, ch) in text.char_indices() {
        if ch.is_whitespace() {
            in_word = false;
        } else if !in_word {
            starts.push(offset);
            in_word = true;
        }
    }

    starts
}
