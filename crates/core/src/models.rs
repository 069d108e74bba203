use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A PDF handed to the build pipeline, already read into memory.
#[derive(Debug, Clone)]
pub struct UploadedPdf {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedPdf {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSummary {
    pub filename: String,
    pub pages: u32,
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPdf {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub chunk_count: usize,
    pub sources: Vec<SourceSummary>,
    pub skipped_files: Vec<SkippedPdf>,
    pub built_at: DateTime<Utc>,
}

impl BuildReport {
    pub fn page_count(&self) -> u32 {
        self.sources.iter().map(|source| source.pages).sum()
    }
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_max_chars: usize,
    pub chunk_overlap_chars: usize,
    pub min_chunk_chars: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 1_500,
            chunk_overlap_chars: 300,
            min_chunk_chars: 50,
        }
    }
}

/// Search widths and thresholds used when answering a question.
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    pub top_k: usize,
    pub min_distinct_chunks: usize,
    pub word_top_k: usize,
    /// Words of the question must be longer than this to be searched alone.
    pub word_min_chars: usize,
    pub fallback_top_k: usize,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            top_k: 6,
            min_distinct_chunks: 3,
            word_top_k: 2,
            word_min_chars: 3,
            fallback_top_k: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub index_path: PathBuf,
    pub ingestion: IngestionOptions,
    pub retrieval: RetrievalOptions,
    pub temperature: f64,
    pub cache_index: bool,
}

pub const DEFAULT_INDEX_PATH: &str = "faiss_index/index.json";
pub const DEFAULT_TEMPERATURE: f64 = 0.4;

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
            ingestion: IngestionOptions::default(),
            retrieval: RetrievalOptions::default(),
            temperature: DEFAULT_TEMPERATURE,
            cache_index: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalOutcome {
    pub answer: String,
    pub context_chunks: usize,
    pub fallback_attempted: bool,
    pub fallback_used: bool,
}
