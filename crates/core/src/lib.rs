pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod expansion;
pub mod extractor;
pub mod gemini;
pub mod index;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod session;
pub mod store;
pub mod synthesizer;
pub mod traits;

pub use chunking::{build_chunks, normalize_text, split_text, ChunkingConfig};
pub use config::GeminiConfig;
pub use embeddings::{CharacterNgramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IngestError, SearchError, ServiceError};
pub use expansion::expand_query;
pub use extractor::{extract_text_from_pdfs, LopdfExtractor, PageText, PdfExtractor};
pub use gemini::GeminiClient;
pub use index::{EmbeddingIndex, IndexSearcher};
pub use ingest::{discover_pdf_files, load_uploads, process_uploads, LoadedUploads};
pub use models::{
    BuildReport, ChatTurn, IngestionOptions, PipelineConfig, RetrievalOptions, RetrievalOutcome,
    SkippedPdf, SourceSummary, UploadedPdf,
};
pub use orchestrator::RetrievalOrchestrator;
pub use session::Session;
pub use store::IndexStore;
pub use synthesizer::AnswerSynthesizer;
pub use traits::{ChatModel, Embedder, VectorSearch};
