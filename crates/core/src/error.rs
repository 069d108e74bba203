use thiserror::Error;

/// Failure of a call to a hosted embedding or chat-completion service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("{backend} returned no usable content: {details}")]
    EmptyResponse { backend: String, details: String },
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("no text could be extracted from the uploaded PDFs")]
    NoExtractableText,

    #[error("no usable text chunks were produced")]
    NoUsableChunks,

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("embedding service error: {0}")]
    Embedding(#[from] ServiceError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to persist index to {path}: {details}")]
    Persist { path: String, details: String },
}

impl IngestError {
    /// Text shown to the user when a build fails.
    pub fn user_message(&self) -> String {
        match self {
            IngestError::NoExtractableText => {
                "No text could be extracted from the uploaded PDFs. Please check that they contain readable text.".to_string()
            }
            IngestError::NoUsableChunks => {
                "No valid text chunks were created. Please check your PDF content.".to_string()
            }
            IngestError::Embedding(error) => format!(
                "Error creating embeddings: {error}. This might be due to API key issues or network problems."
            ),
            other => format!("Error while processing PDFs: {other}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("index not available yet: {0}")]
    NotReady(String),

    #[error("failed to load index: {0}")]
    IndexLoad(String),

    #[error("embedding service error: {0}")]
    Embedding(ServiceError),

    #[error("answer chain error: {0}")]
    Chain(ServiceError),
}

impl SearchError {
    /// Text rendered as the chat answer when a query fails.
    pub fn user_message(&self) -> String {
        match self {
            SearchError::NotReady(_) => {
                "Vector store not found. Please upload and process a PDF first.".to_string()
            }
            SearchError::IndexLoad(details) => {
                format!("Error loading vector store: {details}. Please reprocess your PDF.")
            }
            SearchError::Embedding(error) => format!("Error embedding question: {error}"),
            SearchError::Chain(error) => format!("Error processing question: {error}"),
        }
    }
}
