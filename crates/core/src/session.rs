use crate::error::{IngestError, SearchError};
use crate::extractor::PdfExtractor;
use crate::index::{EmbeddingIndex, IndexSearcher};
use crate::ingest::process_uploads;
use crate::models::{BuildReport, ChatTurn, PipelineConfig, UploadedPdf};
use crate::orchestrator::RetrievalOrchestrator;
use crate::store::IndexStore;
use crate::traits::{ChatModel, Embedder};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

const TURN_SEPARATOR_WIDTH: usize = 50;

/// One user's conversation over the current document set.
///
/// Owns the chat history. The index itself lives on disk, so several
/// sessions may share one store, and a session is ready as soon as an index
/// has been persisted there.
pub struct Session {
    config: PipelineConfig,
    extractor: Box<dyn PdfExtractor + Send + Sync>,
    embedder: Arc<dyn Embedder>,
    chat_model: Arc<dyn ChatModel>,
    store: IndexStore,
    history: Vec<ChatTurn>,
    cached: Option<(Option<SystemTime>, Arc<EmbeddingIndex>)>,
}

impl Session {
    pub fn new(
        config: PipelineConfig,
        extractor: Box<dyn PdfExtractor + Send + Sync>,
        embedder: Arc<dyn Embedder>,
        chat_model: Arc<dyn ChatModel>,
    ) -> Self {
        let store = IndexStore::new(config.index_path.clone());
        Self {
            config,
            extractor,
            embedder,
            chat_model,
            store,
            history: Vec::new(),
            cached: None,
        }
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn is_ready(&self) -> bool {
        self.store.exists()
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Rebuilds the persisted index from `files`. A failed build leaves the
    /// previous index in place.
    pub async fn process_uploads(&mut self, files: &[UploadedPdf]) -> Result<BuildReport, IngestError> {
        let report = process_uploads(
            files,
            self.extractor.as_ref(),
            &self.config.ingestion,
            self.embedder.as_ref(),
            &self.store,
        )
        .await?;

        self.cached = None;
        info!(
            chunks = report.chunk_count,
            files = report.sources.len(),
            "documents processed"
        );
        Ok(report)
    }

    /// Answers `question` and records the turn. Failures come back as the
    /// answer text instead of an error.
    pub async fn ask(&mut self, question: &str) -> String {
        let answer = match self.try_answer(question).await {
            Ok(answer) => answer,
            Err(error) => {
                warn!(%error, "question failed");
                error.user_message()
            }
        };

        self.history.push(ChatTurn {
            question: question.to_string(),
            answer: answer.clone(),
        });
        answer
    }

    async fn try_answer(&mut self, question: &str) -> Result<String, SearchError> {
        let index = self.current_index()?;
        let searcher = IndexSearcher::new(index, self.embedder.as_ref());
        let outcome = RetrievalOrchestrator::new(
            &searcher,
            self.chat_model.as_ref(),
            self.config.retrieval.clone(),
        )
        .with_temperature(self.config.temperature)
        .answer(question)
        .await?;

        debug!(
            context_chunks = outcome.context_chunks,
            fallback_attempted = outcome.fallback_attempted,
            fallback_used = outcome.fallback_used,
            "question answered"
        );
        Ok(outcome.answer)
    }

    fn current_index(&mut self) -> Result<Arc<EmbeddingIndex>, SearchError> {
        if !self.config.cache_index {
            return self.store.load().map(Arc::new);
        }

        let generation = self.store.generation();
        if let Some((cached_generation, index)) = &self.cached {
            if *cached_generation == generation {
                return Ok(Arc::clone(index));
            }
        }

        let index = Arc::new(self.store.load()?);
        self.cached = Some((generation, Arc::clone(&index)));
        Ok(index)
    }

    /// Forgets the conversation and any cached index. The persisted index is
    /// left in place.
    pub fn clear(&mut self) {
        self.history.clear();
        self.cached = None;
    }

    pub fn export_history(&self) -> String {
        let separator = "-".repeat(TURN_SEPARATOR_WIDTH);
        self.history
            .iter()
            .map(|turn| format!("Q: {}\nA: {}\n{separator}\n", turn.question, turn.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
