use crate::error::SearchError;
use crate::expansion::expand_query;
use crate::models::{RetrievalOptions, RetrievalOutcome};
use crate::synthesizer::AnswerSynthesizer;
use crate::traits::{ChatModel, VectorSearch};
use std::collections::HashSet;
use tracing::{debug, info, warn};

const NON_ANSWER_MARKERS: [&str; 2] = ["not available in the context", "cannot find"];
const FALLBACK_REJECT_MARKER: &str = "not available";

pub fn fallback_question(question: &str) -> String {
    format!("Based on the available information, what can you tell me about: {question}")
}

/// True when the model declined to answer from the given context.
pub fn is_non_answer(answer: &str) -> bool {
    let lowered = answer.to_lowercase();
    NON_ANSWER_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Removes exact duplicates, keeping the first occurrence of each chunk.
pub fn dedup_preserving_order(chunks: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    chunks
        .into_iter()
        .filter(|chunk| seen.insert(chunk.clone()))
        .collect()
}

/// Runs the widening searches and the single fallback round around the
/// answer synthesizer.
pub struct RetrievalOrchestrator<'a, S: ?Sized, M: ?Sized> {
    search: &'a S,
    synthesizer: AnswerSynthesizer<'a, M>,
    options: RetrievalOptions,
}

impl<'a, S, M> RetrievalOrchestrator<'a, S, M>
where
    S: VectorSearch + ?Sized,
    M: ChatModel + ?Sized,
{
    pub fn new(search: &'a S, model: &'a M, options: RetrievalOptions) -> Self {
        Self {
            search,
            synthesizer: AnswerSynthesizer::new(model),
            options,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.synthesizer = self.synthesizer.with_temperature(temperature);
        self
    }

    /// Collects context chunks for `question`: expanded query first, then the
    /// raw question if that came up short, then single words as a last resort.
    pub async fn retrieve_context(&self, question: &str) -> Result<Vec<String>, SearchError> {
        let top_k = self.options.top_k;
        let expanded = expand_query(question);
        let mut chunks = self.search.similarity_search(&expanded, top_k).await?;
        debug!(expanded = %expanded, hits = chunks.len(), "expanded query search");

        if chunks.len() < top_k {
            let additional = self.search.similarity_search(question, top_k).await?;
            chunks.extend(additional);
            chunks = dedup_preserving_order(chunks);
            chunks.truncate(top_k);
            debug!(hits = chunks.len(), "merged raw question results");
        }

        if chunks.len() < self.options.min_distinct_chunks {
            for word in question.split_whitespace() {
                if word.chars().count() > self.options.word_min_chars {
                    let word_chunks = self
                        .search
                        .similarity_search(word, self.options.word_top_k)
                        .await?;
                    chunks.extend(word_chunks);
                }
            }
            debug!(hits = chunks.len(), "widened with per-word searches");
        }

        Ok(chunks)
    }

    pub async fn answer(&self, question: &str) -> Result<RetrievalOutcome, SearchError> {
        let context = self.retrieve_context(question).await?;
        let mut outcome = RetrievalOutcome {
            answer: self.synthesizer.answer(&context, question).await?,
            context_chunks: context.len(),
            fallback_attempted: false,
            fallback_used: false,
        };

        if !is_non_answer(&outcome.answer) {
            return Ok(outcome);
        }

        warn!("answer looked like a non-answer, retrying with a wider search");
        outcome.fallback_attempted = true;
        let general = self
            .search
            .similarity_search(question, self.options.fallback_top_k)
            .await?;
        if general.is_empty() {
            return Ok(outcome);
        }

        let fallback = self
            .synthesizer
            .answer(&general, &fallback_question(question))
            .await?;
        if !fallback.to_lowercase().contains(FALLBACK_REJECT_MARKER) {
            info!(context_chunks = general.len(), "fallback answer replaced non-answer");
            outcome.answer = fallback;
            outcome.context_chunks = general.len();
            outcome.fallback_used = true;
        }

        Ok(outcome)
    }
}
