use crate::error::SearchError;
use crate::models::DEFAULT_TEMPERATURE;
use crate::traits::ChatModel;
use tracing::debug;

const INSTRUCTIONS: &str = "\
You are an intelligent AI assistant analyzing a document. Use the provided context to answer the question as comprehensively as possible.

INSTRUCTIONS:
1. If you find relevant information in the context, provide a detailed and helpful answer
2. If the exact answer isn't available, try to provide related information that might be helpful
3. If you can make reasonable inferences from the available information, do so while indicating they are inferences
4. Only say \"Answer is not available in the context\" if there is absolutely no relevant information
5. Be conversational and helpful in your tone
6. If appropriate, suggest what additional information might be needed";

pub fn build_prompt(context: &[String], question: &str) -> String {
    format!(
        "{INSTRUCTIONS}\n\nContext:\n{}\n\nQuestion: {question}\n\nHelpful Answer:\n",
        context.join("\n\n")
    )
}

/// Stuffs retrieved chunks into a single prompt and asks the chat model.
pub struct AnswerSynthesizer<'a, M: ?Sized> {
    model: &'a M,
    temperature: f64,
}

impl<'a, M> AnswerSynthesizer<'a, M>
where
    M: ChatModel + ?Sized,
{
    pub fn new(model: &'a M) -> Self {
        Self {
            model,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub async fn answer(&self, context: &[String], question: &str) -> Result<String, SearchError> {
        let prompt = build_prompt(context, question);
        debug!(
            context_chunks = context.len(),
            prompt_chars = prompt.len(),
            "requesting answer"
        );
        self.model
            .complete(&prompt, self.temperature)
            .await
            .map_err(SearchError::Chain)
    }
}
