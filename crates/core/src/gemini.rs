use crate::config::{qualified_model, GeminiConfig};
use crate::error::ServiceError;
use crate::traits::{ChatModel, Embedder};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

const BACKEND: &str = "gemini";
/// Upper bound on requests per `batchEmbedContents` call.
const MAX_BATCH: usize = 100;

/// Client for the hosted embedding and chat-completion endpoints.
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ServiceError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    async fn post(&self, url: Url, body: &Value) -> Result<Value, ServiceError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(ServiceError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("{status}: {}", details.trim()),
            });
        }

        Ok(response.json().await?)
    }

    fn embed_request(&self, text: &str, task_type: &str) -> Value {
        json!({
            "model": qualified_model(&self.config.embedding_model),
            "content": { "parts": [{ "text": text }] },
            "taskType": task_type,
        })
    }
}

fn values_at(value: &Value) -> Option<Vec<f32>> {
    value
        .pointer("/values")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_f64)
                .map(|number| number as f32)
                .collect()
        })
}

#[async_trait]
impl Embedder for GeminiClient {
    fn model_name(&self) -> &str {
        &self.config.embedding_model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let url = self
            .config
            .method_url(&self.config.embedding_model, "batchEmbedContents")?;

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            let requests = batch
                .iter()
                .map(|text| self.embed_request(text, "RETRIEVAL_DOCUMENT"))
                .collect::<Vec<_>>();

            let parsed = self
                .post(url.clone(), &json!({ "requests": requests }))
                .await?;
            let embeddings = parsed
                .pointer("/embeddings")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            if embeddings.len() != batch.len() {
                return Err(ServiceError::EmptyResponse {
                    backend: BACKEND.to_string(),
                    details: format!(
                        "expected {} embeddings, received {}",
                        batch.len(),
                        embeddings.len()
                    ),
                });
            }

            for embedding in &embeddings {
                let values = values_at(embedding).filter(|values| !values.is_empty());
                match values {
                    Some(values) => vectors.push(values),
                    None => {
                        return Err(ServiceError::EmptyResponse {
                            backend: BACKEND.to_string(),
                            details: "embedding without values".to_string(),
                        })
                    }
                }
            }
            debug!(batch = batch.len(), "embedded document batch");
        }

        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let url = self
            .config
            .method_url(&self.config.embedding_model, "embedContent")?;
        let parsed = self
            .post(url, &self.embed_request(text, "RETRIEVAL_QUERY"))
            .await?;

        parsed
            .pointer("/embedding")
            .and_then(values_at)
            .filter(|values| !values.is_empty())
            .ok_or_else(|| ServiceError::EmptyResponse {
                backend: BACKEND.to_string(),
                details: "query embedding without values".to_string(),
            })
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn complete(&self, prompt: &str, temperature: f64) -> Result<String, ServiceError> {
        let url = self
            .config
            .method_url(&self.config.chat_model, "generateContent")?;
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": temperature },
        });

        let parsed = self.post(url, &body).await?;
        let parts = parsed
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let text = parts
            .iter()
            .filter_map(|part| part.pointer("/text").and_then(Value::as_str))
            .collect::<String>();

        if text.trim().is_empty() {
            let reason = parsed
                .pointer("/promptFeedback/blockReason")
                .or_else(|| parsed.pointer("/candidates/0/finishReason"))
                .and_then(Value::as_str)
                .unwrap_or("no candidates returned");
            return Err(ServiceError::EmptyResponse {
                backend: BACKEND.to_string(),
                details: reason.to_string(),
            });
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GeminiClient {
        let config = GeminiConfig::new("test-key")
            .and_then(|config| config.with_api_base(&format!("{}/v1beta/", server.uri())))
            .expect("mock base parses");
        GeminiClient::new(config).expect("client builds")
    }

    #[tokio::test]
    async fn query_embedding_reads_values() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/embedding-001:embedContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({ "taskType": "RETRIEVAL_QUERY" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "embedding": { "values": [0.5, -0.25, 1.0] } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let vector = client_for(&server)
            .embed_query("what is the cost?")
            .await
            .expect("embedding");
        assert_eq!(vector, vec![0.5, -0.25, 1.0]);
    }

    #[tokio::test]
    async fn document_embeddings_are_batched() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/embedding-001:batchEmbedContents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [{ "values": [1.0, 0.0] }, { "values": [0.0, 1.0] }]
            })))
            .mount(&server)
            .await;

        let vectors = client_for(&server)
            .embed_documents(&["first".to_string(), "second".to_string()])
            .await
            .expect("embeddings");
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn error_status_becomes_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .embed_query("anything")
            .await
            .expect_err("403 must fail");
        match error {
            ServiceError::BackendResponse { details, .. } => {
                assert!(details.contains("403"));
                assert!(details.contains("API key not valid"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn completion_joins_candidate_parts_and_sends_temperature() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash-exp:generateContent"))
            .and(body_partial_json(json!({ "generationConfig": { "temperature": 0.4 } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "The budget " }, { "text": "is 10k." }] } }]
            })))
            .mount(&server)
            .await;

        let answer = client_for(&server)
            .complete("prompt", 0.4)
            .await
            .expect("answer");
        assert_eq!(answer, "The budget is 10k.");
    }

    #[tokio::test]
    async fn blocked_completion_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .complete("prompt", 0.4)
            .await
            .expect_err("blocked prompt must fail");
        assert!(error.to_string().contains("SAFETY"));
    }
}
