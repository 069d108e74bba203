use crate::error::ServiceError;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/";
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/embedding-001";
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for the Google Generative Language API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_base: Url,
    pub api_key: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ServiceError> {
        Ok(Self {
            api_base: Url::parse(DEFAULT_API_BASE)?,
            api_key: api_key.into(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Accepts bases with or without a trailing slash.
    pub fn with_api_base(mut self, base: &str) -> Result<Self, ServiceError> {
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        self.api_base = Url::parse(&base)?;
        Ok(self)
    }

    pub fn with_models(
        mut self,
        embedding_model: impl Into<String>,
        chat_model: impl Into<String>,
    ) -> Self {
        self.embedding_model = embedding_model.into();
        self.chat_model = chat_model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn method_url(&self, model: &str, method: &str) -> Result<Url, ServiceError> {
        Ok(self
            .api_base
            .join(&format!("{}:{method}", qualified_model(model)))?)
    }
}

pub(crate) fn qualified_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_urls_are_built_under_the_api_base() {
        let config = GeminiConfig::new("key").expect("default base parses");
        let url = config
            .method_url("models/embedding-001", "embedContent")
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/embedding-001:embedContent"
        );

        let url = config
            .method_url("gemini-2.0-flash-exp", "generateContent")
            .expect("url");
        assert!(url
            .as_str()
            .ends_with("/v1beta/models/gemini-2.0-flash-exp:generateContent"));
    }

    #[test]
    fn api_base_without_trailing_slash_keeps_its_path() {
        let config = GeminiConfig::new("key")
            .and_then(|config| config.with_api_base("http://127.0.0.1:9000/v1beta"))
            .expect("custom base parses");
        let url = config.method_url("embedding-001", "embedContent").expect("url");
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9000/v1beta/models/embedding-001:embedContent"
        );
    }
}
