pub mod style_client;
pub mod suggestion_client;

use crate::{
    config::GeminiConfig,
    error::{AlchemistError, Result},
    models::{ApiErrorEnvelope, GenerateContentRequest, GenerateContentResponse},
};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use std::sync::Arc;

pub use style_client::StyleTransferClient;
pub use suggestion_client::SuggestionClient;

/// One request/response exchange with a hosted generative model.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn generate_content(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse>;
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            AlchemistError::Config("GEMINI_API_KEY (or GOOGLE_API_KEY) is required".into())
        })?;

        Ok(Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl ModelInvoker for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let request_json = serde_json::to_vec(&request)
            .map_err(|e| AlchemistError::Serialization(e.to_string()))?;

        log::info!("Invoking model: {}", model);
        log::debug!("generateContent payload: {} bytes", request_json.len());

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(request_json)
            .send()
            .await
            .map_err(|e| {
                log::error!("Gemini request error details: {:?}", e);
                AlchemistError::Transport(format!("Model request failed: {}", e))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AlchemistError::Transport(format!("Failed to read model response: {}", e)))?;

        if !status.is_success() {
            let message = provider_error_message(status, &body);
            log::error!("Gemini returned {}: {}", status, message);
            return Err(AlchemistError::Transport(message));
        }

        serde_json::from_str(&body).map_err(|e| {
            AlchemistError::ModelResponse(format!("could not decode model response: {}", e))
        })
    }
}

fn provider_error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
        _ if body.trim().is_empty() => format!("Model request failed with status {}", status),
        _ => body.trim().to_string(),
    }
}

/// Style-transfer and suggestion callers sharing one model connection.
#[derive(Clone)]
pub struct AlchemistClient {
    style_client: StyleTransferClient,
    suggestion_client: SuggestionClient,
}

impl AlchemistClient {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let invoker: Arc<dyn ModelInvoker> = Arc::new(GeminiClient::new(config)?);
        Ok(Self::with_invoker(invoker, config))
    }

    pub fn with_invoker(invoker: Arc<dyn ModelInvoker>, config: &GeminiConfig) -> Self {
        Self {
            style_client: StyleTransferClient::new(invoker.clone(), config.image_model.clone()),
            suggestion_client: SuggestionClient::new(invoker, config.text_model.clone()),
        }
    }

    pub fn style(&self) -> &StyleTransferClient {
        &self.style_client
    }

    pub fn suggestions(&self) -> &SuggestionClient {
        &self.suggestion_client
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::models::{Candidate, Content, Part};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// In-process invoker that records every call and replays queued outcomes.
    #[derive(Default)]
    pub struct RecordingInvoker {
        pub calls: Mutex<Vec<(String, GenerateContentRequest)>>,
        outcomes: Mutex<VecDeque<Result<GenerateContentResponse>>>,
    }

    impl RecordingInvoker {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push(&self, outcome: Result<GenerateContentResponse>) -> &Self {
            self.outcomes.lock().unwrap().push_back(outcome);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn last_call(&self) -> Option<(String, GenerateContentRequest)> {
            self.calls.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl ModelInvoker for RecordingInvoker {
        async fn generate_content(
            &self,
            model: &str,
            request: GenerateContentRequest,
        ) -> Result<GenerateContentResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((model.to_string(), request));
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AlchemistError::Transport("no response queued".into())))
        }
    }

    pub fn response_with_parts(parts: Vec<Part>) -> GenerateContentResponse {
        GenerateContentResponse {
            candidates: vec![Candidate {
                content: Some(Content {
                    role: Some("model".to_string()),
                    parts,
                }),
                finish_reason: Some("STOP".to_string()),
            }],
            prompt_feedback: None,
        }
    }

    pub fn image_response(mime_type: &str, data: &str) -> GenerateContentResponse {
        response_with_parts(vec![
            Part::text("Here is the stylized image."),
            Part::inline(mime_type, data),
        ])
    }
}
