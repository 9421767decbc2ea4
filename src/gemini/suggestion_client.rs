use crate::{
    error::{AlchemistError, Result},
    gemini::ModelInvoker,
    logger,
    models::{
        Content, GenerateContentRequest, GenerationConfig, Part, SuggestionRequest,
        SuggestionResponse,
    },
};
use serde_json::json;
use std::sync::Arc;

/// Requested in the prompt only; the model decides how many it returns.
pub const SUGGESTION_COUNT: usize = 3;

#[derive(Clone)]
pub struct SuggestionClient {
    invoker: Arc<dyn ModelInvoker>,
    model: String,
}

impl SuggestionClient {
    pub fn new(invoker: Arc<dyn ModelInvoker>, model: impl Into<String>) -> Self {
        Self {
            invoker,
            model: model.into(),
        }
    }

    pub async fn suggest(&self, request: SuggestionRequest) -> Result<SuggestionResponse> {
        let payload = build_request(&request)?;

        let _timer = logger::timer("style suggestions");
        let response = self.invoker.generate_content(&self.model, payload).await?;

        let text = response.text().ok_or_else(|| {
            AlchemistError::ModelResponse(format!(
                "the model returned no suggestions ({})",
                response.empty_reason()
            ))
        })?;

        let parsed: SuggestionResponse = serde_json::from_str(text.trim()).map_err(|e| {
            log::warn!("Unparsable suggestion output: {}", text);
            AlchemistError::ModelResponse(format!("suggestions did not match the expected shape: {}", e))
        })?;

        if parsed.style_image_suggestions.len() != SUGGESTION_COUNT {
            log::debug!(
                "Model returned {} suggestions instead of {}",
                parsed.style_image_suggestions.len(),
                SUGGESTION_COUNT
            );
        }

        Ok(parsed)
    }
}

pub fn build_prompt(content_description: &str) -> String {
    format!(
        "You are an art curator helping someone pick a style image for neural style transfer.\n\
         The content image shows: {}\n\n\
         Suggest exactly {} style images that would transform it in interesting ways. \
         Describe each one in a single sentence, naming the artist, movement or medium and \
         the visual qualities that make it a good match.",
        content_description, SUGGESTION_COUNT
    )
}

pub fn build_request(request: &SuggestionRequest) -> Result<GenerateContentRequest> {
    let description = request.content_description.trim();
    if description.is_empty() {
        return Err(AlchemistError::MissingInput(
            "contentDescription is required".to_string(),
        ));
    }

    Ok(GenerateContentRequest {
        contents: vec![Content::user(vec![Part::text(build_prompt(description))])],
        generation_config: Some(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(json!({
                "type": "OBJECT",
                "properties": {
                    "styleImageSuggestions": {
                        "type": "ARRAY",
                        "items": { "type": "STRING" }
                    }
                },
                "required": ["styleImageSuggestions"]
            })),
            ..Default::default()
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::testing::{response_with_parts, RecordingInvoker};

    fn ask(description: &str) -> SuggestionRequest {
        SuggestionRequest {
            content_description: description.to_string(),
        }
    }

    #[tokio::test]
    async fn test_returns_parsed_suggestions() {
        let invoker = Arc::new(RecordingInvoker::new());
        invoker.push(Ok(response_with_parts(vec![Part::text(
            r#"{"styleImageSuggestions": ["Van Gogh's Starry Night", "Ukiyo-e woodblock", "Bauhaus poster"]}"#,
        )])));
        let client = SuggestionClient::new(invoker.clone(), "gemini-text");

        let response = client.suggest(ask("a lighthouse at dusk")).await.unwrap();

        assert_eq!(response.style_image_suggestions.len(), 3);
        assert_eq!(response.style_image_suggestions[1], "Ukiyo-e woodblock");

        let (model, sent) = invoker.last_call().unwrap();
        assert_eq!(model, "gemini-text");
        let prompt = sent.contents[0].parts[0].text.clone().unwrap();
        assert!(prompt.contains("a lighthouse at dusk"));
        assert!(prompt.contains("exactly 3"));
        assert_eq!(
            sent.generation_config.unwrap().response_mime_type.as_deref(),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn test_count_is_not_enforced() {
        let invoker = Arc::new(RecordingInvoker::new());
        invoker.push(Ok(response_with_parts(vec![Part::text(
            r#"{"styleImageSuggestions": ["Cubism"]}"#,
        )])));
        let client = SuggestionClient::new(invoker, "gemini-text");

        let response = client.suggest(ask("a cat")).await.unwrap();
        assert_eq!(response.style_image_suggestions, vec!["Cubism".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_field_fails() {
        let invoker = Arc::new(RecordingInvoker::new());
        invoker.push(Ok(response_with_parts(vec![Part::text(
            r#"{"suggestions": ["Cubism"]}"#,
        )])));
        let client = SuggestionClient::new(invoker, "gemini-text");

        let err = client.suggest(ask("a cat")).await.unwrap_err();
        assert!(matches!(err, AlchemistError::ModelResponse(_)));
    }

    #[tokio::test]
    async fn test_empty_response_fails() {
        let invoker = Arc::new(RecordingInvoker::new());
        invoker.push(Ok(response_with_parts(vec![])));
        let client = SuggestionClient::new(invoker, "gemini-text");

        let err = client.suggest(ask("a cat")).await.unwrap_err();
        assert!(matches!(err, AlchemistError::ModelResponse(msg) if msg.contains("no suggestions")));
    }

    #[tokio::test]
    async fn test_blank_description_makes_no_model_call() {
        let invoker = Arc::new(RecordingInvoker::new());
        let client = SuggestionClient::new(invoker.clone(), "gemini-text");

        let err = client.suggest(ask("   ")).await.unwrap_err();
        assert!(matches!(err, AlchemistError::MissingInput(_)));
        assert_eq!(invoker.call_count(), 0);
    }
}
