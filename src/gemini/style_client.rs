use crate::{
    error::{AlchemistError, Result},
    gemini::ModelInvoker,
    logger,
    models::{
        Content, GenerateContentRequest, GenerationConfig, ImageDataUri, Part,
        StyleTransferRequest, StyleTransferResponse,
    },
};
use std::sync::Arc;

/// Sent between the two images, so "the first image" is the content image.
pub const STYLE_TRANSFER_INSTRUCTION: &str = "Transfer the artistic style of the second image \
onto the first image. Keep the subject, composition and structure of the first image, and \
render it with the colours, textures and brushwork of the second image. Respond with the \
stylized image.";

#[derive(Clone)]
pub struct StyleTransferClient {
    invoker: Arc<dyn ModelInvoker>,
    model: String,
}

impl StyleTransferClient {
    pub fn new(invoker: Arc<dyn ModelInvoker>, model: impl Into<String>) -> Self {
        Self {
            invoker,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn transfer(&self, request: StyleTransferRequest) -> Result<StyleTransferResponse> {
        let payload = build_request(&request)?;

        let _timer = logger::timer("style transfer");
        let response = self.invoker.generate_content(&self.model, payload).await?;

        let image = response.first_image().ok_or_else(|| {
            let reason = response.empty_reason();
            log::warn!("Style transfer returned no image: {}", reason);
            AlchemistError::ModelResponse(format!("the model did not return an image ({})", reason))
        })?;

        log::debug!(
            "Received {} image, {} base64 characters",
            image.mime_type,
            image.data.len()
        );

        Ok(StyleTransferResponse {
            stylized_image: ImageDataUri::new(&image.mime_type, &image.data).to_string(),
        })
    }
}

/// Builds `[content image, instruction, style image]` with text and image
/// response modalities.
pub fn build_request(request: &StyleTransferRequest) -> Result<GenerateContentRequest> {
    let content = required_image("contentImage", &request.content_image)?;
    let style = required_image("styleImage", &request.style_image)?;

    Ok(GenerateContentRequest {
        contents: vec![Content::user(vec![
            Part::inline(content.mime_type(), content.data()),
            Part::text(STYLE_TRANSFER_INSTRUCTION),
            Part::inline(style.mime_type(), style.data()),
        ])],
        generation_config: Some(GenerationConfig {
            response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
            ..Default::default()
        }),
    })
}

fn required_image(field: &str, value: &str) -> Result<ImageDataUri> {
    if value.trim().is_empty() {
        return Err(AlchemistError::MissingInput(format!("{} is required", field)));
    }
    let image = ImageDataUri::parse(value.trim()).map_err(|e| match e {
        AlchemistError::InvalidImage(msg) => {
            AlchemistError::InvalidImage(format!("{}: {}", field, msg))
        }
        other => other,
    })?;

    if !image.mime_type().to_ascii_lowercase().starts_with("image/") {
        return Err(AlchemistError::InvalidImage(format!(
            "{}: expected an image, got {}",
            field,
            image.mime_type()
        )));
    }
    Ok(image)
}
