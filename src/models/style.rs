use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleTransferRequest {
    /// Data URI of the image whose subject is kept.
    #[serde(default)]
    pub content_image: String,
    /// Data URI of the image whose look is applied.
    #[serde(default)]
    pub style_image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleTransferResponse {
    pub stylized_image: String,
}
