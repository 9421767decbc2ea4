use crate::error::{AlchemistError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An image embedded as `data:<mime>;base64,<payload>`.
///
/// The payload is kept in its base64 form: it travels to the model and back
/// to the browser encoded, and is only decoded for downloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageDataUri {
    mime_type: String,
    data: String,
}

impl ImageDataUri {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(mime_type, STANDARD.encode(bytes))
    }

    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| AlchemistError::InvalidImage("expected a data: URI".into()))?;

        let (header, data) = rest
            .split_once(',')
            .ok_or_else(|| AlchemistError::InvalidImage("data URI has no payload".into()))?;

        let mime_type = header.strip_suffix(";base64").ok_or_else(|| {
            AlchemistError::InvalidImage("data URI must be base64 encoded".into())
        })?;

        if mime_type.is_empty() {
            return Err(AlchemistError::InvalidImage(
                "data URI has no MIME type".into(),
            ));
        }
        if data.is_empty() {
            return Err(AlchemistError::InvalidImage("data URI payload is empty".into()));
        }

        Ok(Self::new(mime_type, data))
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 payload without the `data:` header.
    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.data)
            .map_err(|e| AlchemistError::InvalidImage(format!("payload is not valid base64: {}", e)))
    }
}

impl fmt::Display for ImageDataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.data)
    }
}

impl TryFrom<String> for ImageDataUri {
    type Error = AlchemistError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ImageDataUri> for String {
    fn from(value: ImageDataUri) -> Self {
        value.to_string()
    }
}
