use crate::{
    config::UploadLimits,
    error::{AlchemistError, Result},
    models::ImageDataUri,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSlot {
    Content,
    Style,
}

impl ImageSlot {
    pub fn label(&self) -> &'static str {
        match self {
            ImageSlot::Content => "Content Image",
            ImageSlot::Style => "Style Image",
        }
    }
}

impl fmt::Display for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSlot::Content => f.write_str("content"),
            ImageSlot::Style => f.write_str("style"),
        }
    }
}

impl FromStr for ImageSlot {
    type Err = AlchemistError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "content" => Ok(ImageSlot::Content),
            "style" => Ok(ImageSlot::Style),
            other => Err(AlchemistError::NotFound(format!("image slot '{}'", other))),
        }
    }
}

/// A file as picked by the user, before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Declared type without parameters, falling back to the file extension
    /// when the client sent none or a generic one.
    pub fn effective_mime_type(&self) -> Option<String> {
        let declared = self
            .mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if !declared.is_empty() && declared != "application/octet-stream" {
            return Some(declared);
        }

        let extension = self.name.rsplit_once('.')?.1.to_ascii_lowercase();
        let guessed = match extension.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "bmp" => "image/bmp",
            "heic" => "image/heic",
            "heif" => "image/heif",
            _ => return None,
        };
        Some(guessed.to_string())
    }
}

/// Turns selected files into data URIs and reports every change to its owner.
pub struct ImageUploader<F>
where
    F: FnMut(Option<&SelectedFile>, Option<&ImageDataUri>),
{
    slot: ImageSlot,
    limits: UploadLimits,
    on_upload: F,
}

impl<F> ImageUploader<F>
where
    F: FnMut(Option<&SelectedFile>, Option<&ImageDataUri>),
{
    pub fn new(slot: ImageSlot, limits: UploadLimits, on_upload: F) -> Self {
        Self {
            slot,
            limits,
            on_upload,
        }
    }

    pub fn slot(&self) -> ImageSlot {
        self.slot
    }

    /// Rejected files leave the owner untouched.
    pub fn select(&mut self, file: SelectedFile) -> Result<ImageDataUri> {
        let mime_type = validate(&self.limits, &file)?;
        let data_uri = ImageDataUri::from_bytes(mime_type, &file.bytes);

        log::debug!(
            "{} selected: {} ({}, {} bytes)",
            self.slot.label(),
            file.name,
            data_uri.mime_type(),
            file.size()
        );

        (self.on_upload)(Some(&file), Some(&data_uri));
        Ok(data_uri)
    }

    pub fn clear(&mut self) {
        log::debug!("{} cleared", self.slot.label());
        (self.on_upload)(None, None);
    }
}

/// Returns the MIME type the image will be embedded with.
pub fn validate(limits: &UploadLimits, file: &SelectedFile) -> Result<String> {
    if file.bytes.is_empty() {
        return Err(AlchemistError::InvalidImage(format!("{} is empty", file.name)));
    }
    if file.size() > limits.max_image_bytes {
        return Err(AlchemistError::InvalidImage(format!(
            "{} is {} bytes, the limit is {} bytes",
            file.name,
            file.size(),
            limits.max_image_bytes
        )));
    }

    match file.effective_mime_type() {
        Some(mime) if mime.starts_with("image/") => Ok(mime),
        Some(mime) => Err(AlchemistError::InvalidImage(format!(
            "{} has type {}, expected an image",
            file.name, mime
        ))),
        None => Err(AlchemistError::InvalidImage(format!(
            "could not determine the type of {}",
            file.name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(name: &str, bytes: &[u8]) -> SelectedFile {
        SelectedFile::new(name, "image/png", bytes.to_vec())
    }

    #[test]
    fn test_select_encodes_and_notifies() {
        let mut seen: Vec<(Option<String>, Option<String>)> = Vec::new();
        {
            let mut uploader = ImageUploader::new(
                ImageSlot::Content,
                UploadLimits::default(),
                |file: Option<&SelectedFile>, uri: Option<&ImageDataUri>| {
                    seen.push((file.map(|f| f.name.clone()), uri.map(|u| u.to_string())));
                },
            );

            let uri = uploader.select(png("cat.png", b"hello")).unwrap();
            assert_eq!(uri.to_string(), "data:image/png;base64,aGVsbG8=");
            uploader.clear();
        }

        assert_eq!(
            seen,
            vec![
                (
                    Some("cat.png".to_string()),
                    Some("data:image/png;base64,aGVsbG8=".to_string())
                ),
                (None, None),
            ]
        );
    }

    #[test]
    fn test_rejected_file_does_not_notify() {
        let mut calls = 0;
        {
            let mut uploader = ImageUploader::new(
                ImageSlot::Style,
                UploadLimits::new().with_max_image_bytes(4),
                |_: Option<&SelectedFile>, _: Option<&ImageDataUri>| calls += 1,
            );
            let err = uploader.select(png("big.png", b"too large")).unwrap_err();
            assert!(matches!(err, AlchemistError::InvalidImage(msg) if msg.contains("limit is 4 bytes")));
        }
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_mime_type_resolution() {
        let limits = UploadLimits::default();

        let with_params = SelectedFile::new("a.png", "Image/PNG; q=1", b"x".to_vec());
        assert_eq!(validate(&limits, &with_params).unwrap(), "image/png");

        let guessed = SelectedFile::new("photo.JPG", "application/octet-stream", b"x".to_vec());
        assert_eq!(validate(&limits, &guessed).unwrap(), "image/jpeg");

        let text = SelectedFile::new("notes.txt", "text/plain", b"x".to_vec());
        assert!(validate(&limits, &text).is_err());

        let unknown = SelectedFile::new("blob", "", b"x".to_vec());
        assert!(validate(&limits, &unknown).is_err());

        let empty = SelectedFile::new("a.png", "image/png", Vec::new());
        assert!(validate(&limits, &empty).is_err());
    }

    #[test]
    fn test_slot_parsing() {
        assert_eq!("content".parse::<ImageSlot>().unwrap(), ImageSlot::Content);
        assert_eq!("style".parse::<ImageSlot>().unwrap(), ImageSlot::Style);
        assert!("both".parse::<ImageSlot>().is_err());
        assert_eq!(ImageSlot::Style.to_string(), "style");
    }
}
