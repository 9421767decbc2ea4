//! Upload state and request lifecycle for one style-transfer form.
//!
//! The visible state is a [`FormPhase`] derived by a pure transition
//! function; [`FormController`] owns the two images, the last result and the
//! queue of transient notifications, and feeds events into that function.

use crate::{
    error::{AlchemistError, Result},
    gemini::StyleTransferClient,
    models::{ImageDataUri, StyleTransferRequest, StyleTransferResponse},
    uploader::{ImageSlot, SelectedFile},
};
use serde::Serialize;

pub const DOWNLOAD_FILE_NAME: &str = "artistic_alchemist_stylized_image.png";
pub const MISSING_IMAGES_MESSAGE: &str = "Please upload both a content image and a style image.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum FormPhase {
    Empty,
    OneImage { missing: ImageSlot },
    Ready,
    Submitting,
    Done,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    ImagesChanged { content: bool, style: bool },
    SubmitStarted,
    Succeeded,
    Failed(String),
    /// The in-flight result belongs to images that have since changed.
    Superseded { content: bool, style: bool },
}

impl FormPhase {
    pub fn from_presence(content: bool, style: bool) -> Self {
        match (content, style) {
            (false, false) => FormPhase::Empty,
            (true, false) => FormPhase::OneImage {
                missing: ImageSlot::Style,
            },
            (false, true) => FormPhase::OneImage {
                missing: ImageSlot::Content,
            },
            (true, true) => FormPhase::Ready,
        }
    }

    pub fn next(&self, event: &FormEvent) -> FormPhase {
        match (self, event) {
            // the request stays in flight until its outcome arrives
            (FormPhase::Submitting, FormEvent::ImagesChanged { .. }) => FormPhase::Submitting,
            (_, FormEvent::ImagesChanged { content, style }) => {
                FormPhase::from_presence(*content, *style)
            }
            (phase, FormEvent::SubmitStarted) if phase.can_submit() => FormPhase::Submitting,
            (FormPhase::Submitting, FormEvent::Succeeded) => FormPhase::Done,
            (FormPhase::Submitting, FormEvent::Failed(message)) => FormPhase::Failed {
                message: message.clone(),
            },
            (FormPhase::Submitting, FormEvent::Superseded { content, style }) => {
                FormPhase::from_presence(*content, *style)
            }
            (phase, _) => phase.clone(),
        }
    }

    pub fn status_text(&self) -> String {
        match self {
            FormPhase::Empty => "Upload content and style images to begin.".to_string(),
            FormPhase::OneImage {
                missing: ImageSlot::Content,
            } => "Upload a content image.".to_string(),
            FormPhase::OneImage {
                missing: ImageSlot::Style,
            } => "Upload a style image.".to_string(),
            FormPhase::Ready => "Ready to transfer style.".to_string(),
            FormPhase::Submitting => "Applying artistic style... This may take a moment.".to_string(),
            FormPhase::Done => "Style transfer complete! Your masterpiece is ready.".to_string(),
            FormPhase::Failed { message } => format!("Error: {}", message),
        }
    }

    /// Both images present and nothing in flight.
    pub fn can_submit(&self) -> bool {
        matches!(
            self,
            FormPhase::Ready | FormPhase::Done | FormPhase::Failed { .. }
        )
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, FormPhase::Submitting)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationVariant {
    Default,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: NotificationVariant,
}

impl Notification {
    fn info(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            variant: NotificationVariant::Default,
        }
    }

    fn destructive(title: &str, description: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            variant: NotificationVariant::Destructive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Identifies which image pair an in-flight request was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitTicket {
    generation: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormView {
    pub phase: FormPhase,
    pub status: String,
    pub error: Option<String>,
    pub stylized_image: Option<String>,
    pub has_content_image: bool,
    pub has_style_image: bool,
    pub can_submit: bool,
    pub is_loading: bool,
}

#[derive(Debug, Clone)]
pub struct FormController {
    content_image: Option<ImageDataUri>,
    style_image: Option<ImageDataUri>,
    stylized_image: Option<ImageDataUri>,
    error: Option<String>,
    phase: FormPhase,
    generation: u64,
    notifications: Vec<Notification>,
}

impl Default for FormController {
    fn default() -> Self {
        Self {
            content_image: None,
            style_image: None,
            stylized_image: None,
            error: None,
            phase: FormPhase::Empty,
            generation: 0,
            notifications: Vec::new(),
        }
    }
}

impl FormController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploader callback for either slot; `None` means the image was removed.
    pub fn handle_upload(
        &mut self,
        slot: ImageSlot,
        file: Option<&SelectedFile>,
        data_uri: Option<&ImageDataUri>,
    ) {
        match file {
            Some(file) => log::debug!("{} set from {}", slot.label(), file.name),
            None if data_uri.is_none() => log::debug!("{} removed", slot.label()),
            None => {}
        }

        let value = data_uri.cloned();
        match slot {
            ImageSlot::Content => self.content_image = value,
            ImageSlot::Style => self.style_image = value,
        }

        self.generation += 1;
        self.stylized_image = None;
        self.error = None;
        self.apply(FormEvent::ImagesChanged {
            content: self.content_image.is_some(),
            style: self.style_image.is_some(),
        });
    }

    /// Validates and enters `Submitting`; the caller runs the model call
    /// and reports back through [`FormController::finish_submit`].
    pub fn begin_submit(&mut self) -> Result<(SubmitTicket, StyleTransferRequest)> {
        if self.phase.is_loading() {
            return Err(AlchemistError::Busy);
        }

        let (content, style) = match (&self.content_image, &self.style_image) {
            (Some(content), Some(style)) => (content.to_string(), style.to_string()),
            _ => {
                log::warn!("Style transfer requested with missing images");
                self.error = Some(MISSING_IMAGES_MESSAGE.to_string());
                self.notifications
                    .push(Notification::destructive("Missing Images", MISSING_IMAGES_MESSAGE));
                return Err(AlchemistError::MissingInput(
                    MISSING_IMAGES_MESSAGE.to_string(),
                ));
            }
        };

        self.error = None;
        self.stylized_image = None;
        self.apply(FormEvent::SubmitStarted);

        Ok((
            SubmitTicket {
                generation: self.generation,
            },
            StyleTransferRequest {
                content_image: content,
                style_image: style,
            },
        ))
    }

    pub fn finish_submit(
        &mut self,
        ticket: SubmitTicket,
        outcome: Result<StyleTransferResponse>,
    ) -> Result<()> {
        if !self.phase.is_loading() {
            log::warn!("Ignoring style transfer outcome: no request in flight");
            return Ok(());
        }

        if ticket.generation != self.generation {
            log::info!("Discarding style transfer result for replaced images");
            self.apply(FormEvent::Superseded {
                content: self.content_image.is_some(),
                style: self.style_image.is_some(),
            });
            return Ok(());
        }

        let outcome = outcome.and_then(|response| ImageDataUri::parse(&response.stylized_image));

        match outcome {
            Ok(image) => {
                self.stylized_image = Some(image);
                self.apply(FormEvent::Succeeded);
                self.notifications
                    .push(Notification::info("Success!", "Style transfer complete."));
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                log::error!("Style transfer error: {}", message);
                self.error = Some(message.clone());
                self.notifications.push(Notification::destructive(
                    "Error",
                    format!("Style transfer failed: {}", message),
                ));
                self.apply(FormEvent::Failed(message));
                Err(err)
            }
        }
    }

    /// One full submit cycle against `client`.
    pub async fn submit(&mut self, client: &StyleTransferClient) -> Result<()> {
        let (ticket, request) = self.begin_submit()?;
        let outcome = client.transfer(request).await;
        self.finish_submit(ticket, outcome)
    }

    pub fn download(&mut self) -> Result<Option<DownloadFile>> {
        let image = match &self.stylized_image {
            Some(image) => image,
            None => return Ok(None),
        };

        let file = DownloadFile {
            file_name: DOWNLOAD_FILE_NAME.to_string(),
            mime_type: image.mime_type().to_string(),
            bytes: image.decode()?,
        };
        self.notifications.push(Notification::info(
            "Download Started",
            "Your image is being downloaded.",
        ));
        Ok(Some(file))
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn phase(&self) -> &FormPhase {
        &self.phase
    }

    /// The presence-derived hint stays visible next to a missing-images error.
    pub fn status_text(&self) -> String {
        self.phase.status_text()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn image(&self, slot: ImageSlot) -> Option<&ImageDataUri> {
        match slot {
            ImageSlot::Content => self.content_image.as_ref(),
            ImageSlot::Style => self.style_image.as_ref(),
        }
    }

    pub fn stylized_image(&self) -> Option<&ImageDataUri> {
        self.stylized_image.as_ref()
    }

    pub fn can_submit(&self) -> bool {
        self.phase.can_submit()
    }

    pub fn is_loading(&self) -> bool {
        self.phase.is_loading()
    }

    pub fn view(&self) -> FormView {
        FormView {
            phase: self.phase.clone(),
            status: self.status_text(),
            error: self.error.clone(),
            stylized_image: self.stylized_image.as_ref().map(|image| image.to_string()),
            has_content_image: self.content_image.is_some(),
            has_style_image: self.style_image.is_some(),
            can_submit: self.can_submit(),
            is_loading: self.is_loading(),
        }
    }

    fn apply(&mut self, event: FormEvent) {
        let next = self.phase.next(&event);
        if next != self.phase {
            log::debug!("Form phase {:?} -> {:?}", self.phase, next);
        }
        self.phase = next;
    }
}
