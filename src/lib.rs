//! Artistic Alchemist: restyle a content image with the look of a style
//! image, served as a small actix-web app backed by Gemini.

pub mod config;
pub mod error;
pub mod form;
pub mod gemini;
pub mod logger;
pub mod models;
pub mod uploader;

#[cfg(feature = "server")]
pub mod server;

pub use config::{Config, GeminiConfig, SessionLimits, UploadLimits};
pub use error::{AlchemistError, Result};
pub use form::{FormController, FormEvent, FormPhase, FormView, Notification};
pub use gemini::{AlchemistClient, GeminiClient, ModelInvoker, StyleTransferClient, SuggestionClient};
pub use models::*;
pub use uploader::{ImageSlot, ImageUploader, SelectedFile};
