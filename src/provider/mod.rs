pub mod client;
pub mod error;
pub mod types;

pub use client::{API_URL, ProviderApi, ProviderClient};
pub use error::{ErrorClass, ProviderError};
pub use types::{ChatCompletion, ChatMessage, Transcription, chat_payload, transcription_payload};
