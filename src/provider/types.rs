//! Payload builders and response views for the provider's OpenAI-compatible
//! API.
//!
//! The dispatcher itself treats payloads as opaque JSON; these types exist
//! for the CLI call sites that build requests and read replies.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A single message in a chat-completion conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Build an opaque chat-completion payload.
pub fn chat_payload(model: &str, temperature: f64, messages: &[ChatMessage]) -> Value {
    json!({
        "model": model,
        "temperature": temperature,
        "messages": messages,
    })
}

/// Build an opaque transcription payload. Audio bytes travel base64-encoded
/// so the payload stays serializable on the broker wire.
pub fn transcription_payload(
    model: &str,
    audio: &[u8],
    filename: &str,
    language: Option<&str>,
) -> Value {
    let mut payload = json!({
        "model": model,
        "file": BASE64.encode(audio),
        "filename": filename,
    });
    if let Some(language) = language {
        payload["language"] = json!(language);
    }
    payload
}

/// Minimal view of a chat-completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletion {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

impl ChatCompletion {
    /// Content of the first choice, if the provider produced one.
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// Minimal view of a transcription response.
#[derive(Debug, Clone, Deserialize)]
pub struct Transcription {
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_payload_shape() {
        let payload = chat_payload("model-x", 0.27, &[ChatMessage::user("hello")]);
        assert_eq!(payload["model"], "model-x");
        assert_eq!(payload["messages"][0]["role"], "user");
        assert_eq!(payload["messages"][0]["content"], "hello");
    }

    #[test]
    fn transcription_payload_encodes_audio() {
        let payload = transcription_payload("whisper", b"\x00\x01\x02", "note.ogg", Some("az"));
        assert_eq!(payload["model"], "whisper");
        assert_eq!(payload["filename"], "note.ogg");
        assert_eq!(payload["language"], "az");
        let bytes = BASE64.decode(payload["file"].as_str().unwrap()).unwrap();
        assert_eq!(bytes, vec![0, 1, 2]);
    }

    #[test]
    fn transcription_payload_omits_absent_language() {
        let payload = transcription_payload("whisper", b"abc", "note.ogg", None);
        assert!(payload.get("language").is_none());
    }

    #[test]
    fn chat_completion_parses_provider_format() {
        let raw = r#"{
            "id": "chatcmpl-123",
            "model": "model-x",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi there"}}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2}
        }"#;
        let completion: ChatCompletion = serde_json::from_str(raw).unwrap();
        assert_eq!(completion.first_content(), Some("Hi there"));
    }

    #[test]
    fn empty_choices_yield_no_content() {
        let completion: ChatCompletion = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert_eq!(completion.first_content(), None);
    }

    #[test]
    fn transcription_parses_text_field() {
        let transcription: Transcription =
            serde_json::from_str(r#"{"text": "hello world", "duration": 1.5}"#).unwrap();
        assert_eq!(transcription.text, "hello world");
    }
}
