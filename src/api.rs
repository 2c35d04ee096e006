//! OpenAI-compatible wire types shared by the HTTP surface and the
//! routing core.
//!
//! Inbound bodies are kept as raw `serde_json::Value` so the proxy
//! round-trips them losslessly; these types are a typed *view* onto the
//! fields routing actually inspects.

use serde::{Deserialize, Serialize};

/// Sentinel substituted for image content when flattening messages to text.
pub const IMAGE_SENTINEL: &str = "[IMAGE]";

/// A chat message as routing sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Option<MessageContent>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(MessageContent::Text(content.into())),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(MessageContent::Text(content.into())),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Some(MessageContent::Text(content.into())),
        }
    }

    /// Flatten this message's content to plain text, substituting
    /// [`IMAGE_SENTINEL`] for image parts.
    pub fn text(&self) -> String {
        match &self.content {
            None => String::new(),
            Some(MessageContent::Text(s)) => s.clone(),
            Some(MessageContent::Parts(parts)) => {
                let mut out: Vec<&str> = Vec::new();
                for part in parts {
                    match part.kind.as_str() {
                        "text" => out.push(part.text.as_deref().unwrap_or("")),
                        "image_url" => out.push(IMAGE_SENTINEL),
                        _ => {}
                    }
                }
                out.join("\n")
            }
        }
    }
}

/// Message content: either a plain string or structured multi-part content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One part of structured message content. Non-text parts carry extra
/// fields (e.g. `image_url`) that routing never looks at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Concatenate the text of all messages, one per line.
pub fn extract_text(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(ChatMessage::text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// OpenAI-style error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, error_type: &str) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                error_type: error_type.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_content() {
        let msg: ChatMessage = serde_json::from_value(serde_json::json!({
            "role": "user",
            "content": "hello"
        }))
        .unwrap();
        assert_eq!(msg.text(), "hello");
    }

    #[test]
    fn structured_content_with_image() {
        let msg: ChatMessage = serde_json::from_value(serde_json::json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "what is this?"},
                {"type": "image_url", "image_url": {"url": "data:..."}}
            ]
        }))
        .unwrap();
        assert_eq!(msg.text(), format!("what is this?\n{IMAGE_SENTINEL}"));
    }

    #[test]
    fn missing_content_is_empty() {
        let msg: ChatMessage =
            serde_json::from_value(serde_json::json!({"role": "assistant"})).unwrap();
        assert_eq!(msg.text(), "");
    }

    #[test]
    fn null_content_is_empty() {
        let msg: ChatMessage =
            serde_json::from_value(serde_json::json!({"role": "assistant", "content": null}))
                .unwrap();
        assert_eq!(msg.text(), "");
    }
}
