use super::ChatSettings;
use serde::{Deserialize, Serialize};

pub(super) const API_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
pub(super) struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
pub(super) struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

pub(super) fn request_body<'a>(settings: &'a ChatSettings, message: &'a str) -> MessagesRequest<'a> {
    MessagesRequest {
        model: &settings.model,
        max_tokens: settings.max_tokens,
        system: &settings.system_prompt,
        messages: [Message {
            role: "user",
            content: message,
        }],
    }
}

/// Joins every text block; tool-use and other block kinds are ignored
pub(super) fn reply_text(response: MessagesResponse) -> Option<String> {
    let text = response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<String>();

    (!text.is_empty()).then_some(text)
}
