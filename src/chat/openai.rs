use super::ChatSettings;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub(super) struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
pub(super) struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

pub(super) fn request_body<'a>(
    settings: &'a ChatSettings,
    message: &'a str,
) -> ChatCompletionRequest<'a> {
    let mut messages = Vec::with_capacity(2);
    if !settings.system_prompt.is_empty() {
        messages.push(Message {
            role: "system",
            content: &settings.system_prompt,
        });
    }
    messages.push(Message {
        role: "user",
        content: message,
    });

    ChatCompletionRequest {
        model: &settings.model,
        messages,
    }
}

pub(super) fn reply_text(response: ChatCompletionResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
}
