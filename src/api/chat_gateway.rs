//! Outbound client for the AI chat gateway. The gateway speaks the common
//! chat-completions protocol and streams tokens back as SSE.

use reqwest::Client;
use serde::Serialize;

use crate::core::{app_error::AppError, config::ChatConfig};

#[derive(Serialize, Debug, Clone)]
pub struct ChatCompletionMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize)]
struct ChatCompletionReq<'a> {
    model: &'a str,
    messages: &'a [ChatCompletionMessage],
    stream: bool,
}

/// Opens a streaming chat completion against the configured gateway and
/// returns the raw response for the caller to re-stream.
pub async fn stream_chat_completion(
    client: &Client,
    config: &ChatConfig,
    messages: &[ChatCompletionMessage],
) -> Result<reqwest::Response, AppError> {
    let gateway_url = config
        .gateway_url
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnreachable("AIGateway".to_string()))?;

    let mut request = client
        .post(format!("{gateway_url}/v1/chat/completions"))
        .json(&ChatCompletionReq {
            model: &config.model,
            messages,
            stream: true,
        });
    if let Some(api_key) = &config.api_key {
        request = request.bearer_auth(api_key);
    }

    let response = request
        .send()
        .await
        .map_err(|_| AppError::ServiceUnreachable("AIGateway".to_string()))?;

    if !response.status().is_success() {
        tracing::error!("AI gateway returned {}", response.status());
        return Err(AppError::ServiceUnreachable("AIGateway".to_string()));
    }

    Ok(response)
}
