use super::openrouter::{read_completion, OpenAiRequest};
use super::{ChatRequest, ChatResponse, LlmError};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const SCOPE: &str = "GIGACHAT_API_PERS";

#[derive(Debug, Clone)]
pub struct GigaChatConfig {
    /// Base64 `client_id:client_secret` pair issued by Sber AI Studio.
    pub credentials: String,
    pub auth_url: String,
    pub base_url: String,
    pub timeout: Duration,
    pub token_timeout: Duration,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchange the stored credentials for a short-lived access token. The
/// token is used for a single completion and never cached.
async fn fetch_access_token(client: &Client, config: &GigaChatConfig) -> Result<String, LlmError> {
    let rq_uid = uuid::Uuid::new_v4().to_string();
    debug!("Requesting GigaChat access token (RqUID {})", rq_uid);

    let resp = client
        .post(&config.auth_url)
        .header("Authorization", format!("Basic {}", config.credentials))
        .header("RqUID", rq_uid)
        .header("Accept", "application/json")
        .timeout(config.token_timeout)
        .form(&[("scope", SCOPE)])
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        return Err(LlmError::Api {
            status,
            message: text,
        });
    }

    let data: TokenResponse = resp
        .json()
        .await
        .map_err(|e| LlmError::Parse(e.to_string()))?;
    Ok(data.access_token)
}

pub async fn chat(client: &Client, config: &GigaChatConfig, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
    let token = fetch_access_token(client, config)
        .await
        .map_err(|e| LlmError::Token(Box::new(e)))?;

    // GigaChat does not accept these sampling fields.
    let mut body = OpenAiRequest::new(request);
    body.top_k = None;
    body.frequency_penalty = None;
    body.presence_penalty = None;

    let resp = client
        .post(format!("{}/chat/completions", config.base_url))
        .bearer_auth(token)
        .header("Accept", "application/json")
        .timeout(config.timeout)
        .json(&body)
        .send()
        .await?;

    let content = read_completion(resp).await?;
    Ok(ChatResponse {
        content,
        model: request.model.clone(),
    })
}
