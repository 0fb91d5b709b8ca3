use super::{ChatMessage, ChatRequest, ChatResponse, LlmError, Role};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenRouter's meta-model; it picks a concrete model upstream.
pub const AUTO_MODEL: &str = "openrouter/auto";

const REFERER: &str = "https://poehali.dev";
const TITLE: &str = "AI Chat Assistant";

#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// OpenAI-style completion body. GigaChat speaks the same dialect, so the
/// type is shared with that adapter.
#[derive(Debug, Serialize)]
pub(crate) struct OpenAiRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<OpenAiMessage<'a>>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<&'static str>,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

pub(crate) fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

impl<'a> OpenAiRequest<'a> {
    pub(crate) fn new(request: &'a ChatRequest) -> Self {
        let settings = &request.settings;
        Self {
            model: &request.model,
            messages: request.messages.iter().map(OpenAiMessage::from).collect(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            top_p: settings.top_p,
            top_k: settings.top_k,
            frequency_penalty: settings.frequency_penalty,
            presence_penalty: settings.presence_penalty,
            repetition_penalty: settings.repetition_penalty,
            route: None,
            stream: false,
        }
    }
}

impl<'a> From<&'a ChatMessage> for OpenAiMessage<'a> {
    fn from(message: &'a ChatMessage) -> Self {
        Self {
            role: role_name(message.role),
            content: &message.content,
        }
    }
}

/// Turn an HTTP response into completion text: non-2xx becomes
/// [`LlmError::Api`], a body without a choice becomes [`LlmError::Parse`].
pub(crate) async fn read_completion(resp: Response) -> Result<String, LlmError> {
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        return Err(LlmError::Api {
            status,
            message: text,
        });
    }

    let text = resp.text().await?;
    parse_completion(&text)
}

pub(crate) fn parse_completion(body: &str) -> Result<String, LlmError> {
    let data: OpenAiResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;
    data.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::Parse("response has no choices".to_string()))
}

pub async fn chat(
    client: &Client,
    config: &OpenRouterConfig,
    request: &ChatRequest,
) -> Result<ChatResponse, LlmError> {
    let mut body = OpenAiRequest::new(request);
    if request.model == AUTO_MODEL {
        body.route = Some("fallback");
    }

    let resp = client
        .post(format!("{}/chat/completions", config.base_url))
        .bearer_auth(&config.api_key)
        .header("HTTP-Referer", REFERER)
        .header("X-Title", TITLE)
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
