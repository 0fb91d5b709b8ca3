use super::{ChatMessage, ChatRequest, ChatResponse, LlmError, Role};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiInstruction<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiInstruction<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

/// Gemini has no system role inside `contents`: the leading system message
/// becomes `systemInstruction` and any system turn from history is sent as
/// user text.
fn role_name(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        Role::User | Role::System => "user",
    }
}

fn build_request(request: &ChatRequest) -> GeminiRequest<'_> {
    let (system, rest): (Option<&ChatMessage>, &[ChatMessage]) = match request.messages.split_first() {
        Some((first, rest)) if first.role == Role::System => (Some(first), rest),
        _ => (None, &request.messages[..]),
    };

    let contents = rest
        .iter()
        .map(|m| GeminiContent {
            role: role_name(m.role),
            parts: vec![GeminiPart { text: &m.content }],
        })
        .collect();

    let settings = &request.settings;
    GeminiRequest {
        contents,
        system_instruction: system.map(|m| GeminiInstruction {
            parts: vec![GeminiPart { text: &m.content }],
        }),
        generation_config: GenerationConfig {
            temperature: settings.temperature,
            max_output_tokens: settings.max_tokens,
            top_p: settings.top_p,
            top_k: settings.top_k,
            frequency_penalty: settings.frequency_penalty,
            presence_penalty: settings.presence_penalty,
        },
    }
}

fn parse_response(body: &str) -> Result<String, LlmError> {
    let data: GeminiResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Parse(e.to_string()))?;
    data.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
        .ok_or_else(|| LlmError::Parse("response has no candidates".to_string()))
}

pub async fn chat(client: &Client, config: &GeminiConfig, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
    let body = build_request(request);

    let resp = client
        .post(format!(
            "{}/models/{}:generateContent",
            config.base_url, request.model
        ))
        .query(&[("key", config.api_key.as_str())])
        .timeout(config.timeout)
        .json(&body)
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

    let text = resp.text().await?;
    let content = parse_response(&text)?;

    Ok(ChatResponse {
        content,
        model: request.model.clone(),
    })
}
