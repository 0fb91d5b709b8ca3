pub mod catalog;
pub mod dispatch;
pub mod gemini;
pub mod gigachat;
pub mod openrouter;
pub mod router;

use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Number of prior turns forwarded to a provider.
pub const HISTORY_WINDOW: usize = 10;

/// Header placed between the system prompt and the knowledge base text.
pub const KNOWLEDGE_HEADER: &str = "Knowledge base:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    /// Gemini calls this role `model`; both spellings are accepted.
    #[serde(alias = "model")]
    Assistant,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Generation parameters recognised by the relay. Anything else the caller
/// sends is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub repetition_penalty: Option<f32>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            system_prompt: None,
            top_p: None,
            top_k: None,
            frequency_penalty: None,
            presence_penalty: None,
            repetition_penalty: None,
        }
    }
}

impl GenerationSettings {
    pub fn validate(&self) -> Result<(), String> {
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            ));
        }
        if self.max_tokens == 0 {
            return Err("max_tokens must be positive".to_string());
        }
        if let Some(top_p) = self.top_p {
            if !top_p.is_finite() || top_p <= 0.0 || top_p > 1.0 {
                return Err(format!("top_p must be in (0, 1], got {}", top_p));
            }
        }
        Ok(())
    }
}

/// A provider-neutral completion request. Adapters translate it to their
/// own envelope.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub settings: GenerationSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
}

/// Assemble the message list sent to every candidate: the system message
/// (prompt plus knowledge context) if any, the last [`HISTORY_WINDOW`]
/// turns, then the new user message.
pub fn build_messages(
    message: &str,
    history: &[ChatMessage],
    system_prompt: Option<&str>,
    knowledge_context: Option<&str>,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(HISTORY_WINDOW + 2);

    let prompt = system_prompt.map(str::trim).unwrap_or_default();
    let knowledge = knowledge_context.map(str::trim).unwrap_or_default();
    let system = match (prompt.is_empty(), knowledge.is_empty()) {
        (true, true) => None,
        (false, true) => Some(prompt.to_string()),
        (true, false) => Some(format!("{}\n{}", KNOWLEDGE_HEADER, knowledge)),
        (false, false) => Some(format!("{}\n\n{}\n{}", prompt, KNOWLEDGE_HEADER, knowledge)),
    };
    if let Some(system) = system {
        messages.push(ChatMessage::new(Role::System, system));
    }

    let skip = history.len().saturating_sub(HISTORY_WINDOW);
    messages.extend(history.iter().skip(skip).cloned());
    messages.push(ChatMessage::new(Role::User, message));
    messages
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenRouter,
    Gemini,
    GigaChat,
}

/// Closed set of provider adapters. Each variant carries its own endpoint
/// and credential.
#[derive(Debug, Clone)]
pub enum Provider {
    OpenRouter(openrouter::OpenRouterConfig),
    Gemini(gemini::GeminiConfig),
    GigaChat(gigachat::GigaChatConfig),
}

impl Provider {
    pub fn new(kind: ProviderKind, api_key: String, config: &crate::config::Config) -> Self {
        let endpoints = &config.endpoints;
        match kind {
            ProviderKind::OpenRouter => Provider::OpenRouter(openrouter::OpenRouterConfig {
                api_key,
                base_url: endpoints.openrouter.clone(),
                timeout: config.completion_timeout,
            }),
            ProviderKind::Gemini => Provider::Gemini(gemini::GeminiConfig {
                api_key,
                base_url: endpoints.gemini.clone(),
                timeout: config.completion_timeout,
            }),
            ProviderKind::GigaChat => Provider::GigaChat(gigachat::GigaChatConfig {
                credentials: api_key,
                auth_url: endpoints.gigachat_auth.clone(),
                base_url: endpoints.gigachat.clone(),
                timeout: config.completion_timeout,
                token_timeout: config.token_timeout,
            }),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::OpenRouter(_) => ProviderKind::OpenRouter,
            Provider::Gemini(_) => ProviderKind::Gemini,
            Provider::GigaChat(_) => ProviderKind::GigaChat,
        }
    }

    pub fn credential(&self) -> &str {
        match self {
            Provider::OpenRouter(config) => &config.api_key,
            Provider::Gemini(config) => &config.api_key,
            Provider::GigaChat(config) => &config.credentials,
        }
    }

    pub async fn chat(&self, client: &Client, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        match self {
            Provider::OpenRouter(config) => openrouter::chat(client, config, request).await,
            Provider::Gemini(config) => gemini::chat(client, config, request).await,
            Provider::GigaChat(config) => gigachat::chat(client, config, request).await,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("token exchange failed: {0}")]
    Token(Box<LlmError>),
}

/// Shorten a credential for log output.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(n: usize) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                ChatMessage::new(role, format!("turn {}", i))
            })
            .collect()
    }

    #[test]
    fn keeps_only_last_ten_turns_in_order() {
        let history = turns(15);
        let messages = build_messages("next", &history, None, None);

        assert_eq!(messages.len(), HISTORY_WINDOW + 1);
        let forwarded: Vec<&str> = messages[..HISTORY_WINDOW]
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        let expected: Vec<String> = (5..15).map(|i| format!("turn {}", i)).collect();
        assert_eq!(forwarded, expected);
        assert_eq!(messages.last(), Some(&ChatMessage::new(Role::User, "next")));
    }

    #[test]
    fn short_history_is_forwarded_whole() {
        let messages = build_messages("hi", &turns(3), Some("Be brief"), None);
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0], ChatMessage::new(Role::System, "Be brief"));
        assert_eq!(messages[1].content, "turn 0");
    }

    #[test]
    fn knowledge_context_is_appended_under_header() {
        let messages = build_messages("q", &[], Some("You help."), Some("  facts  "));
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "You help.\n\nKnowledge base:\nfacts");

        let messages = build_messages("q", &[], None, Some("facts"));
        assert_eq!(messages[0].content, "Knowledge base:\nfacts");
    }

    #[test]
    fn blank_system_prompt_adds_no_system_message() {
        let messages = build_messages("q", &[], Some("   "), Some(""));
        assert_eq!(messages, vec![ChatMessage::new(Role::User, "q")]);
    }

    #[test]
    fn model_role_reads_as_assistant() {
        let msg: ChatMessage = serde_json::from_str(r#"{"role":"model","content":"x"}"#).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert!(serde_json::from_str::<ChatMessage>(r#"{"role":"tool","content":"x"}"#).is_err());
    }

    #[test]
    fn settings_defaults_and_validation() {
        let settings: GenerationSettings =
            serde_json::from_str(r#"{"max_tokens": 50, "language": "ru"}"#).unwrap();
        assert_eq!(settings.temperature, 0.7);
        assert_eq!(settings.max_tokens, 50);
        assert!(settings.validate().is_ok());

        let hot = GenerationSettings {
            temperature: 3.5,
            ..Default::default()
        };
        assert!(hot.validate().is_err());

        let zero = GenerationSettings {
            max_tokens: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn masks_keys() {
        assert_eq!(mask_key("sk-or-v1-abcdef123456"), "sk-o...3456");
        assert_eq!(mask_key("short"), "***");
    }
}
