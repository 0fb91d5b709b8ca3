use super::{ok_json, parse_body, ApiError};
use crate::llm::dispatch::{
    AttemptFailure, Dispatch, DispatchRequest, Dispatcher, ProviderConfig, ProviderSelection,
};
use crate::llm::{ChatMessage, GenerationSettings};
use crate::AppState;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Body of `POST /api/chat`. Either `models` (several providers) or
/// `apiKey` (one OpenRouter key in auto mode) supplies the credentials.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub message: Option<String>,
    pub api_key: Option<String>,
    pub models: Option<Map<String, Value>>,
    pub history: Option<Vec<ChatMessage>>,
    pub settings: Option<GenerationSettings>,
    pub knowledge_context: Option<String>,
    pub selected_model: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderEntry {
    #[serde(default)]
    enabled: bool,
    #[serde(default, alias = "apiKey")]
    key: Option<String>,
}

impl ChatPayload {
    pub fn into_dispatch(self) -> Result<DispatchRequest, ApiError> {
        let settings = self.settings.unwrap_or_default();
        settings.validate().map_err(ApiError::BadRequest)?;

        let providers = match self.models {
            Some(models) => ProviderSelection::Fallback(provider_configs(models)?),
            None => ProviderSelection::Auto {
                api_key: self.api_key.unwrap_or_default(),
            },
        };

        Ok(DispatchRequest {
            message: self.message.unwrap_or_default(),
            history: self.history.unwrap_or_default(),
            settings,
            providers,
            knowledge_context: self.knowledge_context,
            selected_model: self.selected_model,
        })
    }
}

/// Map iteration follows the order the caller wrote the keys in.
fn provider_configs(models: Map<String, Value>) -> Result<Vec<ProviderConfig>, ApiError> {
    models
        .into_iter()
        .map(|(name, value)| {
            let entry: ProviderEntry = serde_json::from_value(value).map_err(|e| {
                ApiError::BadRequest(format!("Invalid configuration for {}: {}", name, e))
            })?;
            Ok(ProviderConfig {
                name,
                enabled: entry.enabled,
                api_key: entry.key.unwrap_or_default(),
            })
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_used: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<AttemptFailure>,
}

impl From<Dispatch> for ChatReply {
    fn from(dispatch: Dispatch) -> Self {
        let fallback_used = dispatch.fallback_used().then_some(true);
        Self {
            response: dispatch.response,
            model: dispatch.model,
            fallback_used,
            errors: dispatch.failures,
        }
    }
}

pub async fn send(state: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse, ApiError> {
    let payload: ChatPayload = parse_body(&body)?;
    if let Some(user) = payload.user_id.as_deref() {
        debug!("Chat request for user {}", user);
    }

    let request = payload.into_dispatch()?;
    let dispatch = Dispatcher::new(&state.config).dispatch(&request).await?;
    Ok(ok_json(ChatReply::from(dispatch)))
}

pub async fn preflight() -> HttpResponse {
    super::preflight("POST, OPTIONS")
}
