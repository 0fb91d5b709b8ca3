use super::openrouter::AUTO_MODEL;
use super::ProviderKind;
use serde::Serialize;

/// A provider name the front-end can enable, and where it is served from.
///
/// The caller's key must belong to the upstream named by `kind`. `gemini`
/// goes to Google's Generative Language API and needs a Google AI Studio
/// key, not an OpenRouter `sk-or-v1-` key. `gigachat` takes the Base64
/// client credentials for the OAuth exchange. The rest take an OpenRouter key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelSpec {
    #[serde(rename = "id")]
    pub name: &'static str,
    #[serde(rename = "name")]
    pub display_name: &'static str,
    #[serde(skip)]
    pub kind: ProviderKind,
    #[serde(rename = "model")]
    pub upstream_model: &'static str,
}

pub const MODELS: &[ModelSpec] = &[
    ModelSpec {
        name: "gemini",
        display_name: "Gemini Flash",
        kind: ProviderKind::Gemini,
        upstream_model: "gemini-2.0-flash",
    },
    ModelSpec {
        name: "llama",
        display_name: "Llama 3.1",
        kind: ProviderKind::OpenRouter,
        upstream_model: "meta-llama/llama-3.1-8b-instruct",
    },
    ModelSpec {
        name: "gigachat",
        display_name: "GigaChat",
        kind: ProviderKind::GigaChat,
        upstream_model: "GigaChat",
    },
    ModelSpec {
        name: "phi",
        display_name: "Phi-3.5",
        kind: ProviderKind::OpenRouter,
        upstream_model: "microsoft/phi-3.5-mini-128k-instruct",
    },
    ModelSpec {
        name: "qwen",
        display_name: "Qwen 2.5",
        kind: ProviderKind::OpenRouter,
        upstream_model: "qwen/qwen-2.5-7b-instruct",
    },
    ModelSpec {
        name: "mistral",
        display_name: "Mistral Nemo",
        kind: ProviderKind::OpenRouter,
        upstream_model: "mistralai/mistral-nemo",
    },
];

/// Priority order for single-key auto mode, all on OpenRouter.
pub const AUTO_MODELS: &[&str] = &[
    AUTO_MODEL,
    "meta-llama/llama-3.3-70b-instruct:free",
    "google/gemini-2.0-flash-exp:free",
    "mistralai/mistral-7b-instruct:free",
    "qwen/qwen-2.5-72b-instruct:free",
];

pub fn lookup(name: &str) -> Option<&'static ModelSpec> {
    MODELS.iter().find(|m| m.name.eq_ignore_ascii_case(name.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup("GigaChat").map(|m| m.kind), Some(ProviderKind::GigaChat));
        assert_eq!(lookup(" qwen ").map(|m| m.upstream_model), Some("qwen/qwen-2.5-7b-instruct"));
        assert!(lookup("gpt-5").is_none());
    }

    #[test]
    fn auto_list_starts_with_router_model() {
        assert_eq!(AUTO_MODELS.first(), Some(&AUTO_MODEL));
        assert!(AUTO_MODELS[1..].iter().all(|m| m.ends_with(":free")));
    }

    #[test]
    fn catalog_serializes_without_kind() {
        let value = serde_json::to_value(MODELS[0]).unwrap();
        assert_eq!(value, serde_json::json!({
            "id": "gemini",
            "name": "Gemini Flash",
            "model": "gemini-2.0-flash",
        }));
    }
}
