//! Ordered fallback across providers.
//!
//! Candidates are tried one at a time in priority order. Expected failures
//! (timeouts, HTTP errors, malformed bodies) are recorded as
//! [`AttemptFailure`] values and the loop moves on; the first success ends
//! the dispatch. A rejected credential is fatal in single-key auto mode and
//! only disqualifies that credential in multi-provider mode.

use super::catalog::{self, AUTO_MODELS};
use super::{
    build_messages, mask_key, router, ChatMessage, ChatRequest, GenerationSettings, LlmError,
    Provider, ProviderKind,
};
use crate::config::Config;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

/// `selectedModel` value asking for query-type routing.
pub const SMART_SELECTION: &str = "smart";

/// A provider entry as the caller configured it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub name: String,
    pub enabled: bool,
    pub api_key: String,
}

impl ProviderConfig {
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderSelection {
    /// Several named providers, tried in declaration order.
    Fallback(Vec<ProviderConfig>),
    /// One OpenRouter key, tried against the built-in model list.
    Auto { api_key: String },
}

#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub message: String,
    pub history: Vec<ChatMessage>,
    pub settings: GenerationSettings,
    pub providers: ProviderSelection,
    pub knowledge_context: Option<String>,
    pub selected_model: Option<String>,
}

/// One (provider, model) pairing with its credential.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Name reported back to the caller: the provider name in fallback mode,
    /// the upstream model id in auto mode.
    pub label: String,
    pub model: String,
    pub provider: Provider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    InvalidResponse,
    Unauthorized,
    RateLimited,
    PaymentRequired,
    Http(u16),
    Network,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptFailure {
    #[serde(rename = "model")]
    pub label: String,
    #[serde(skip)]
    pub kind: FailureKind,
    #[serde(rename = "error")]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptResult {
    Success(String),
    Failure(AttemptFailure),
}

/// How a 401 from a candidate affects the rest of the dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Stop immediately; every remaining candidate shares the bad key.
    Abort,
    /// Skip later candidates using the same adapter and key.
    SkipCredential,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub response: String,
    pub model: String,
    /// Failures before the successful candidate, in attempt order.
    pub failures: Vec<AttemptFailure>,
}

impl Dispatch {
    pub fn fallback_used(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("{0}")]
    Validation(String),
    #[error("no models configured")]
    NoModels,
    /// A credential rejection in auto mode. `earlier` holds the failures
    /// recorded before it, in attempt order.
    #[error("{}: {}", .failure.label, .failure.message)]
    Fatal {
        failure: AttemptFailure,
        earlier: Vec<AttemptFailure>,
    },
    #[error("all models failed")]
    Exhausted(Vec<AttemptFailure>),
}

pub fn classify(err: &LlmError) -> FailureKind {
    match err {
        LlmError::Http(e) if e.is_timeout() => FailureKind::Timeout,
        LlmError::Http(e) if e.is_decode() => FailureKind::InvalidResponse,
        LlmError::Http(_) => FailureKind::Network,
        LlmError::Api { status: 401, .. } => FailureKind::Unauthorized,
        LlmError::Api { status: 402, .. } => FailureKind::PaymentRequired,
        LlmError::Api { status: 429, .. } => FailureKind::RateLimited,
        LlmError::Api { status, .. } => FailureKind::Http(*status),
        LlmError::Parse(_) => FailureKind::InvalidResponse,
        LlmError::Token(inner) => classify(inner),
    }
}

fn describe(kind: FailureKind, err: &LlmError) -> String {
    let summary = match kind {
        FailureKind::Timeout => "timeout".to_string(),
        FailureKind::InvalidResponse => "invalid response format".to_string(),
        FailureKind::Unauthorized => "invalid API key (401)".to_string(),
        FailureKind::RateLimited => "rate limit exceeded (429)".to_string(),
        FailureKind::PaymentRequired => "payment required (402)".to_string(),
        FailureKind::Http(_) | FailureKind::Network => match err {
            LlmError::Token(inner) => inner.to_string(),
            other => other.to_string(),
        },
    };
    match err {
        LlmError::Token(_) => format!("token exchange failed: {}", summary),
        _ => summary,
    }
}

pub struct Dispatcher {
    config: Config,
    client: Client,
}

impl Dispatcher {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            client: Client::new(),
        }
    }

    pub async fn dispatch(&self, request: &DispatchRequest) -> Result<Dispatch, DispatchError> {
        if request.message.trim().is_empty() {
            return Err(DispatchError::Validation("message required".to_string()));
        }

        let (candidates, policy) = self.plan(request);
        if candidates.is_empty() {
            return Err(DispatchError::NoModels);
        }
        info!(
            "Dispatching to {} candidate(s): {}",
            candidates.len(),
            candidates
                .iter()
                .map(|c| c.label.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let messages = build_messages(
            &request.message,
            &request.history,
            request.settings.system_prompt.as_deref(),
            request.knowledge_context.as_deref(),
        );

        let mut failures = Vec::new();
        let mut rejected: Vec<(ProviderKind, String)> = Vec::new();

        for candidate in &candidates {
            let kind = candidate.provider.kind();
            let key = candidate.provider.credential();
            if rejected.iter().any(|(k, rejected_key)| *k == kind && rejected_key == key) {
                warn!("Skipping {}: credential already rejected", candidate.label);
                continue;
            }

            match self.attempt(candidate, &messages, &request.settings).await {
                AttemptResult::Success(response) => {
                    info!(
                        "{} answered after {} failed attempt(s)",
                        candidate.label,
                        failures.len()
                    );
                    return Ok(Dispatch {
                        response,
                        model: candidate.label.clone(),
                        failures,
                    });
                }
                AttemptResult::Failure(failure) => {
                    warn!("{} failed ({:?}): {}", failure.label, failure.kind, failure.message);
                    if failure.kind == FailureKind::Unauthorized {
                        match policy {
                            AuthPolicy::Abort => {
                                return Err(DispatchError::Fatal {
                                    failure,
                                    earlier: failures,
                                })
                            }
                            AuthPolicy::SkipCredential => rejected.push((kind, key.to_string())),
                        }
                    }
                    failures.push(failure);
                }
            }
        }

        Err(DispatchError::Exhausted(failures))
    }

    /// Resolve the ordered candidate list and the 401 policy for a request.
    fn plan(&self, request: &DispatchRequest) -> (Vec<Candidate>, AuthPolicy) {
        let (mut candidates, policy) = match &request.providers {
            ProviderSelection::Fallback(configs) => {
                let candidates = configs
                    .iter()
                    .filter(|c| c.is_usable())
                    .filter_map(|c| {
                        let Some(entry) = catalog::lookup(&c.name) else {
                            warn!("Ignoring unknown provider {:?}", c.name);
                            return None;
                        };
                        debug!("Provider {} enabled with key {}", entry.name, mask_key(&c.api_key));
                        Some(Candidate {
                            label: entry.name.to_string(),
                            model: entry.upstream_model.to_string(),
                            provider: Provider::new(entry.kind, c.api_key.trim().to_string(), &self.config),
                        })
                    })
                    .collect();
                (candidates, AuthPolicy::SkipCredential)
            }
            ProviderSelection::Auto { api_key } => {
                let api_key = api_key.trim();
                let candidates = if api_key.is_empty() {
                    Vec::new()
                } else {
                    AUTO_MODELS
                        .iter()
                        .map(|model| Candidate {
                            label: model.to_string(),
                            model: model.to_string(),
                            provider: Provider::new(ProviderKind::OpenRouter, api_key.to_string(), &self.config),
                        })
                        .collect()
                };
                (candidates, AuthPolicy::Abort)
            }
        };

        match request.selected_model.as_deref().map(str::trim) {
            Some(SMART_SELECTION) if policy == AuthPolicy::SkipCredential => {
                let names: Vec<&str> = candidates.iter().map(|c| c.label.as_str()).collect();
                if let Some(best) = router::best_for(&request.message, &names) {
                    let chosen = candidates.remove(best);
                    info!("Routing {:?} query to {} first", router::analyze_query(&request.message), chosen.label);
                    candidates.insert(0, chosen);
                }
            }
            Some(selected) if !selected.is_empty() => {
                if candidates.iter().any(|c| c.label.eq_ignore_ascii_case(selected)) {
                    candidates.retain(|c| c.label.eq_ignore_ascii_case(selected));
                } else if selected != "auto" {
                    debug!("Selected model {:?} is not available, using full list", selected);
                }
            }
            _ => {}
        }

        (candidates, policy)
    }

    async fn attempt(
        &self,
        candidate: &Candidate,
        messages: &[ChatMessage],
        settings: &GenerationSettings,
    ) -> AttemptResult {
        let request = ChatRequest {
            messages: messages.to_vec(),
            model: candidate.model.clone(),
            settings: settings.clone(),
        };

        match candidate.provider.chat(&self.client, &request).await {
            Ok(response) => AttemptResult::Success(response.content),
            Err(err) => {
                let kind = classify(&err);
                AttemptResult::Failure(AttemptFailure {
                    label: candidate.label.clone(),
                    kind,
                    message: describe(kind, &err),
                })
            }
        }
    }
}
