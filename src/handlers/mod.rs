pub mod chat;
pub mod knowledge;

use crate::db::KnowledgeError;
use crate::llm::catalog;
use crate::llm::dispatch::{AttemptFailure, DispatchError};
use actix_web::error::BlockingError;
use actix_web::http::{Method, StatusCode};
use actix_web::{web, HttpResponse, Responder, ResponseError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::error;

const ALLOW_ORIGIN: (&str, &str) = ("Access-Control-Allow-Origin", "*");

/// Every error leaving a handler passes through here and becomes a JSON
/// `{error, details?}` body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("{message}")]
    Internal {
        message: String,
        details: Option<Vec<AttemptFailure>>,
    },
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal {
            message: message.into(),
            details: None,
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({ "error": self.to_string() });
        if let ApiError::Internal { message, details } = self {
            error!("Request failed: {}", message);
            if let Some(details) = details {
                body["details"] = json!(details);
            }
        }
        HttpResponse::build(self.status_code())
            .insert_header(ALLOW_ORIGIN)
            .json(body)
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(message) => ApiError::BadRequest(message),
            DispatchError::NoModels => ApiError::BadRequest(err.to_string()),
            DispatchError::Fatal { failure, mut earlier } => {
                let message = failure.message.clone();
                earlier.push(failure);
                ApiError::Internal {
                    message,
                    details: Some(earlier),
                }
            }
            DispatchError::Exhausted(failures) => ApiError::Internal {
                message: "All models failed".to_string(),
                details: Some(failures),
            },
        }
    }
}

impl From<KnowledgeError> for ApiError {
    fn from(err: KnowledgeError) -> Self {
        match err {
            KnowledgeError::Validation(message) => ApiError::BadRequest(message.to_string()),
            KnowledgeError::Database(_) => ApiError::internal(err.to_string()),
        }
    }
}

impl From<BlockingError> for ApiError {
    fn from(err: BlockingError) -> Self {
        ApiError::internal(err.to_string())
    }
}

/// Parse a JSON request body. An empty body reads as `{}`.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let parsed = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_slice(b"{}")
    } else {
        serde_json::from_slice(body)
    };
    parsed.map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))
}

pub(crate) fn ok_json(body: impl Serialize) -> HttpResponse {
    HttpResponse::Ok().insert_header(ALLOW_ORIGIN).json(body)
}

/// CORS preflight answer: 200, empty body.
pub(crate) fn preflight(methods: &'static str) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header(ALLOW_ORIGIN)
        .insert_header(("Access-Control-Allow-Methods", methods))
        .insert_header(("Access-Control-Allow-Headers", "Content-Type"))
        .insert_header(("Access-Control-Max-Age", "86400"))
        .finish()
}

async fn method_not_allowed() -> Result<HttpResponse, ApiError> {
    Err(ApiError::MethodNotAllowed)
}

pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub async fn list_models() -> impl Responder {
    ok_json(json!({ "models": catalog::MODELS }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::resource("/chat")
                    .route(web::post().to(chat::send))
                    .route(web::method(Method::OPTIONS).to(chat::preflight))
                    .default_service(web::to(method_not_allowed)),
            )
            .service(
                web::resource("/knowledge")
                    .route(web::get().to(knowledge::list))
                    .route(web::post().to(knowledge::post))
                    .route(web::delete().to(knowledge::delete))
                    .route(web::method(Method::OPTIONS).to(knowledge::preflight))
                    .default_service(web::to(method_not_allowed)),
            )
            .route("/models", web::get().to(list_models)),
    )
    .route("/health", web::get().to(health_check));
}
