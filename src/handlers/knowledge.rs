use super::{ok_json, parse_body, ApiError};
use crate::db::models::{FileId, NewKnowledgeFile};
use crate::db::{KnowledgeStore, DEFAULT_USER};
use crate::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Body shared by `POST` and `DELETE`. A `POST` without `action` is an upload.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgePayload {
    pub action: Option<String>,
    pub user_id: Option<String>,
    pub filename: Option<String>,
    pub content: Option<String>,
    pub file_type: Option<String>,
    pub file_size: Option<i64>,
    pub file_id: Option<FileId>,
}

fn user_or_default(user_id: Option<String>) -> String {
    user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_USER.to_string())
}

fn store(state: &AppState) -> Result<KnowledgeStore, ApiError> {
    state
        .knowledge
        .clone()
        .ok_or_else(|| ApiError::internal("DATABASE_URL not configured"))
}

pub async fn list(
    state: web::Data<AppState>,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse, ApiError> {
    let store = store(&state)?;
    let user = user_or_default(query.into_inner().user_id);
    let files = web::block(move || store.list(&user)).await??;
    Ok(ok_json(json!({ "files": files })))
}

pub async fn post(state: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse, ApiError> {
    let store = store(&state)?;
    let payload: KnowledgePayload = parse_body(&body)?;
    let user = user_or_default(payload.user_id);

    match payload.action.as_deref().unwrap_or("upload") {
        "upload" => {
            let file = NewKnowledgeFile {
                filename: payload.filename.unwrap_or_default(),
                content: payload.content.unwrap_or_default(),
                file_type: payload.file_type,
                file_size: payload.file_size,
            };
            let id = web::block(move || store.upload(&user, &file)).await??;
            Ok(ok_json(json!({ "success": true, "fileId": id })))
        }
        "getContext" => {
            let context = web::block(move || store.context(&user)).await??;
            Ok(ok_json(json!({ "context": context })))
        }
        other => Err(ApiError::BadRequest(format!("Unknown action: {}", other))),
    }
}

pub async fn delete(state: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse, ApiError> {
    let store = store(&state)?;
    let payload: KnowledgePayload = parse_body(&body)?;
    let user = user_or_default(payload.user_id);
    let Some(file_id) = payload.file_id else {
        return Err(ApiError::BadRequest("File ID required".to_string()));
    };

    web::block(move || store.delete(&user, &file_id)).await??;
    Ok(ok_json(json!({ "success": true })))
}

pub async fn preflight() -> HttpResponse {
    super::preflight("GET, POST, DELETE, OPTIONS")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::handlers::configure;
    use actix_web::http::{Method, StatusCode};
    use actix_web::{test, App};
    use serde_json::Value;
    use tempfile::TempDir;

    macro_rules! app {
        ($config:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(AppState::new($config)))
                    .configure(configure),
            )
            .await
        };
    }

    fn config_with_db() -> (TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database_path: Some(dir.path().join("kb.sqlite")),
            ..Config::default()
        };
        (dir, config)
    }

    fn post_json(body: Value) -> test::TestRequest {
        test::TestRequest::post().uri("/api/knowledge").set_json(body)
    }

    #[actix_web::test]
    async fn upload_list_context_delete() {
        let (_dir, config) = config_with_db();
        let app = app!(config);

        let req = post_json(json!({
            "action": "upload",
            "userId": "alice",
            "filename": "notes.txt",
            "content": "remember the milk",
        }))
        .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        let file_id = body["fileId"].as_i64().unwrap();

        let req = test::TestRequest::get()
            .uri("/api/knowledge?userId=alice")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let files = body["files"].as_array().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["id"], file_id);
        assert_eq!(files[0]["filename"], "notes.txt");
        assert_eq!(files[0]["fileType"], "text");
        assert_eq!(files[0]["fileSize"], 17);
        assert!(files[0].get("content").is_none());

        let req = post_json(json!({"action": "getContext", "userId": "alice"})).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["context"], "--- File: notes.txt ---\nremember the milk");

        let req = test::TestRequest::delete()
            .uri("/api/knowledge")
            .set_json(json!({"fileId": file_id.to_string(), "userId": "alice"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);

        let req = test::TestRequest::get()
            .uri("/api/knowledge?userId=alice")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["files"].as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn missing_user_falls_back_to_default() {
        let (_dir, config) = config_with_db();
        let app = app!(config);

        let req = post_json(json!({"action": "upload", "filename": "a.txt", "content": "x"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/api/knowledge?userId=default")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["files"].as_array().unwrap().len(), 1);

        let req = test::TestRequest::get().uri("/api/knowledge").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["files"].as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn bad_requests_are_400() {
        let (_dir, config) = config_with_db();
        let app = app!(config);

        let cases = [
            json!({"action": "upload", "filename": "a.txt"}),
            json!({"action": "rename"}),
            json!({}),
        ];
        for case in cases {
            let resp = test::call_service(&app, post_json(case).to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }

        let req = test::TestRequest::delete()
            .uri("/api/knowledge")
            .set_json(json!({"userId": "alice"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "File ID required");

        let req = test::TestRequest::delete()
            .uri("/api/knowledge")
            .set_json(json!({"fileId": 0, "userId": "alice"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn preflight_lists_all_methods_with_empty_body() {
        let app = app!(Config::default());
        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/api/knowledge")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers();
        assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*");
        assert_eq!(
            headers.get("access-control-allow-methods").unwrap(),
            "GET, POST, DELETE, OPTIONS"
        );
        assert_eq!(headers.get("access-control-max-age").unwrap(), "86400");
        assert!(test::read_body(resp).await.is_empty());
    }

    #[actix_web::test]
    async fn unconfigured_database_is_500() {
        let app = app!(Config::default());
        let req = test::TestRequest::get().uri("/api/knowledge").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "DATABASE_URL not configured");
    }

    #[actix_web::test]
    async fn unsupported_method_is_405() {
        let app = app!(Config::default());
        let req = test::TestRequest::put().uri("/api/knowledge").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
