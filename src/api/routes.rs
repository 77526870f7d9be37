use std::path::Path;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{services::ServeFile, trace::TraceLayer};

use super::handlers;
use super::state::AppState;

pub fn create_router(state: AppState, index_page: &Path) -> Router {
    Router::new()
        .route_service("/", ServeFile::new(index_page))
        .route("/api/generate", post(handlers::generate))
        .route(
            "/api/history",
            get(handlers::get_history)
                .post(handlers::replace_history)
                .delete(handlers::clear_history),
        )
        .route(
            "/api/histories",
            get(handlers::list_histories).post(handlers::save_histories),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::providers::OllamaProvider;
    use crate::services::{Database, LegacyHistory, RelayService};

    struct Harness {
        _dir: tempfile::TempDir,
        db: Database,
        router: Router,
    }

    async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index.html");
        std::fs::write(&index, "<html>chat</html>").unwrap();

        // Nothing listens here; relay requests fail fast.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let upstream = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let db = Database::new_in_memory().unwrap();
        let state = AppState::new(
            db.clone(),
            LegacyHistory::new(dir.path().join("chat_history.json")),
            RelayService::new(Arc::new(OllamaProvider::new(&upstream)), "deepseek-r1:8b"),
        );
        let router = create_router(state, &index);

        Harness {
            _dir: dir,
            db,
            router,
        }
    }

    async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, String) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_histories_round_trip() {
        let h = harness().await;

        let (status, body) = send(&h.router, Method::GET, "/api/histories", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "[]");

        let (status, body) = send(
            &h.router,
            Method::POST,
            "/api/histories",
            Some(json!([
                {"id": "a", "timestamp": "2025-01-01T00:00:00", "title": "A",
                 "messages": [{"role": "user", "content": "hi", "timestamp": "2025-01-01T00:00:01"}]},
                {"id": "b", "timestamp": "2025-02-01T00:00:00", "title": "B", "messages": []}
            ])),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"status": "success"}));

        let (_, body) = send(&h.router, Method::GET, "/api/histories", None).await;
        assert_eq!(
            serde_json::from_str::<Value>(&body).unwrap(),
            json!([
                {"id": "b", "timestamp": "2025-02-01T00:00:00", "title": "B", "messages": []},
                {"id": "a", "timestamp": "2025-01-01T00:00:00", "title": "A",
                 "messages": [{"role": "user", "content": "hi", "timestamp": "2025-01-01T00:00:01"}]}
            ])
        );
    }

    #[tokio::test]
    async fn test_save_storage_failure_is_structured_500() {
        let h = harness().await;
        h.db.conn_ref()
            .lock()
            .unwrap()
            .execute_batch("DROP TABLE messages;")
            .unwrap();

        let (status, body) = send(
            &h.router,
            Method::POST,
            "/api/histories",
            Some(json!([{"id": "a", "messages": [{"role": "user", "content": "x"}]}])),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"], "Database error");
        assert!(body["message"].as_str().unwrap().contains("messages"));

        // The chat row from the failed batch was rolled back.
        let (status, body) = send(&h.router, Method::GET, "/api/histories", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"], "Database error");
        let chats: i64 = h
            .db
            .conn_ref()
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM chats", [], |row| row.get(0))
            .unwrap();
        assert_eq!(chats, 0);
    }

    #[tokio::test]
    async fn test_malformed_histories_body_is_rejected() {
        let h = harness().await;
        let (status, body) = send(
            &h.router,
            Method::POST,
            "/api/histories",
            Some(json!([{"id": "a", "messages": [{"content": "no role"}]}])),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"], "Invalid request");
    }

    #[tokio::test]
    async fn test_legacy_history_endpoints() {
        let h = harness().await;

        let (_, body) = send(&h.router, Method::GET, "/api/history", None).await;
        assert_eq!(body, "[]");

        let doc = json!([{"role": "user", "content": "hello"}]);
        let (status, _) = send(&h.router, Method::POST, "/api/history", Some(doc.clone())).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&h.router, Method::GET, "/api/history", None).await;
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), doc);

        let (status, body) = send(&h.router, Method::DELETE, "/api/history", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"status": "success"}));

        let (_, body) = send(&h.router, Method::GET, "/api/history", None).await;
        assert_eq!(body, "[]");
    }

    #[tokio::test]
    async fn test_generate_streams_info_then_error() {
        let h = harness().await;
        let response = h
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/generate")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"prompt": "hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        let events: Vec<&str> = body
            .split("\n\n")
            .filter(|e| !e.is_empty())
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], "data: [Using model: deepseek-r1:8b]");
        assert!(events[1].starts_with("data: [ERROR] "));
    }

    #[tokio::test]
    async fn test_index_page_is_served() {
        let h = harness().await;
        let (status, body) = send(&h.router, Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<html>chat</html>");
    }
}
