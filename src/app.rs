use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::StorageConfig;
use crate::state::AppState;
use crate::storage::UPLOADS_PREFIX;
use crate::{auth, chat, oauth, projects};

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::router())
        .merge(oauth::router())
        .merge(projects::router())
        .merge(chat::router(state.config.max_upload_bytes))
        .route("/health", get(|| async { "ok" }));

    let mut app = Router::new().nest("/api", api);
    if let StorageConfig::Local { upload_dir } = &state.config.storage {
        app = app.nest_service(UPLOADS_PREFIX, ServeDir::new(upload_dir));
    }

    app.with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::repo_types::Role;
    use crate::testing::register_user;

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    fn json_req(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_req(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, get_req("/api/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("ok".into()));
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let app = build_app(AppState::fake());
        let (status, body) = call(&app, get_req("/api/projects", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Authentication required");

        let (status, _) = call(&app, get_req("/api/chat", Some("garbage"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_login_and_submit_a_project() {
        let app = build_app(AppState::fake());

        let (status, body) = call(
            &app,
            json_req(
                "POST",
                "/api/users/register",
                None,
                json!({"name": "Ada", "email": "ada@x.com", "password": "password1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["role"], "user");
        assert!(body["user"].get("passwordHash").is_none());

        let (status, body) = call(
            &app,
            json_req(
                "POST",
                "/api/users/login",
                None,
                json!({"email": "ada@x.com", "password": "password1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["access_token"].as_str().unwrap().to_string();
        assert!(body["refresh_token"].is_string());

        let project = json!({
            "title": "Blog",
            "description": "Static blog",
            "techStack": "Rust",
            "week": 1
        });
        let (status, body) =
            call(&app, json_req("POST", "/api/projects", Some(&token), project.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "Under Review");
        assert_eq!(body["userName"], "Ada");

        let (status, _) = call(&app, json_req("POST", "/api/projects", Some(&token), project)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = call(&app, get_req("/api/projects", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_project_id_is_bad_request() {
        let state = AppState::fake();
        let (_, tokens) = register_user(&state, "Ada", "ada@x.com", Role::User).await;
        let app = build_app(state);

        let (status, body) = call(
            &app,
            json_req(
                "PUT",
                "/api/projects/not-a-uuid",
                Some(&tokens.access_token),
                json!({"title": "x"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid project ID");
    }

    #[tokio::test]
    async fn malformed_bodies_get_json_errors() {
        let state = AppState::fake();
        let (_, tokens) = register_user(&state, "Ada", "ada@x.com", Role::User).await;
        let app = build_app(state);
        let token = Some(tokens.access_token.as_str());

        let bodies = [
            json!({"title": "t", "description": "d", "techStack": "x"}),
            json!({"title": "t", "description": "d", "techStack": "x", "week": "three"}),
            json!({"title": "t", "description": "d", "techStack": "x", "week": 99999999999u64}),
        ];
        for body in bodies {
            let (status, body) = call(&app, json_req("POST", "/api/projects", token, body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["error"].is_string(), "{body}");
        }

        let (status, body) = call(
            &app,
            json_req("POST", "/api/users/login", None, json!({"email": "ada@x.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string(), "{body}");
    }

    #[tokio::test]
    async fn admin_routes_are_forbidden_to_users() {
        let state = AppState::fake();
        let (_, tokens) = register_user(&state, "Ada", "ada@x.com", Role::User).await;
        let app = build_app(state);
        let id = uuid::Uuid::new_v4();

        let (status, _) = call(
            &app,
            json_req(
                "PUT",
                &format!("/api/admin/projects/{id}/status"),
                Some(&tokens.access_token),
                json!({"status": "Approved"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let hide = Request::builder()
            .method("DELETE")
            .uri(format!("/api/admin/projects/{id}"))
            .header(header::AUTHORIZATION, format!("Bearer {}", tokens.access_token))
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(&app, hide).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(&app, get_req("/api/users", Some(&tokens.access_token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn chat_accepts_multipart_and_lists_messages() {
        let state = AppState::fake();
        let (_, tokens) = register_user(&state, "Ada", "ada@x.com", Role::User).await;
        let app = build_app(state);

        let boundary = "XBOUNDARY";
        let form = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"content\"\r\n\r\n\
             hello admin\r\n\
             --{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             some notes\r\n\
             --{boundary}--\r\n"
        );
        let req = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::AUTHORIZATION, format!("Bearer {}", tokens.access_token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(form))
            .unwrap();
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["content"], "hello admin");
        assert_eq!(body["isAdmin"], false);
        assert_eq!(body["fileName"], "notes.txt");
        assert_eq!(body["fileSize"], 10);
        assert!(body["fileUrl"].as_str().unwrap().starts_with("/uploads/chat/"));

        let (status, body) = call(&app, get_req("/api/chat", Some(&tokens.access_token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unconfigured_github_hides_upstream_detail() {
        let app = build_app(AppState::fake());
        let (status, body) = call(
            &app,
            json_req("POST", "/api/github/token", None, json!({"code": "abc"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to exchange code for token");
    }
}
