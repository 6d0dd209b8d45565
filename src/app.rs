use std::{any::Any, io::ErrorKind, net::SocketAddr};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{auth, state::AppState};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .merge(auth::router())
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "message": "API Authentication Service",
        "status": "running",
        "endpoints": {
            "auth": {
                "register": "/register [POST]",
                "login": "/login [POST]"
            },
            "protected": "/protected [GET] (requires token)"
        }
    }))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic"
    };
    tracing::error!(panic = %detail, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "internal server error" })),
    )
        .into_response()
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == ErrorKind::AddrInUse => {
            tracing::error!(%addr, "port {} is already in use", port);
            tracing::error!("stop the other process bound to this port, or set PORT to a free one");
            return Err(e.into());
        }
        Err(e) => {
            tracing::error!(error = %e, %addr, "server error");
            return Err(e.into());
        }
    };

    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request},
    };
    use time::OffsetDateTime;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::repo_types::User;

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with_auth(auth: Option<&str>) -> Request<Body> {
        let mut req = Request::get("/protected");
        if let Some(v) = auth {
            req = req.header(header::AUTHORIZATION, v);
        }
        req.body(Body::empty()).unwrap()
    }

    async fn register_and_login(app: &Router, email: &str, password: &str) -> serde_json::Value {
        let creds = json!({ "email": email, "password": password });
        let (status, _) = send(app, post_json("/register", creds.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = send(app, post_json("/login", creds)).await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    #[tokio::test]
    async fn index_describes_endpoints() {
        let app = build_app(AppState::fake());
        let req = Request::get("/").body(Body::empty()).unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");
        assert_eq!(body["endpoints"]["auth"]["login"], "/login [POST]");
    }

    #[tokio::test]
    async fn register_login_and_access_protected() {
        let app = build_app(AppState::fake());
        let body = register_and_login(&app, "flow@example.com", "pa55word").await;

        assert_eq!(body["user"]["email"], "flow@example.com");
        assert!(body["user"]["id"].is_string());
        assert!(body["user"]["createdAt"].is_string());
        assert!(!body.to_string().contains("argon2"));
        assert!(!body.to_string().contains("pa55word"));

        let token = body["token"].as_str().unwrap();
        let (status, body) =
            send(&app, get_with_auth(Some(&format!("Bearer {token}")))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "flow@example.com");
    }

    #[tokio::test]
    async fn register_response_does_not_echo_credentials() {
        let app = build_app(AppState::fake());
        let (status, body) = send(
            &app,
            post_json("/register", json!({ "email": "e@example.com", "password": "s3cret!" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["message"].is_string());
        assert!(!body.to_string().contains("s3cret!"));
    }

    #[tokio::test]
    async fn duplicate_register_is_bad_request() {
        let app = build_app(AppState::fake());
        let creds = json!({ "email": "twice@example.com", "password": "pw" });
        let (first, _) = send(&app, post_json("/register", creds.clone())).await;
        let (second, body) = send(&app, post_json("/register", creds)).await;
        assert_eq!(first, StatusCode::CREATED);
        assert_eq!(second, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "user already exists");
    }

    #[tokio::test]
    async fn bad_credentials_share_one_response() {
        let app = build_app(AppState::fake());
        register_and_login(&app, "real@example.com", "correct").await;

        let wrong_pw = send(
            &app,
            post_json("/login", json!({ "email": "real@example.com", "password": "nope" })),
        )
        .await;
        let no_user = send(
            &app,
            post_json("/login", json!({ "email": "ghost@example.com", "password": "correct" })),
        )
        .await;
        assert_eq!(wrong_pw.0, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_pw, no_user);
    }

    #[tokio::test]
    async fn login_missing_fields_is_bad_request() {
        let app = build_app(AppState::fake());
        let (status, body) =
            send(&app, post_json("/login", json!({ "email": "x@example.com" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["received"]["email"], true);
        assert_eq!(body["received"]["password"], false);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let app = build_app(AppState::fake());
        let req = Request::post("/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "invalid request body");
    }

    fn post_form(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn form_encoded_credentials_are_accepted() {
        let app = build_app(AppState::fake());
        let (status, _) = send(
            &app,
            post_form("/register", "email=form%40example.com&password=f0rm-pass"),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            &app,
            post_form("/login", "email=form%40example.com&password=f0rm-pass"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "form@example.com");

        let (status, body) = send(&app, post_form("/login", "email=form%40example.com")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["received"]["password"], false);
    }

    #[tokio::test]
    async fn protected_without_header_is_unauthorized() {
        let app = build_app(AppState::fake());
        let (status, body) = send(&app, get_with_auth(None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "token missing");
    }

    #[tokio::test]
    async fn protected_with_malformed_header_is_unauthorized() {
        let app = build_app(AppState::fake());
        let (status, body) = send(&app, get_with_auth(Some("Bearer not-a-jwt"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "token invalid");

        let (status, _) = send(&app, get_with_auth(Some("Token abc def"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn protected_with_expired_token_is_unauthorized() {
        let state = AppState::fake();
        let user = User {
            id: uuid::Uuid::new_v4(),
            email: "late@example.com".into(),
            password_hash: String::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        let issued = OffsetDateTime::now_utc() - time::Duration::hours(25);
        let token = state.auth.keys().issue_at(&user, issued).unwrap();

        let app = build_app(state);
        let (status, body) =
            send(&app, get_with_auth(Some(&format!("Bearer {token}")))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "token invalid");
    }

    #[tokio::test]
    async fn panic_becomes_generic_500() {
        let res = handle_panic(Box::new("db handle poisoned at 10.0.0.5"));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "internal server error");
    }
}
