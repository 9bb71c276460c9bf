mod businesses;
mod conversations;
mod error;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use bizchat_core::ChatService;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChatService>,
    /// Prefix for widget URLs in embed snippets
    pub public_base_url: String,
    /// Header set by the authenticating proxy
    pub owner_header: String,
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/businesses",
            get(businesses::list_businesses).post(businesses::create_business),
        )
        .route(
            "/businesses/{id}",
            get(businesses::get_business)
                .put(businesses::update_business)
                .delete(businesses::delete_business),
        )
        .route("/businesses/{id}/public", get(businesses::get_public_business))
        .route("/businesses/{id}/embed", get(businesses::get_embed_code))
        .route(
            "/conversations/{chatbot_id}",
            get(conversations::list_conversations),
        )
        .route(
            "/conversations/{chatbot_id}/messages",
            post(conversations::send_message),
        )
        .route(
            "/conversations/{chatbot_id}/session",
            get(conversations::get_session),
        )
        .route(
            "/conversations/{chatbot_id}/{conversation_id}",
            get(conversations::get_conversation),
        )
        .route(
            "/conversations/{chatbot_id}/{conversation_id}/feedback",
            post(conversations::submit_feedback),
        )
        .route(
            "/conversations/{chatbot_id}/{conversation_id}/archive",
            post(conversations::archive_conversation),
        );

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Owner id from the trusted identity header.
fn owner_from_headers(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(state.owner_header.as_str())
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|owner| !owner.is_empty())
        .map(str::to_string)
        .ok_or_else(ApiError::unauthenticated)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use tower::ServiceExt;

    use bizchat_core::{ChatService, ServiceSettings};
    use bizchat_db::Database;
    use bizchat_llm::OfflineGenerator;
    use bizchat_logging::{LogFormat, Logger};

    use super::{create_router, AppState};

    pub const OWNER: &str = "owner-1";

    pub fn app() -> Router {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let service = ChatService::new(
            db,
            Arc::new(OfflineGenerator::new()),
            ServiceSettings::default(),
            Arc::new(Logger::new(LogFormat::Compact)),
        );
        create_router(AppState {
            service: Arc::new(service),
            public_base_url: "https://chat.example.com".to_string(),
            owner_header: "x-owner-id".to_string(),
        })
    }

    /// Send a request and decode the JSON body.
    pub async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        owner: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(owner) = owner {
            request = request.header("x-owner-id", owner);
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                serde_json::Value::String(String::from_utf8_lossy(&bytes).to_string())
            })
        };
        (status, value)
    }

    pub async fn create_business(app: &Router) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/api/businesses",
            Some(OWNER),
            Some(serde_json::json!({
                "businessName": "Bright Smiles Dental",
                "industry": "dental",
                "hours": "Mon-Fri 8am-5pm",
                "services": ["Cleanings", "Whitening"]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let (status, body) = call(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }
}
