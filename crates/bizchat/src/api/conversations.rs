use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use serde::Deserialize;

use bizchat_core::{
    ChatReply, ConversationPage, ConversationView, FeedbackInput, IncomingMessage, ListQuery,
    SessionView,
};
use bizchat_db::Feedback;

use super::{owner_from_headers, ApiError, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionParams {
    pub session_id: Option<String>,
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(chatbot_id): Path<String>,
    payload: Result<Json<IncomingMessage>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(request) = payload?;
    let reply = state.service.process_message(&chatbot_id, request).await?;
    Ok(Json(reply))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(chatbot_id): Path<String>,
    params: Result<Query<SessionParams>, QueryRejection>,
) -> Result<Json<SessionView>, ApiError> {
    let Query(params) = params?;
    let session = state
        .service
        .get_or_create_session(&chatbot_id, params.session_id.as_deref())
        .await?;
    Ok(Json(session))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(chatbot_id): Path<String>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<ConversationPage>, ApiError> {
    let owner = owner_from_headers(&state, &headers)?;
    let Query(query) = query?;
    let page = state
        .service
        .list_conversations(&owner, &chatbot_id, &query)?;
    Ok(Json(page))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((chatbot_id, conversation_id)): Path<(String, String)>,
) -> Result<Json<ConversationView>, ApiError> {
    let owner = owner_from_headers(&state, &headers)?;
    let conversation = state
        .service
        .get_conversation(&owner, &chatbot_id, &conversation_id)?;
    Ok(Json(conversation))
}

pub async fn archive_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((chatbot_id, conversation_id)): Path<(String, String)>,
) -> Result<Json<ConversationView>, ApiError> {
    let owner = owner_from_headers(&state, &headers)?;
    let conversation = state
        .service
        .archive_conversation(&owner, &chatbot_id, &conversation_id)
        .await?;
    Ok(Json(conversation))
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    Path((chatbot_id, conversation_id)): Path<(String, String)>,
    payload: Result<Json<FeedbackInput>, JsonRejection>,
) -> Result<Json<Feedback>, ApiError> {
    let Json(input) = payload?;
    let feedback = state
        .service
        .submit_feedback(&chatbot_id, &conversation_id, input)?;
    Ok(Json(feedback))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_message_falls_back_without_model() {
        let app = app();
        let id = create_business(&app).await;

        let (status, reply) = call(
            &app,
            "POST",
            &format!("/api/conversations/{}/messages", id),
            None,
            Some(json!({ "message": "What are your hours?", "sessionId": "s-1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["conversationId"], "s-1");
        assert!(reply["message"].as_str().unwrap().contains("Mon-Fri 8am-5pm"));
        assert!(reply.get("source").is_none());
    }

    #[tokio::test]
    async fn test_message_errors() {
        let app = app();
        let id = create_business(&app).await;

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/conversations/{}/messages", id),
            None,
            Some(json!({ "sessionId": "s-1" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_input");

        let (status, _) = call(
            &app,
            "POST",
            "/api/conversations/missing/messages",
            None,
            Some(json!({ "message": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        call(
            &app,
            "PUT",
            &format!("/api/businesses/{}", id),
            Some(OWNER),
            Some(json!({ "active": false })),
        )
        .await;
        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/conversations/{}/messages", id),
            None,
            Some(json!({ "message": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "inactive");
    }

    #[tokio::test]
    async fn test_malformed_input_is_invalid_input() {
        let app = app();
        let id = create_business(&app).await;

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/conversations/{}/messages", id),
            None,
            Some(json!({ "message": 42 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_input");
        assert!(body["message"].is_string());

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/conversations/{}/s-1/feedback", id),
            None,
            Some(json!({ "rating": "five" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_input");

        let (status, body) = call(
            &app,
            "GET",
            &format!("/api/conversations/{}?page=abc", id),
            Some(OWNER),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_input");
    }

    #[tokio::test]
    async fn test_session_then_owner_views() {
        let app = app();
        let id = create_business(&app).await;

        let uri = format!("/api/conversations/{}/session?sessionId=widget-1", id);
        let (status, session) = call(&app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["isNew"], true);
        assert_eq!(session["messages"].as_array().unwrap().len(), 1);
        assert_eq!(session["chatbotInfo"]["name"], "Bright Smiles Dental");

        let (_, again) = call(&app, "GET", &uri, None, None).await;
        assert_eq!(again["isNew"], false);

        let list_uri = format!("/api/conversations/{}?page=1&limit=10", id);
        let (status, _) = call(&app, "GET", &list_uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, page) = call(&app, "GET", &list_uri, Some(OWNER), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["pagination"]["total"], 1);
        assert_eq!(page["conversations"][0]["sessionId"], "widget-1");

        let (status, body) = call(
            &app,
            "GET",
            &format!("/api/conversations/{}?limit=500", id),
            Some(OWNER),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_input");

        let (status, conversation) = call(
            &app,
            "GET",
            &format!("/api/conversations/{}/widget-1", id),
            Some(OWNER),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(conversation["status"], "active");
        assert!(conversation["messages"]
            .as_array()
            .unwrap()
            .iter()
            .all(|m| m["role"] != "system"));

        let (status, archived) = call(
            &app,
            "POST",
            &format!("/api/conversations/{}/widget-1/archive", id),
            Some(OWNER),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(archived["status"], "archived");
    }

    #[tokio::test]
    async fn test_feedback() {
        let app = app();
        let id = create_business(&app).await;
        call(
            &app,
            "GET",
            &format!("/api/conversations/{}/session?sessionId=s-1", id),
            None,
            None,
        )
        .await;

        let uri = format!("/api/conversations/{}/s-1/feedback", id);
        let (status, body) = call(&app, "POST", &uri, None, Some(json!({ "rating": 0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "Rating is required and must be between 1 and 5"
        );

        let (status, feedback) = call(
            &app,
            "POST",
            &uri,
            None,
            Some(json!({ "rating": 5, "comment": "Great" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(feedback["rating"], 5);

        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/conversations/{}/unknown/feedback", id),
            None,
            Some(json!({ "rating": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
