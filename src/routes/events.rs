use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};
use crate::services::events::{ChatMessageEvent, ClassCreatedEvent, EventVerifier};
use crate::services::push::DeliveryReport;
use crate::services::reminders::SweepReport;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat-messages", post(handle_chat_message))
        .route("/classes", post(handle_class_created))
}

pub fn tasks_router() -> Router<Arc<AppState>> {
    Router::new().route("/reminder-sweep", post(handle_reminder_sweep))
}

/// Verify the delivery and decode its JSON body. These are the only failures
/// a caller ever sees; once an event is accepted the response is 200.
fn accept_event<T: DeserializeOwned>(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> AppResult<T> {
    EventVerifier::verify(state.config.events.webhook_secret.as_deref(), headers, body)?;
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid payload: {}", e)))
}

async fn handle_chat_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DeliveryReport>, AppError> {
    let event: ChatMessageEvent = accept_event(&state, &headers, &body)?;
    tracing::info!(
        "Received chat message event: room={}, message={}",
        event.chat_room_id,
        event.message_id
    );

    Ok(Json(state.chat_notifier().handle(&event).await))
}

async fn handle_class_created(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DeliveryReport>, AppError> {
    let event: ClassCreatedEvent = accept_event(&state, &headers, &body)?;
    tracing::info!("Received class created event: class={}", event.class_id);

    Ok(Json(state.class_announcer().handle(&event).await))
}

async fn handle_reminder_sweep(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SweepReport>, AppError> {
    EventVerifier::verify(state.config.events.webhook_secret.as_deref(), &headers, &body)?;
    tracing::info!("Reminder sweep requested over HTTP");

    Ok(Json(state.reminder_sweeper().sweep().await))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::db::test_support::*;
    use crate::db::UserPartition;
    use crate::services::events::{EVENT_SIGNATURE_HEADER, EVENT_TIMESTAMP_HEADER};
    use crate::services::push::testing::RecordingGateway;
    use crate::{build_router, AppState};

    use super::*;

    const SECRET: &str = "test-secret";

    async fn test_state() -> (Arc<AppState>, Arc<RecordingGateway>) {
        let gateway = Arc::new(RecordingGateway::default());
        let mut config = Config::default();
        config.events.webhook_secret = Some(SECRET.to_string());
        let state = Arc::new(AppState {
            db: memory_pool().await,
            config,
            push: gateway.clone(),
        });
        (state, gateway)
    }

    fn signed_request(uri: &str, body: &str) -> Request<Body> {
        let timestamp = Utc::now().to_rfc3339();
        let signature = EventVerifier::sign(SECRET, &timestamp, body.as_bytes()).unwrap();
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header(EVENT_TIMESTAMP_HEADER, timestamp)
            .header(EVENT_SIGNATURE_HEADER, signature)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_database() {
        let (state, _) = test_state().await;
        let response = build_router(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["database"], "ok");
    }

    #[tokio::test]
    async fn signed_chat_event_pushes_to_receiver() {
        let (state, gateway) = test_state().await;
        insert_chat_room(&state.db, "r1", &["a", "b"]).await;
        insert_user(&state.db, UserPartition::Students, "b", None, Some(r#"["b-tok"]"#)).await;

        let body = r#"{"chatRoomId":"r1","messageId":"m1","message":{"senderId":"a","senderName":"Ana","text":"hi"}}"#;
        let response = build_router(state)
            .oneshot(signed_request("/events/chat-messages", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["push_sent"], 1);
        assert_eq!(gateway.tokens(), ["b-tok"]);
    }

    #[tokio::test]
    async fn unsigned_or_forged_deliveries_are_rejected() {
        let (state, gateway) = test_state().await;
        let app = build_router(state);
        let body = r#"{"classId":"c1","class":{"title":"Algebra","teacherId":"t1"}}"#;

        let unsigned = Request::builder()
            .method("POST")
            .uri("/events/classes")
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(unsigned).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let mut forged = signed_request("/events/classes", body);
        *forged.body_mut() = Body::from(r#"{"classId":"c2","class":{}}"#);
        let response = app.oneshot(forged).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        assert!(gateway.messages().is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_is_bad_request() {
        let (state, _) = test_state().await;
        let response = build_router(state)
            .oneshot(signed_request("/events/chat-messages", r#"{"chatRoomId":"r1"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn accepted_event_that_aborts_still_returns_ok() {
        let (state, gateway) = test_state().await;
        let response = build_router(state)
            .oneshot(signed_request(
                "/events/classes",
                r#"{"classId":"c1","class":{"teacherId":"t1"}}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["in_app_written"], 0);
        assert!(gateway.messages().is_empty());
    }

    #[tokio::test]
    async fn sweep_endpoint_runs_one_tick() {
        let (state, gateway) = test_state().await;
        insert_class(
            &state.db,
            ClassSeed {
                id: "C1",
                title: Some("Algebra"),
                teacher_id: Some("t1"),
                teacher_name: None,
                subject: None,
                scheduled_at: Some((Utc::now() + Duration::minutes(2)).naive_utc()),
            },
        )
        .await;
        insert_user(&state.db, UserPartition::Teachers, "t1", None, Some(r#""t-tok""#)).await;

        let app = build_router(state);
        let response = app
            .clone()
            .oneshot(signed_request("/tasks/reminder-sweep", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["reminders_sent"], 1);
        assert_eq!(json["delivery"]["push_sent"], 1);

        let response = app
            .oneshot(signed_request("/tasks/reminder-sweep", ""))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["already_sent"], 1);
        assert_eq!(gateway.tokens(), ["t-tok"]);
    }
}
