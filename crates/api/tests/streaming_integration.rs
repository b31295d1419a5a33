//! Streaming protocol tests against a migrated in-memory database.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::{
    body::Body,
    http::{Request, header},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header};
use showcase_api::{AppState, StreamSession, WsTransport, router};
use showcase_common::{ClockService, ConnectionPolicy, SystemClock};
use showcase_core::{
    ActorDirectory, Claims, CommentThreadService, ConnectionHandle, ConnectionRegistry,
    JwtVerifier, LiveDelivery, MessagingService, NotificationService, ReportService,
    ToggleCoordinator,
};
use showcase_db::repositories::{
    AlbumRepository, CommentRepository, EdgeRepository, MessageRepository, NotificationRepository,
    ReportRepository, UserRepository,
};
use showcase_db::test_utils::TestDatabase;
use tokio::sync::mpsc;
use tower::ServiceExt;

const SECRET: &str = "streaming-test-secret";

fn token_for(user_id: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (Utc::now() + Duration::hours(1)).timestamp(),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn create_state() -> (TestDatabase, AppState) {
    let db = TestDatabase::sqlite().await.unwrap();
    let conn = db.conn.clone();
    let clock: ClockService = Arc::new(SystemClock);

    let registry = Arc::new(ConnectionRegistry::new(ConnectionPolicy::LastWins));
    let transport = Arc::new(WsTransport::new());
    let delivery = LiveDelivery::new(
        registry.clone(),
        transport.clone(),
        StdDuration::from_secs(1),
    );

    let user_repo = UserRepository::new(conn.clone());
    let album_repo = AlbumRepository::new(conn.clone());
    let actors = ActorDirectory::new(user_repo.clone());

    let mut notification_service = NotificationService::new(
        conn.clone(),
        NotificationRepository::new(conn.clone()),
        album_repo.clone(),
        actors.clone(),
        clock.clone(),
    );
    notification_service.set_live_delivery(delivery.clone());

    let mut messaging_service = MessagingService::new(
        conn.clone(),
        MessageRepository::new(conn.clone()),
        user_repo.clone(),
        actors.clone(),
        notification_service.clone(),
        clock.clone(),
    );
    messaging_service.set_live_delivery(delivery);

    let state = AppState {
        registry,
        transport,
        verifier: Arc::new(JwtVerifier::new(SECRET, 0)),
        toggle_service: ToggleCoordinator::new(
            conn.clone(),
            EdgeRepository::new(conn.clone()),
            album_repo.clone(),
            user_repo,
            notification_service.clone(),
            clock.clone(),
        ),
        comment_service: CommentThreadService::new(
            conn.clone(),
            CommentRepository::new(conn.clone()),
            album_repo.clone(),
            actors,
            notification_service.clone(),
            clock.clone(),
        ),
        report_service: ReportService::new(
            conn.clone(),
            ReportRepository::new(conn),
            album_repo,
            notification_service.clone(),
            clock,
        ),
        notification_service,
        messaging_service,
    };

    (db, state)
}

/// A session with its outbox attached to the transport, like a live socket.
async fn open_session(state: &AppState) -> (StreamSession, mpsc::UnboundedReceiver<String>) {
    let session = StreamSession::new(ConnectionHandle::new());
    let (tx, rx) = mpsc::unbounded_channel();
    state.transport.attach(session.handle(), tx).await;
    (session, rx)
}

fn parse(frame: &str) -> serde_json::Value {
    serde_json::from_str(frame).unwrap()
}

fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut types = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        types.push(parse(&frame)["type"].as_str().unwrap().to_string());
    }
    types
}

#[tokio::test]
async fn test_requests_before_authentication_are_rejected() {
    let (_db, state) = create_state().await;
    let (mut session, _rx) = open_session(&state).await;

    let reply = session
        .handle_text(&state, r#"{"type":"read_notifications"}"#)
        .await
        .unwrap();

    let json = parse(&reply);
    assert_eq!(json["type"], "error");
    assert_eq!(json["body"]["code"], "UNAUTHORIZED");
    assert!(session.user_id().is_none());
}

#[tokio::test]
async fn test_authenticate_registers_connection() {
    let (db, state) = create_state().await;
    let alice = db.seed_user("alice").await.unwrap();
    let (mut session, _rx) = open_session(&state).await;

    let frame = format!(
        r#"{{"type":"authenticate","body":{{"token":"{}"}}}}"#,
        token_for(&alice.id)
    );
    let reply = session.handle_text(&state, &frame).await.unwrap();

    let json = parse(&reply);
    assert_eq!(json["type"], "authenticated");
    assert_eq!(json["body"]["user_id"], alice.id);
    assert_eq!(session.user_id(), Some(alice.id.as_str()));
    assert_eq!(
        state.registry.connections(&alice.id).await,
        vec![session.handle()]
    );
}

#[tokio::test]
async fn test_bad_token_and_garbage_frames() {
    let (_db, state) = create_state().await;
    let (mut session, _rx) = open_session(&state).await;

    let reply = session.authenticate(&state, "not-a-token").await.to_frame();
    assert_eq!(parse(&reply)["body"]["code"], "UNAUTHORIZED");

    let reply = session.handle_text(&state, "{not json").await.unwrap();
    assert_eq!(parse(&reply)["body"]["code"], "INVALID_MESSAGE");

    let reply = session
        .handle_text(&state, r#"{"type":"subscribe","body":{}}"#)
        .await
        .unwrap();
    assert_eq!(parse(&reply)["body"]["code"], "INVALID_MESSAGE");
}

#[tokio::test]
async fn test_private_message_pushes_to_both_sockets() {
    let (db, state) = create_state().await;
    let alice = db.seed_user("alice").await.unwrap();
    let bob = db.seed_user("bob").await.unwrap();

    let (mut alice_session, mut alice_rx) = open_session(&state).await;
    let (mut bob_session, mut bob_rx) = open_session(&state).await;
    alice_session.bind(&state, alice.id.clone()).await;
    bob_session.bind(&state, bob.id.clone()).await;

    let frame = format!(
        r#"{{"type":"private_message","body":{{"recipient_id":"{}","content":"hello"}}}}"#,
        bob.id
    );
    let reply = alice_session.handle_text(&state, &frame).await;

    assert!(reply.is_none());
    assert_eq!(drain(&mut alice_rx), vec!["message_sent"]);
    assert_eq!(drain(&mut bob_rx), vec!["notification", "new_message"]);
    assert_eq!(state.messaging_service.unread_count(&bob.id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_private_message_errors_become_error_frames() {
    let (db, state) = create_state().await;
    let alice = db.seed_user("alice").await.unwrap();
    let (mut session, _rx) = open_session(&state).await;
    session.bind(&state, alice.id.clone()).await;

    let blank = r#"{"type":"private_message","body":{"recipient_id":"someone","content":"   "}}"#;
    let reply = session.handle_text(&state, blank).await.unwrap();
    assert_eq!(parse(&reply)["body"]["code"], "VALIDATION_ERROR");

    let missing = r#"{"type":"private_message","body":{"recipient_id":"ghost","content":"hi"}}"#;
    let reply = session.handle_text(&state, missing).await.unwrap();
    assert_eq!(parse(&reply)["body"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_read_notifications_clears_unread() {
    let (db, state) = create_state().await;
    let alice = db.seed_user("alice").await.unwrap();
    let bob = db.seed_user("bob").await.unwrap();
    state.toggle_service.toggle_follow(&bob.id, &alice.id).await.unwrap();
    assert_eq!(
        state.notification_service.count_unread(&alice.id).await.unwrap(),
        1
    );

    let (mut session, _rx) = open_session(&state).await;
    session.bind(&state, alice.id.clone()).await;
    let reply = session
        .handle_text(&state, r#"{"type":"read_notifications"}"#)
        .await;

    assert!(reply.is_none());
    assert_eq!(
        state.notification_service.count_unread(&alice.id).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_close_unregisters_and_detaches() {
    let (db, state) = create_state().await;
    let alice = db.seed_user("alice").await.unwrap();
    let (mut session, _rx) = open_session(&state).await;
    session.bind(&state, alice.id.clone()).await;
    assert_eq!(state.transport.socket_count().await, 1);

    session.close(&state).await;

    assert!(state.registry.connections(&alice.id).await.is_empty());
    assert_eq!(state.transport.socket_count().await, 0);
}

#[tokio::test]
async fn test_streaming_route_requires_upgrade() {
    let (_db, state) = create_state().await;
    let app = router(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/streaming")
                .header(header::AUTHORIZATION, format!("Bearer {}", token_for("alice")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}
