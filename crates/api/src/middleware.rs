//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use showcase_core::{
    CommentThreadService, ConnectionRegistry, MessagingService, NotificationService,
    ReportService, ToggleCoordinator, TokenVerifierService,
};

use crate::extractors::AuthUser;
use crate::streaming::WsTransport;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub transport: Arc<WsTransport>,
    pub verifier: TokenVerifierService,
    pub notification_service: NotificationService,
    pub messaging_service: MessagingService,
    pub toggle_service: ToggleCoordinator,
    pub comment_service: CommentThreadService,
    pub report_service: ReportService,
}

/// Authentication middleware.
///
/// A valid `Authorization: Bearer` token puts an [`AuthUser`] into the
/// request extensions. Invalid or missing tokens are not rejected here;
/// handlers decide whether they need a user.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get(header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        match state.verifier.decode(token) {
            Ok(user_id) => {
                req.extensions_mut().insert(AuthUser(user_id));
            }
            Err(e) => tracing::debug!(error = %e, "Ignoring invalid bearer token"),
        }
    }

    next.run(req).await
}
