//! Real-time API layer for showcase.
//!
//! This crate provides the WebSocket side of the interaction core:
//!
//! - **Streaming**: connection lifecycle, client protocol, and the
//!   [`WsTransport`] that live pushes are delivered through
//! - **Middleware**: bearer token authentication
//! - **Extractors**: authenticated user ids
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod extractors;
pub mod middleware;
pub mod streaming;

use axum::{Router, middleware::from_fn_with_state, routing::get};

pub use middleware::AppState;
pub use streaming::{StreamSession, WsTransport, streaming_handler};

/// Create the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/streaming", get(streaming_handler))
        .layer(from_fn_with_state(state.clone(), middleware::auth_middleware))
        .with_state(state)
}
