//! Business logic services.

#![allow(missing_docs)]

pub mod auth;
pub mod comment;
pub mod connection;
pub mod counter;
pub mod live;
pub mod messaging;
pub mod notification;
pub mod profile;
pub mod report;
pub mod toggle;
pub mod validation;

pub use auth::{Claims, JwtVerifier, TokenVerifier, TokenVerifierService};
pub use comment::{CommentInput, CommentNode, CommentThreadService};
pub use connection::{ConnectionHandle, ConnectionRegistry, Unregistered};
pub use counter::CounterStore;
pub use live::{LiveDelivery, LiveTransport, LiveTransportService, NoOpTransport, StreamEvent};
pub use messaging::{
    ConversationSummary, DEFAULT_MESSAGE_TTL_HOURS, MessagingService, SendMessageInput,
};
pub use notification::{
    DEFAULT_NOTIFICATION_LIMIT, NotificationActor, NotificationService, NotificationView,
    RenderedNotification, render_notification,
};
pub use profile::{ActorDirectory, ActorView};
pub use report::{FileReportInput, ReportService};
pub use toggle::{ToggleCoordinator, ToggleKind, ToggleOutcome, ToggleState};

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use showcase_common::{AppError, AppResult};

/// Open a transaction on the pool.
pub(crate) async fn begin(db: &DatabaseConnection) -> AppResult<DatabaseTransaction> {
    db.begin()
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Commit `txn`. Dropping a transaction without committing rolls it back.
pub(crate) async fn commit(txn: DatabaseTransaction) -> AppResult<()> {
    txn.commit()
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
