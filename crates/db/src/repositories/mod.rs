//! Database repositories.

pub mod album;
pub mod comment;
pub mod edge;
pub mod message;
pub mod notification;
pub mod report;
pub mod user;

pub use album::{AlbumCounter, AlbumRepository};
pub use comment::CommentRepository;
pub use edge::{EdgeKind, EdgeRepository};
pub use message::MessageRepository;
pub use notification::NotificationRepository;
pub use report::ReportRepository;
pub use user::UserRepository;

use sea_orm::{DbErr, SqlErr};

/// Whether a statement failed on a unique constraint.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
