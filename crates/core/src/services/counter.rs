//! Album counter store.
//!
//! All counter writes run on the caller's transaction, next to the edge
//! mutation they mirror.

use sea_orm::ConnectionTrait;
use showcase_common::AppResult;
use showcase_db::repositories::{AlbumCounter, AlbumRepository};

/// Atomic increment and clamped decrement of album counters.
#[derive(Clone)]
pub struct CounterStore {
    album_repo: AlbumRepository,
}

impl CounterStore {
    /// Create a new counter store.
    #[must_use]
    pub const fn new(album_repo: AlbumRepository) -> Self {
        Self { album_repo }
    }

    /// Add one to `counter` of `album_id`.
    pub async fn increment<C: ConnectionTrait>(
        &self,
        conn: &C,
        album_id: &str,
        counter: AlbumCounter,
    ) -> AppResult<()> {
        self.album_repo
            .increment_counter(conn, album_id, counter)
            .await
    }

    /// Subtract one from `counter` of `album_id`, stopping at zero.
    pub async fn decrement<C: ConnectionTrait>(
        &self,
        conn: &C,
        album_id: &str,
        counter: AlbumCounter,
    ) -> AppResult<()> {
        self.album_repo
            .decrement_counter(conn, album_id, counter)
            .await
    }

    /// Current value of `counter`, or `None` if the album no longer exists.
    pub async fn read<C: ConnectionTrait>(
        &self,
        conn: &C,
        album_id: &str,
        counter: AlbumCounter,
    ) -> AppResult<Option<i32>> {
        self.album_repo.read_counter(conn, album_id, counter).await
    }
}
