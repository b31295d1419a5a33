//! Display data for users shown next to notifications, messages, and comments.

use std::collections::HashMap;

use serde::Serialize;
use showcase_common::{AppResult, BlobStoreService};
use showcase_db::{entities::user, repositories::UserRepository};

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorView {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// Resolves user ids to [`ActorView`]s.
#[derive(Clone)]
pub struct ActorDirectory {
    user_repo: UserRepository,
    storage: Option<BlobStoreService>,
}

impl ActorDirectory {
    /// Create a new directory.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self {
            user_repo,
            storage: None,
        }
    }

    /// Set the blob store used to build avatar URLs.
    pub fn set_storage(&mut self, storage: BlobStoreService) {
        self.storage = Some(storage);
    }

    /// Build the view of one user model.
    #[must_use]
    pub fn view(&self, user: &user::Model) -> ActorView {
        let avatar_url = match (&self.storage, &user.profile_picture_path) {
            (Some(storage), Some(path)) => storage.public_url(path).map(|url| url.to_string()),
            _ => None,
        };

        ActorView {
            id: user.id.clone(),
            username: user.username.clone(),
            avatar_url,
        }
    }

    /// Load views for a set of ids in one query, keyed by id.
    pub async fn load(&self, ids: &[String]) -> AppResult<HashMap<String, ActorView>> {
        let mut unique = ids.to_vec();
        unique.sort();
        unique.dedup();

        let users = self.user_repo.find_by_ids(&unique).await?;
        Ok(users
            .iter()
            .map(|user| (user.id.clone(), self.view(user)))
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use showcase_common::LocalStorage;
    use std::sync::Arc;

    fn create_test_user(id: &str, picture: Option<&str>) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: format!("{id}_name"),
            profile_picture_path: picture.map(ToString::to_string),
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_view_without_storage_has_no_avatar() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let directory = ActorDirectory::new(UserRepository::new(db));

        let view = directory.view(&create_test_user("u1", Some("avatars/u1.png")));
        assert_eq!(view.username, "u1_name");
        assert!(view.avatar_url.is_none());
    }

    #[tokio::test]
    async fn test_load_builds_avatar_urls() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![
                    create_test_user("u1", Some("avatars/u1.png")),
                    create_test_user("u2", None),
                ]])
                .into_connection(),
        );
        let mut directory = ActorDirectory::new(UserRepository::new(db));
        directory.set_storage(Arc::new(
            LocalStorage::new("/tmp/showcase", "https://cdn.example.com/media").unwrap(),
        ));

        let views = directory
            .load(&["u1".to_string(), "u2".to_string(), "u1".to_string()])
            .await
            .unwrap();

        assert_eq!(
            views["u1"].avatar_url.as_deref(),
            Some("https://cdn.example.com/media/avatars/u1.png")
        );
        assert!(views["u2"].avatar_url.is_none());
    }
}
