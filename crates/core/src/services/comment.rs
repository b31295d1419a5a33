//! Threaded album comments.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use sea_orm::{DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use showcase_common::{AppError, AppResult, ClockService, IdGenerator};
use showcase_db::{
    entities::{comment, notification::NotificationType},
    repositories::{AlbumRepository, CommentRepository},
};
use validator::Validate;

use super::notification::{NotificationActor, NotificationService};
use super::profile::{ActorDirectory, ActorView};
use super::validation::not_blank;
use super::{begin, commit};

/// Input for posting a comment or reply.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CommentInput {
    #[validate(length(min = 1, max = 2000), custom(function = "not_blank"))]
    pub text: String,
}

impl CommentInput {
    /// Wrap comment text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A comment with its replies, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: comment::Model,
    pub author: Option<ActorView>,
    pub replies: Vec<CommentNode>,
}

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentThreadService {
    db: Arc<DatabaseConnection>,
    comment_repo: CommentRepository,
    album_repo: AlbumRepository,
    actors: ActorDirectory,
    notifications: NotificationService,
    clock: ClockService,
    id_gen: IdGenerator,
}

impl CommentThreadService {
    /// Create a new comment service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        comment_repo: CommentRepository,
        album_repo: AlbumRepository,
        actors: ActorDirectory,
        notifications: NotificationService,
        clock: ClockService,
    ) -> Self {
        Self {
            db,
            comment_repo,
            album_repo,
            actors,
            notifications,
            clock,
            id_gen: IdGenerator::new(),
        }
    }

    /// Post a top-level comment on an album.
    ///
    /// The album owner is notified unless they wrote the comment.
    pub async fn post(
        &self,
        album_id: &str,
        author_id: &str,
        input: CommentInput,
    ) -> AppResult<comment::Model> {
        input.validate()?;

        let txn = begin(&self.db).await?;

        let album = self
            .album_repo
            .find_by_id(&txn, album_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Album: {album_id}")))?;

        let created = self
            .comment_repo
            .create(&txn, self.build(album_id, author_id, None, input.text))
            .await?;

        let notification = self
            .notifications
            .record(
                &txn,
                &album.user_id,
                &NotificationActor::user(author_id),
                NotificationType::NewComment,
                Some(album_id),
            )
            .await?;

        commit(txn).await?;

        if let Some(ref notification) = notification {
            self.notifications.announce(notification).await;
        }

        tracing::debug!(comment_id = %created.id, album_id = %album_id, "Comment posted");
        Ok(created)
    }

    /// Reply to an existing comment. The reply lives on the parent's album.
    ///
    /// The parent's author is notified unless they wrote the reply.
    pub async fn reply(
        &self,
        parent_id: &str,
        author_id: &str,
        input: CommentInput,
    ) -> AppResult<comment::Model> {
        input.validate()?;

        let txn = begin(&self.db).await?;

        let parent = self
            .comment_repo
            .find_by_id(&txn, parent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment: {parent_id}")))?;

        let created = self
            .comment_repo
            .create(
                &txn,
                self.build(&parent.album_id, author_id, Some(parent_id), input.text),
            )
            .await?;

        let notification = self
            .notifications
            .record(
                &txn,
                &parent.user_id,
                &NotificationActor::user(author_id),
                NotificationType::NewReply,
                Some(&parent.album_id),
            )
            .await?;

        commit(txn).await?;

        if let Some(ref notification) = notification {
            self.notifications.announce(notification).await;
        }

        tracing::debug!(
            comment_id = %created.id,
            parent_id = %parent_id,
            album_id = %created.album_id,
            "Reply posted"
        );
        Ok(created)
    }

    /// Delete a comment together with every reply below it.
    ///
    /// Only the comment's author or the album owner may delete. Returns the
    /// number of comments removed.
    pub async fn delete(&self, comment_id: &str, requester_id: &str) -> AppResult<u64> {
        let txn = begin(&self.db).await?;

        let target = self
            .comment_repo
            .find_by_id(&txn, comment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment: {comment_id}")))?;

        if target.user_id != requester_id {
            let album_owner = self
                .album_repo
                .find_by_id(&txn, &target.album_id)
                .await?
                .map(|album| album.user_id);
            if album_owner.as_deref() != Some(requester_id) {
                return Err(AppError::Forbidden(
                    "Only the author or the album owner can delete this comment".to_string(),
                ));
            }
        }

        let siblings = self.comment_repo.find_by_album(&txn, &target.album_id).await?;
        let ids = descendants(&siblings, &target.id);

        // Replies before their parents, so no row is removed by the parent
        // FK cascade and every deletion is counted.
        let mut removed = 0;
        for id in ids.iter().rev() {
            removed += self
                .comment_repo
                .delete_by_ids(&txn, std::slice::from_ref(id))
                .await?;
        }
        commit(txn).await?;

        tracing::debug!(
            comment_id = %comment_id,
            requester_id = %requester_id,
            removed,
            "Comment thread deleted"
        );
        Ok(removed)
    }

    /// Comments of an album as a forest of threads, oldest first at every
    /// level.
    pub async fn render(&self, album_id: &str) -> AppResult<Vec<CommentNode>> {
        let comments = self.comment_repo.list_for_album(album_id).await?;

        let author_ids: Vec<String> = comments.iter().map(|c| c.user_id.clone()).collect();
        let authors = self.actors.load(&author_ids).await?;

        Ok(build_forest(album_id, comments, &authors))
    }

    fn build(
        &self,
        album_id: &str,
        author_id: &str,
        parent_id: Option<&str>,
        text: String,
    ) -> comment::ActiveModel {
        comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            album_id: Set(album_id.to_string()),
            user_id: Set(author_id.to_string()),
            parent_id: Set(parent_id.map(ToString::to_string)),
            text: Set(text),
            created_at: Set(self.clock.now_fixed()),
        }
    }
}

/// `root_id` and the ids of every comment transitively replying to it.
fn descendants(comments: &[comment::Model], root_id: &str) -> Vec<String> {
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for c in comments {
        if let Some(ref parent) = c.parent_id {
            children.entry(parent.as_str()).or_default().push(c.id.as_str());
        }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue = VecDeque::from([root_id]);
    let mut ids = Vec::new();

    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        ids.push(id.to_string());
        if let Some(kids) = children.get(id) {
            queue.extend(kids.iter().copied());
        }
    }
    ids
}

/// Arrange `comments` (oldest first) into threads.
///
/// Works without recursion: a pre-order walk from the roots fixes which rows
/// are reachable, then nodes are assembled children-first. Rows not reachable
/// from a top-level comment are dropped.
fn build_forest(
    album_id: &str,
    comments: Vec<comment::Model>,
    authors: &HashMap<String, ActorView>,
) -> Vec<CommentNode> {
    let total = comments.len();
    let index: HashMap<String, usize> = comments
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.clone(), i))
        .collect();

    let mut roots = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); total];
    for (i, c) in comments.iter().enumerate() {
        match c.parent_id.as_ref().and_then(|p| index.get(p)) {
            Some(&parent) => children[parent].push(i),
            None if c.parent_id.is_none() => roots.push(i),
            // Dangling parent.
            None => {}
        }
    }

    let mut visited = vec![false; total];
    let mut preorder = Vec::with_capacity(total);
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    while let Some(i) = stack.pop() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        preorder.push(i);
        stack.extend(children[i].iter().rev().copied());
    }

    let skipped = total - preorder.len();
    if skipped > 0 {
        tracing::warn!(album_id = %album_id, skipped, "Skipping comments unreachable from a thread root");
    }

    let mut slots: Vec<Option<comment::Model>> = comments.into_iter().map(Some).collect();
    let mut built: Vec<Option<CommentNode>> = (0..total).map(|_| None).collect();

    // Reverse pre-order visits every child before its parent.
    for &i in preorder.iter().rev() {
        let replies = children[i]
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        if let Some(comment) = slots[i].take() {
            let author = authors.get(&comment.user_id).cloned();
            built[i] = Some(CommentNode {
                comment,
                author,
                replies,
            });
        }
    }

    roots.into_iter().filter_map(|i| built[i].take()).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use showcase_common::SystemClock;
    use showcase_db::repositories::{NotificationRepository, UserRepository};

    fn create_test_comment(id: &str, parent: Option<&str>, minute: i64) -> comment::Model {
        comment::Model {
            id: id.to_string(),
            album_id: "album1".to_string(),
            user_id: "alice".to_string(),
            parent_id: parent.map(ToString::to_string),
            text: format!("comment {id}"),
            created_at: (Utc::now() + Duration::minutes(minute)).fixed_offset(),
        }
    }

    fn ids(nodes: &[CommentNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.comment.id.as_str()).collect()
    }

    #[test]
    fn test_forest_nests_replies_in_order() {
        let comments = vec![
            create_test_comment("c1", None, 0),
            create_test_comment("c2", None, 1),
            create_test_comment("r1", Some("c1"), 2),
            create_test_comment("r2", Some("c1"), 3),
            create_test_comment("rr1", Some("r1"), 4),
        ];

        let forest = build_forest("album1", comments, &HashMap::new());

        assert_eq!(ids(&forest), vec!["c1", "c2"]);
        assert_eq!(ids(&forest[0].replies), vec!["r1", "r2"]);
        assert_eq!(ids(&forest[0].replies[0].replies), vec!["rr1"]);
        assert!(forest[1].replies.is_empty());
    }

    #[test]
    fn test_forest_skips_cycles_and_dangling_parents() {
        let comments = vec![
            create_test_comment("c1", None, 0),
            create_test_comment("x", Some("y"), 1),
            create_test_comment("y", Some("x"), 2),
            create_test_comment("orphan", Some("deleted"), 3),
        ];

        let forest = build_forest("album1", comments, &HashMap::new());

        assert_eq!(ids(&forest), vec!["c1"]);
        assert!(forest[0].replies.is_empty());
    }

    #[test]
    fn test_deep_thread_does_not_recurse() {
        let mut comments = vec![create_test_comment("n0", None, 0)];
        for i in 1..5000 {
            let parent = format!("n{}", i - 1);
            comments.push(create_test_comment(&format!("n{i}"), Some(&parent), i));
        }

        let forest = build_forest("album1", comments, &HashMap::new());
        assert_eq!(forest.len(), 1);

        // Dropping a deeply nested tree recurses; unwind it iteratively.
        let mut depth = 0;
        let mut current = forest.into_iter().next();
        while let Some(mut node) = current {
            depth += 1;
            current = node.replies.pop();
        }
        assert_eq!(depth, 5000);
    }

    #[test]
    fn test_descendants_cover_whole_subtree() {
        let comments = vec![
            create_test_comment("c1", None, 0),
            create_test_comment("c2", None, 1),
            create_test_comment("r1", Some("c1"), 2),
            create_test_comment("rr1", Some("r1"), 3),
            create_test_comment("r2", Some("c2"), 4),
        ];

        let mut removed = descendants(&comments, "c1");
        removed.sort();
        assert_eq!(removed, vec!["c1", "r1", "rr1"]);
        assert_eq!(descendants(&comments, "r2"), vec!["r2"]);
    }

    #[tokio::test]
    async fn test_delete_counts_every_removed_reply() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_comment("c1", None, 0)]])
                .append_query_results([[
                    create_test_comment("c1", None, 0),
                    create_test_comment("r1", Some("c1"), 1),
                    create_test_comment("r2", Some("c1"), 2),
                ]])
                .append_exec_results((0..3).map(|_| MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }))
                .into_connection(),
        );
        let clock: ClockService = Arc::new(SystemClock);
        let album_repo = AlbumRepository::new(Arc::clone(&db));
        let actors = ActorDirectory::new(UserRepository::new(Arc::clone(&db)));
        let notifications = NotificationService::new(
            Arc::clone(&db),
            NotificationRepository::new(Arc::clone(&db)),
            album_repo.clone(),
            actors.clone(),
            Arc::clone(&clock),
        );
        let service = CommentThreadService::new(
            Arc::clone(&db),
            CommentRepository::new(Arc::clone(&db)),
            album_repo,
            actors,
            notifications,
            clock,
        );

        let removed = service.delete("c1", "alice").await.unwrap();
        assert_eq!(removed, 3);

        drop(service);
        let log = format!("{:?}", Arc::try_unwrap(db).ok().unwrap().into_transaction_log());
        let reply = log.find(r#""r1""#).unwrap();
        let parent = log.rfind(r#""c1""#).unwrap();
        assert!(reply < parent);
    }
}
