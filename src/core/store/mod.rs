mod mem;

pub use mem::MemStore;

use anyhow::Result;

use super::entity::{Comment, CommentRocketKey, Notification, Planet, Post, PostRocketKey, User};

/// Input record for a new comment.
#[derive(Clone, Debug)]
pub struct NewComment {
    pub text_content: String,
    pub post_id: i64,
    pub parent_comment_id: Option<i64>,
    pub author_id: i64,
}

/// Input record for a reply notification.
#[derive(Clone, Debug)]
pub struct NewNotification {
    pub comment_id: i64,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub post_id: i64,
    pub parent_comment_id: Option<i64>,
}

/// The persistence seam. The bulk lookups feed the data loaders and follow
/// their positional contract: one slot per input key, in key order, `None`
/// for keys with no row. Write methods use UPDATE semantics: a missing row
/// is a no-op, not an error.
#[async_trait::async_trait]
pub trait Store: Send + Sync + 'static {
    async fn users_by_ids(&self, ids: &[i64]) -> Result<Vec<Option<User>>>;

    async fn posts_by_ids(&self, ids: &[i64]) -> Result<Vec<Option<Post>>>;

    async fn comments_by_ids(&self, ids: &[i64]) -> Result<Vec<Option<Comment>>>;

    /// `Some(true)`/`Some(false)` per key; `None` only when the referenced
    /// user does not exist.
    async fn comment_rockets(&self, keys: &[CommentRocketKey]) -> Result<Vec<Option<bool>>>;

    async fn post_rockets(&self, keys: &[PostRocketKey]) -> Result<Vec<Option<bool>>>;

    /// Planets each user has joined, `None` for unknown users.
    async fn joined_planets(&self, user_ids: &[i64]) -> Result<Vec<Option<Vec<Planet>>>>;

    /// All comments of a post, newest first, rocket count as tiebreak.
    async fn comments_of_post(&self, post_id: i64) -> Result<Vec<Comment>>;

    async fn insert_comment(&self, new: NewComment) -> Result<Comment>;

    /// Replaces the text and stamps `edited_at`.
    async fn update_comment_text(&self, comment_id: i64, text_content: String) -> Result<()>;

    async fn mark_comment_deleted(&self, comment_id: i64) -> Result<()>;

    async fn insert_comment_rocket(&self, key: CommentRocketKey) -> Result<()>;

    async fn delete_comment_rocket(&self, key: CommentRocketKey) -> Result<()>;

    async fn increment_comment_rockets(&self, comment_id: i64, delta: i64) -> Result<()>;

    async fn increment_user_rockets(&self, user_id: i64, delta: i64) -> Result<()>;

    async fn increment_post_comments(&self, post_id: i64, delta: i64) -> Result<()>;

    async fn insert_notification(&self, new: NewNotification) -> Result<Notification>;

    async fn save_comment(&self, user_id: i64, comment_id: i64) -> Result<()>;

    async fn unsave_comment(&self, user_id: i64, comment_id: i64) -> Result<()>;

    /// Users this user has blocked; their comments are hidden from listings.
    async fn blocked_user_ids(&self, user_id: i64) -> Result<Vec<i64>>;
}
