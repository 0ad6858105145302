use async_graphql::SimpleObject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reply notification, written when someone comments under your post or
/// comment.
#[derive(Clone, Debug, Serialize, Deserialize, SimpleObject)]
pub struct Notification {
    pub id: i64,
    pub comment_id: i64,
    pub from_user_id: i64,
    pub to_user_id: i64,
    pub post_id: i64,
    pub parent_comment_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}
