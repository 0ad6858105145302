use async_graphql::{Enum, SimpleObject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One comment on a post. `author`, `post` and `rocketed` resolve through
/// the request's data loaders, see the resolver module.
#[derive(Clone, Debug, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Comment {
    pub id: i64,
    pub text_content: String,
    pub post_id: i64,
    pub parent_comment_id: Option<i64>,
    pub author_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub removed: bool,
    pub removed_reason: Option<String>,
    pub rocket_count: i64,
}

impl Comment {
    /// Deleted and removed comments keep their row but present placeholder
    /// text and no author.
    pub fn masked(mut self) -> Self {
        if self.deleted {
            self.text_content = "<p>[deleted]</p>".to_string();
            self.author_id = None;
        }
        if self.removed {
            let reason = self.removed_reason.as_deref().unwrap_or("");
            self.text_content = format!("<p>[removed: {}]</p>", reason);
            self.author_id = None;
        }
        self
    }
}

/// Composite key for "has this user rocketed this comment".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommentRocketKey {
    pub user_id: i64,
    pub comment_id: i64,
}

#[derive(Enum, Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum CommentSort {
    #[default]
    New,
    Top,
}
