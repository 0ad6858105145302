use async_graphql::SimpleObject;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub link: Option<String>,
    pub author_id: Option<i64>,
    pub planet_id: i64,
    pub created_at: DateTime<Utc>,
    pub comment_count: i64,
    pub rocket_count: i64,
}

/// Composite key for "has this user rocketed this post".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostRocketKey {
    pub user_id: i64,
    pub post_id: i64,
}
