use async_graphql::SimpleObject;
use serde::{Deserialize, Serialize};

/// A community posts are filed under.
#[derive(Clone, Debug, Serialize, Deserialize, SimpleObject)]
pub struct Planet {
    pub id: i64,
    pub name: String,
}
