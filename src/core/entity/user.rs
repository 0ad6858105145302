use async_graphql::SimpleObject;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, SimpleObject)]
#[graphql(complex)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub admin: bool,
    pub banned: bool,
    pub rocket_count: i64,
}
