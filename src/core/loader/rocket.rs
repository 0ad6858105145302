use std::sync::Arc;

use super::LoaderError;
use crate::core::data_loader::{BatchResults, DataLoader, Loader};
use crate::core::entity::{CommentRocketKey, PostRocketKey};
use crate::core::store::Store;

/// Batches "has this user rocketed this comment" existence lookups.
pub struct CommentRocketLoader {
    store: Arc<dyn Store>,
}

impl CommentRocketLoader {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn into_data_loader(self) -> DataLoader<CommentRocketKey, CommentRocketLoader> {
        DataLoader::new(self)
    }
}

#[async_trait::async_trait]
impl Loader<CommentRocketKey> for CommentRocketLoader {
    type Value = bool;
    type Error = LoaderError;

    async fn load(
        &self,
        keys: &[CommentRocketKey],
    ) -> Result<BatchResults<bool, LoaderError>, LoaderError> {
        let rows = self.store.comment_rockets(keys).await.map_err(Arc::new)?;
        Ok(rows.into_iter().map(Ok).collect())
    }
}

/// Batches "has this user rocketed this post" existence lookups.
pub struct PostRocketLoader {
    store: Arc<dyn Store>,
}

impl PostRocketLoader {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn into_data_loader(self) -> DataLoader<PostRocketKey, PostRocketLoader> {
        DataLoader::new(self)
    }
}

#[async_trait::async_trait]
impl Loader<PostRocketKey> for PostRocketLoader {
    type Value = bool;
    type Error = LoaderError;

    async fn load(
        &self,
        keys: &[PostRocketKey],
    ) -> Result<BatchResults<bool, LoaderError>, LoaderError> {
        let rows = self.store.post_rockets(keys).await.map_err(Arc::new)?;
        Ok(rows.into_iter().map(Ok).collect())
    }
}
