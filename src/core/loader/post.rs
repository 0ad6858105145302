use std::sync::Arc;

use super::LoaderError;
use crate::core::data_loader::{BatchResults, DataLoader, Loader};
use crate::core::entity::Post;
use crate::core::store::Store;

/// Batches post lookups by id.
pub struct PostLoader {
    store: Arc<dyn Store>,
}

impl PostLoader {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn into_data_loader(self) -> DataLoader<i64, PostLoader> {
        DataLoader::new(self)
    }
}

#[async_trait::async_trait]
impl Loader<i64> for PostLoader {
    type Value = Post;
    type Error = LoaderError;

    async fn load(&self, keys: &[i64]) -> Result<BatchResults<Post, LoaderError>, LoaderError> {
        let rows = self.store.posts_by_ids(keys).await.map_err(Arc::new)?;
        Ok(rows.into_iter().map(Ok).collect())
    }
}
