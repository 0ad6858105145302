use std::sync::Arc;

use super::LoaderError;
use crate::core::data_loader::{BatchResults, DataLoader, Loader};
use crate::core::entity::Comment;
use crate::core::store::Store;

/// Batches comment lookups by id.
pub struct CommentLoader {
    store: Arc<dyn Store>,
}

impl CommentLoader {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn into_data_loader(self) -> DataLoader<i64, CommentLoader> {
        DataLoader::new(self)
    }
}

#[async_trait::async_trait]
impl Loader<i64> for CommentLoader {
    type Value = Comment;
    type Error = LoaderError;

    async fn load(&self, keys: &[i64]) -> Result<BatchResults<Comment, LoaderError>, LoaderError> {
        let rows = self.store.comments_by_ids(keys).await.map_err(Arc::new)?;
        Ok(rows.into_iter().map(Ok).collect())
    }
}
