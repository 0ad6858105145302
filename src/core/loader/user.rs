use std::sync::Arc;

use super::LoaderError;
use crate::core::data_loader::{BatchResults, DataLoader, Loader};
use crate::core::entity::User;
use crate::core::store::Store;

/// Batches user lookups by id.
pub struct UserLoader {
    store: Arc<dyn Store>,
}

impl UserLoader {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn into_data_loader(self) -> DataLoader<i64, UserLoader> {
        DataLoader::new(self)
    }
}

#[async_trait::async_trait]
impl Loader<i64> for UserLoader {
    type Value = User;
    type Error = LoaderError;

    async fn load(&self, keys: &[i64]) -> Result<BatchResults<User, LoaderError>, LoaderError> {
        let rows = self.store.users_by_ids(keys).await.map_err(Arc::new)?;
        Ok(rows.into_iter().map(Ok).collect())
    }
}
