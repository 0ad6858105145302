use std::sync::Arc;

use super::LoaderError;
use crate::core::data_loader::{BatchResults, DataLoader, Loader};
use crate::core::entity::Planet;
use crate::core::store::Store;

/// Batches "which planets has this user joined" lookups by user id.
pub struct JoinedPlanetLoader {
    store: Arc<dyn Store>,
}

impl JoinedPlanetLoader {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn into_data_loader(self) -> DataLoader<i64, JoinedPlanetLoader> {
        DataLoader::new(self)
    }
}

#[async_trait::async_trait]
impl Loader<i64> for JoinedPlanetLoader {
    type Value = Vec<Planet>;
    type Error = LoaderError;

    async fn load(
        &self,
        keys: &[i64],
    ) -> Result<BatchResults<Vec<Planet>, LoaderError>, LoaderError> {
        let rows = self.store.joined_planets(keys).await.map_err(Arc::new)?;
        Ok(rows.into_iter().map(Ok).collect())
    }
}
