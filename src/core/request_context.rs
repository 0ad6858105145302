use std::sync::Arc;

use crate::core::data_loader::DataLoader;
use crate::core::entity::{CommentRocketKey, PostRocketKey};
use crate::core::error::{Error, Result};
use crate::core::loader::{
    CommentLoader, CommentRocketLoader, JoinedPlanetLoader, PostLoader, PostRocketLoader,
    UserLoader,
};
use crate::core::store::Store;

/// Everything one GraphQL operation needs: the store, the authenticated
/// viewer (if any), and one fresh data loader per lookup shape.
///
/// Built once per inbound request and attached to it with `Request::data`.
/// Loader caches live exactly as long as this struct; reusing it across
/// requests would serve one viewer's cached rows to another.
pub struct RequestContext {
    pub store: Arc<dyn Store>,
    pub viewer_id: Option<i64>,
    pub user_loader: DataLoader<i64, UserLoader>,
    pub post_loader: DataLoader<i64, PostLoader>,
    pub comment_loader: DataLoader<i64, CommentLoader>,
    pub comment_rocket_loader: DataLoader<CommentRocketKey, CommentRocketLoader>,
    pub post_rocket_loader: DataLoader<PostRocketKey, PostRocketLoader>,
    pub joined_planet_loader: DataLoader<i64, JoinedPlanetLoader>,
}

impl RequestContext {
    pub fn new(store: Arc<dyn Store>, viewer_id: Option<i64>) -> Self {
        Self {
            viewer_id,
            user_loader: UserLoader::new(store.clone()).into_data_loader(),
            post_loader: PostLoader::new(store.clone()).into_data_loader(),
            comment_loader: CommentLoader::new(store.clone()).into_data_loader(),
            comment_rocket_loader: CommentRocketLoader::new(store.clone()).into_data_loader(),
            post_rocket_loader: PostRocketLoader::new(store.clone()).into_data_loader(),
            joined_planet_loader: JoinedPlanetLoader::new(store.clone()).into_data_loader(),
            store,
        }
    }

    /// The viewer id, or [Error::Unauthenticated] for anonymous requests.
    /// Mutations start with this.
    pub fn require_viewer(&self) -> Result<i64> {
        self.viewer_id.ok_or(Error::Unauthenticated)
    }
}
