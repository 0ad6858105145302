use async_graphql::{ComplexObject, Context};

use crate::core::entity::{Post, PostRocketKey, User};
use crate::core::error::Error;
use crate::core::request_context::RequestContext;

#[ComplexObject]
impl Post {
    async fn author(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<User>> {
        let Some(author_id) = self.author_id else {
            return Ok(None);
        };
        let rc = ctx.data::<RequestContext>()?;
        Ok(rc
            .user_loader
            .load_one(author_id)
            .await
            .map_err(Error::from)?)
    }

    /// Whether the viewer has rocketed this post; false for anonymous
    /// requests.
    async fn rocketed(&self, ctx: &Context<'_>) -> async_graphql::Result<bool> {
        let rc = ctx.data::<RequestContext>()?;
        let Some(viewer) = rc.viewer_id else {
            return Ok(false);
        };
        let key = PostRocketKey { user_id: viewer, post_id: self.id };
        Ok(rc
            .post_rocket_loader
            .load_one(key)
            .await
            .map_err(Error::from)?
            .unwrap_or(false))
    }
}
