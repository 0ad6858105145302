use async_graphql::{ComplexObject, Context};

use crate::core::entity::{Planet, User};
use crate::core::error::Error;
use crate::core::request_context::RequestContext;

#[ComplexObject]
impl User {
    /// Planets this user has joined, batched per request so a page of
    /// comments resolves memberships with one fetch.
    async fn joined_planets(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<Planet>> {
        let rc = ctx.data::<RequestContext>()?;
        Ok(rc
            .joined_planet_loader
            .load_one(self.id)
            .await
            .map_err(Error::from)?
            .unwrap_or_default())
    }
}
