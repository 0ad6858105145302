mod comment;
mod post;
mod user;

pub use comment::{CommentMutation, CommentQuery};

use async_graphql::{EmptySubscription, MergedObject, Schema};

#[derive(MergedObject, Default)]
pub struct Query(CommentQuery);

#[derive(MergedObject, Default)]
pub struct Mutation(CommentMutation);

pub type OrbitSchema = Schema<Query, Mutation, EmptySubscription>;

/// The schema is built once and shared; per-request state (viewer, loaders)
/// travels on each request as a [RequestContext](crate::core::request_context::RequestContext).
pub fn build_schema() -> OrbitSchema {
    Schema::build(Query::default(), Mutation::default(), EmptySubscription).finish()
}
