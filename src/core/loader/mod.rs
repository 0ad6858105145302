mod comment;
mod planet;
mod post;
mod rocket;
mod user;

pub use comment::CommentLoader;
pub use planet::JoinedPlanetLoader;
pub use post::PostLoader;
pub use rocket::{CommentRocketLoader, PostRocketLoader};
pub use user::UserLoader;

use std::sync::Arc;

/// Loader errors are shared between every waiter of a batch, hence the Arc.
pub type LoaderError = Arc<anyhow::Error>;
