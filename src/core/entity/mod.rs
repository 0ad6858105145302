mod comment;
mod notification;
mod planet;
mod post;
mod user;

pub use comment::{Comment, CommentRocketKey, CommentSort};
pub use notification::Notification;
pub use planet::Planet;
pub use post::{Post, PostRocketKey};
pub use user::User;
