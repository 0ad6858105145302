use async_graphql::{ComplexObject, Context, Object, ID};
use tracing::debug;

use crate::core::entity::{Comment, CommentRocketKey, CommentSort, Post, User};
use crate::core::error::Error;
use crate::core::request_context::RequestContext;
use crate::core::store::{NewComment, NewNotification};

/// Post ids travel over the wire in base 36.
fn decode_post_id(id: &ID) -> Result<i64, Error> {
    i64::from_str_radix(id.as_str(), 36).map_err(|_| Error::InvalidId(id.to_string()))
}

fn decode_comment_id(id: &ID) -> Result<i64, Error> {
    id.parse::<i64>().map_err(|_| Error::InvalidId(id.to_string()))
}

#[derive(Default)]
pub struct CommentQuery;

#[Object]
impl CommentQuery {
    /// Comments of a post. An unknown post yields an empty list; comments
    /// from authors the viewer blocked are dropped; deleted and removed
    /// comments are masked.
    async fn comments(
        &self,
        ctx: &Context<'_>,
        post_id: ID,
        #[graphql(default)] sort: CommentSort,
    ) -> async_graphql::Result<Vec<Comment>> {
        let rc = ctx.data::<RequestContext>()?;
        let post_id = decode_post_id(&post_id)?;

        let Some(post) = rc.post_loader.load_one(post_id).await.map_err(Error::from)? else {
            return Ok(Vec::new());
        };

        let mut comments = rc
            .store
            .comments_of_post(post.id)
            .await
            .map_err(Error::from)?;

        if let Some(viewer) = rc.viewer_id {
            let blocked = rc
                .store
                .blocked_user_ids(viewer)
                .await
                .map_err(Error::from)?;
            comments.retain(|comment| {
                comment
                    .author_id
                    .map_or(true, |author| !blocked.contains(&author))
            });
        }

        if sort == CommentSort::Top {
            comments.sort_by(|a, b| b.rocket_count.cmp(&a.rocket_count));
        }

        debug!(post_id = post.id, count = comments.len(), "comments");
        Ok(comments.into_iter().map(Comment::masked).collect())
    }
}

#[derive(Default)]
pub struct CommentMutation;

#[Object]
impl CommentMutation {
    /// Submit a comment on a post, optionally under a parent comment. The
    /// author rockets their own comment on arrival, and the post author (or
    /// parent comment author) is notified unless they wrote it themselves.
    async fn submit_comment(
        &self,
        ctx: &Context<'_>,
        text_content: String,
        post_id: ID,
        parent_comment_id: Option<ID>,
    ) -> async_graphql::Result<Comment> {
        let rc = ctx.data::<RequestContext>()?;
        let viewer = rc.require_viewer()?;
        let post_id = decode_post_id(&post_id)?;

        let post = rc
            .post_loader
            .load_one(post_id)
            .await
            .map_err(Error::from)?
            .ok_or(Error::NotFound("Post"))?;

        let parent = match &parent_comment_id {
            Some(id) => Some(
                rc.comment_loader
                    .load_one(decode_comment_id(id)?)
                    .await
                    .map_err(Error::from)?
                    .ok_or(Error::NotFound("Comment"))?,
            ),
            None => None,
        };

        let comment = rc
            .store
            .insert_comment(NewComment {
                text_content,
                post_id: post.id,
                parent_comment_id: parent.as_ref().map(|c| c.id),
                author_id: viewer,
            })
            .await
            .map_err(Error::from)?;

        let key = CommentRocketKey { user_id: viewer, comment_id: comment.id };
        rc.store
            .insert_comment_rocket(key)
            .await
            .map_err(Error::from)?;
        rc.store
            .increment_user_rockets(viewer, 1)
            .await
            .map_err(Error::from)?;
        rc.store
            .increment_post_comments(post.id, 1)
            .await
            .map_err(Error::from)?;

        let recipient = match &parent {
            Some(parent) => parent.author_id,
            None => post.author_id,
        };
        if let Some(to_user_id) = recipient {
            if to_user_id != viewer {
                rc.store
                    .insert_notification(NewNotification {
                        comment_id: comment.id,
                        from_user_id: viewer,
                        to_user_id,
                        post_id: post.id,
                        parent_comment_id: parent.as_ref().map(|c| c.id),
                    })
                    .await
                    .map_err(Error::from)?;
            }
        }

        // This operation already knows the new row and its vote state; seed
        // the loaders so later field resolutions skip the fetch.
        rc.comment_loader.feed_one(comment.id, comment.clone());
        rc.comment_rocket_loader.feed_one(key, true);

        debug!(comment_id = comment.id, post_id = post.id, "submit comment");
        Ok(comment)
    }

    /// Replace a comment's text. Authors may edit their own comments,
    /// admins anyone's.
    async fn edit_comment(
        &self,
        ctx: &Context<'_>,
        comment_id: ID,
        new_text_content: String,
    ) -> async_graphql::Result<bool> {
        let rc = ctx.data::<RequestContext>()?;
        let viewer = rc.require_viewer()?;
        let comment_id = decode_comment_id(&comment_id)?;

        let comment = rc
            .comment_loader
            .load_one(comment_id)
            .await
            .map_err(Error::from)?
            .ok_or(Error::NotFound("Comment"))?;
        let user = rc
            .user_loader
            .load_one(viewer)
            .await
            .map_err(Error::from)?
            .ok_or(Error::NotFound("User"))?;

        if comment.author_id != Some(viewer) && !user.admin {
            return Err(Error::Forbidden(
                "Attempt to edit comment by someone other than author",
            )
            .into());
        }

        rc.store
            .update_comment_text(comment_id, new_text_content)
            .await
            .map_err(Error::from)?;
        rc.comment_loader.clear(&comment_id);

        Ok(true)
    }

    /// Soft-delete a comment. Authors may delete their own comments, admins
    /// anyone's.
    async fn delete_comment(
        &self,
        ctx: &Context<'_>,
        comment_id: ID,
    ) -> async_graphql::Result<bool> {
        let rc = ctx.data::<RequestContext>()?;
        let viewer = rc.require_viewer()?;
        let comment_id = decode_comment_id(&comment_id)?;

        let comment = rc
            .comment_loader
            .load_one(comment_id)
            .await
            .map_err(Error::from)?
            .ok_or(Error::NotFound("Comment"))?;
        let user = rc
            .user_loader
            .load_one(viewer)
            .await
            .map_err(Error::from)?
            .ok_or(Error::NotFound("User"))?;

        if comment.author_id != Some(viewer) && !user.admin {
            return Err(Error::Forbidden(
                "Attempt to delete comment by someone other than author",
            )
            .into());
        }

        rc.store
            .increment_post_comments(comment.post_id, -1)
            .await
            .map_err(Error::from)?;
        rc.store
            .mark_comment_deleted(comment_id)
            .await
            .map_err(Error::from)?;
        rc.comment_loader.clear(&comment_id);

        debug!(comment_id, "delete comment");
        Ok(true)
    }

    /// Flip the viewer's rocket on a comment; returns the new state. The
    /// comment's and its author's rocket counts move with it.
    async fn toggle_comment_rocket(
        &self,
        ctx: &Context<'_>,
        comment_id: ID,
    ) -> async_graphql::Result<bool> {
        let rc = ctx.data::<RequestContext>()?;
        let viewer = rc.require_viewer()?;
        let comment_id = decode_comment_id(&comment_id)?;

        let comment = rc
            .comment_loader
            .load_one(comment_id)
            .await
            .map_err(Error::from)?
            .ok_or(Error::NotFound("Comment"))?;

        let key = CommentRocketKey { user_id: viewer, comment_id };
        let rocketed = rc
            .store
            .comment_rockets(&[key])
            .await
            .map_err(Error::from)?
            .first()
            .copied()
            .flatten()
            .unwrap_or(false);

        let delta = if rocketed {
            rc.store
                .delete_comment_rocket(key)
                .await
                .map_err(Error::from)?;
            -1
        } else {
            rc.store
                .insert_comment_rocket(key)
                .await
                .map_err(Error::from)?;
            1
        };
        rc.store
            .increment_comment_rockets(comment_id, delta)
            .await
            .map_err(Error::from)?;
        if let Some(author_id) = comment.author_id {
            rc.store
                .increment_user_rockets(author_id, delta)
                .await
                .map_err(Error::from)?;
        }

        // A `rocketed` field resolved earlier in this operation may have
        // cached the pre-toggle state; drop it and seed the new one.
        rc.comment_rocket_loader.clear(&key);
        rc.comment_rocket_loader.feed_one(key, !rocketed);
        rc.comment_loader.clear(&comment_id);

        debug!(comment_id, rocketed = !rocketed, "toggle comment rocket");
        Ok(!rocketed)
    }

    async fn save_comment(
        &self,
        ctx: &Context<'_>,
        comment_id: ID,
    ) -> async_graphql::Result<bool> {
        let rc = ctx.data::<RequestContext>()?;
        let viewer = rc.require_viewer()?;
        let comment_id = decode_comment_id(&comment_id)?;

        rc.store
            .save_comment(viewer, comment_id)
            .await
            .map_err(Error::from)?;
        Ok(true)
    }

    async fn unsave_comment(
        &self,
        ctx: &Context<'_>,
        comment_id: ID,
    ) -> async_graphql::Result<bool> {
        let rc = ctx.data::<RequestContext>()?;
        let viewer = rc.require_viewer()?;
        let comment_id = decode_comment_id(&comment_id)?;

        rc.store
            .unsave_comment(viewer, comment_id)
            .await
            .map_err(Error::from)?;
        Ok(true)
    }
}

#[ComplexObject]
impl Comment {
    /// The comment's author, batched through the user loader. Deleted and
    /// removed comments have none.
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

    async fn post(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<Post>> {
        let rc = ctx.data::<RequestContext>()?;
        Ok(rc
            .post_loader
            .load_one(self.post_id)
            .await
            .map_err(Error::from)?)
    }

    /// Whether the viewer has rocketed this comment; false for anonymous
    /// requests.
    async fn rocketed(&self, ctx: &Context<'_>) -> async_graphql::Result<bool> {
        let rc = ctx.data::<RequestContext>()?;
        let Some(viewer) = rc.viewer_id else {
            return Ok(false);
        };
        let key = CommentRocketKey { user_id: viewer, comment_id: self.id };
        Ok(rc
            .comment_rocket_loader
            .load_one(key)
            .await
            .map_err(Error::from)?
            .unwrap_or(false))
    }
}
