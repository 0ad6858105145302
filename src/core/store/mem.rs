use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use anyhow::Result;
use chrono::Utc;
use tracing::debug;

use super::{NewComment, NewNotification, Store};
use crate::core::entity::{
    Comment, CommentRocketKey, Notification, Planet, Post, PostRocketKey, User,
};

#[derive(Default)]
struct State {
    users: HashMap<i64, User>,
    posts: HashMap<i64, Post>,
    comments: HashMap<i64, Comment>,
    planets: HashMap<i64, Planet>,
    memberships: HashMap<i64, Vec<i64>>,
    comment_rockets: HashSet<CommentRocketKey>,
    post_rockets: HashSet<PostRocketKey>,
    notifications: Vec<Notification>,
    saved_comments: HashMap<i64, BTreeSet<i64>>,
    blocks: HashMap<i64, BTreeSet<i64>>,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [Store], used by the tests and as the reference semantics for
/// database-backed implementations.
#[derive(Default)]
pub struct MemStore {
    state: Mutex<State>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, username: &str, admin: bool) -> User {
        let mut state = self.state.lock().unwrap();
        let user = User {
            id: state.next_id(),
            username: username.to_string(),
            admin,
            banned: false,
            rocket_count: 0,
        };
        state.users.insert(user.id, user.clone());
        user
    }

    pub fn add_planet(&self, name: &str) -> Planet {
        let mut state = self.state.lock().unwrap();
        let planet = Planet { id: state.next_id(), name: name.to_string() };
        state.planets.insert(planet.id, planet.clone());
        planet
    }

    pub fn add_post(&self, title: &str, author_id: i64, planet_id: i64) -> Post {
        let mut state = self.state.lock().unwrap();
        let post = Post {
            id: state.next_id(),
            title: title.to_string(),
            link: None,
            author_id: Some(author_id),
            planet_id,
            created_at: Utc::now(),
            comment_count: 0,
            rocket_count: 0,
        };
        state.posts.insert(post.id, post.clone());
        post
    }

    pub fn join_planet(&self, user_id: i64, planet_id: i64) {
        let mut state = self.state.lock().unwrap();
        let joined = state.memberships.entry(user_id).or_default();
        if !joined.contains(&planet_id) {
            joined.push(planet_id);
        }
    }

    pub fn block_user(&self, user_id: i64, blocked_id: i64) {
        let mut state = self.state.lock().unwrap();
        state.blocks.entry(user_id).or_default().insert(blocked_id);
    }

    // Test-facing reads below; the trait only exposes what resolvers need.

    pub fn comment(&self, comment_id: i64) -> Option<Comment> {
        self.state.lock().unwrap().comments.get(&comment_id).cloned()
    }

    pub fn user(&self, user_id: i64) -> Option<User> {
        self.state.lock().unwrap().users.get(&user_id).cloned()
    }

    pub fn post(&self, post_id: i64) -> Option<Post> {
        self.state.lock().unwrap().posts.get(&post_id).cloned()
    }

    pub fn notifications_for(&self, user_id: i64) -> Vec<Notification> {
        self.state
            .lock()
            .unwrap()
            .notifications
            .iter()
            .filter(|n| n.to_user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn saved_comment_ids(&self, user_id: i64) -> Vec<i64> {
        self.state
            .lock()
            .unwrap()
            .saved_comments
            .get(&user_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Store for MemStore {
    async fn users_by_ids(&self, ids: &[i64]) -> Result<Vec<Option<User>>> {
        let state = self.state.lock().unwrap();
        Ok(ids.iter().map(|id| state.users.get(id).cloned()).collect())
    }

    async fn posts_by_ids(&self, ids: &[i64]) -> Result<Vec<Option<Post>>> {
        let state = self.state.lock().unwrap();
        Ok(ids.iter().map(|id| state.posts.get(id).cloned()).collect())
    }

    async fn comments_by_ids(&self, ids: &[i64]) -> Result<Vec<Option<Comment>>> {
        let state = self.state.lock().unwrap();
        Ok(ids.iter().map(|id| state.comments.get(id).cloned()).collect())
    }

    async fn comment_rockets(&self, keys: &[CommentRocketKey]) -> Result<Vec<Option<bool>>> {
        let state = self.state.lock().unwrap();
        Ok(keys
            .iter()
            .map(|key| {
                state
                    .users
                    .contains_key(&key.user_id)
                    .then(|| state.comment_rockets.contains(key))
            })
            .collect())
    }

    async fn post_rockets(&self, keys: &[PostRocketKey]) -> Result<Vec<Option<bool>>> {
        let state = self.state.lock().unwrap();
        Ok(keys
            .iter()
            .map(|key| {
                state
                    .users
                    .contains_key(&key.user_id)
                    .then(|| state.post_rockets.contains(key))
            })
            .collect())
    }

    async fn joined_planets(&self, user_ids: &[i64]) -> Result<Vec<Option<Vec<Planet>>>> {
        let state = self.state.lock().unwrap();
        Ok(user_ids
            .iter()
            .map(|id| {
                state.users.contains_key(id).then(|| {
                    state
                        .memberships
                        .get(id)
                        .into_iter()
                        .flatten()
                        .filter_map(|planet_id| state.planets.get(planet_id).cloned())
                        .collect()
                })
            })
            .collect())
    }

    async fn comments_of_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let state = self.state.lock().unwrap();
        let mut comments: Vec<Comment> = state
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.rocket_count.cmp(&a.rocket_count))
                .then(b.id.cmp(&a.id))
        });
        Ok(comments)
    }

    async fn insert_comment(&self, new: NewComment) -> Result<Comment> {
        let mut state = self.state.lock().unwrap();
        let comment = Comment {
            id: state.next_id(),
            text_content: new.text_content,
            post_id: new.post_id,
            parent_comment_id: new.parent_comment_id,
            author_id: Some(new.author_id),
            created_at: Utc::now(),
            edited_at: None,
            deleted: false,
            removed: false,
            removed_reason: None,
            rocket_count: 1,
        };
        debug!(comment_id = comment.id, post_id = comment.post_id, "insert comment");
        state.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn update_comment_text(&self, comment_id: i64, text_content: String) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(comment) = state.comments.get_mut(&comment_id) {
            comment.text_content = text_content;
            comment.edited_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_comment_deleted(&self, comment_id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(comment) = state.comments.get_mut(&comment_id) {
            comment.deleted = true;
        }
        Ok(())
    }

    async fn insert_comment_rocket(&self, key: CommentRocketKey) -> Result<()> {
        self.state.lock().unwrap().comment_rockets.insert(key);
        Ok(())
    }

    async fn delete_comment_rocket(&self, key: CommentRocketKey) -> Result<()> {
        self.state.lock().unwrap().comment_rockets.remove(&key);
        Ok(())
    }

    async fn increment_comment_rockets(&self, comment_id: i64, delta: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(comment) = state.comments.get_mut(&comment_id) {
            comment.rocket_count += delta;
        }
        Ok(())
    }

    async fn increment_user_rockets(&self, user_id: i64, delta: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.get_mut(&user_id) {
            user.rocket_count += delta;
        }
        Ok(())
    }

    async fn increment_post_comments(&self, post_id: i64, delta: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(post) = state.posts.get_mut(&post_id) {
            post.comment_count += delta;
        }
        Ok(())
    }

    async fn insert_notification(&self, new: NewNotification) -> Result<Notification> {
        let mut state = self.state.lock().unwrap();
        let notification = Notification {
            id: state.next_id(),
            comment_id: new.comment_id,
            from_user_id: new.from_user_id,
            to_user_id: new.to_user_id,
            post_id: new.post_id,
            parent_comment_id: new.parent_comment_id,
            created_at: Utc::now(),
            read: false,
        };
        debug!(
            to_user_id = notification.to_user_id,
            comment_id = notification.comment_id,
            "insert notification"
        );
        state.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn save_comment(&self, user_id: i64, comment_id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .saved_comments
            .entry(user_id)
            .or_default()
            .insert(comment_id);
        Ok(())
    }

    async fn unsave_comment(&self, user_id: i64, comment_id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(saved) = state.saved_comments.get_mut(&user_id) {
            saved.remove(&comment_id);
        }
        Ok(())
    }

    async fn blocked_user_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .blocks
            .get(&user_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }
}
