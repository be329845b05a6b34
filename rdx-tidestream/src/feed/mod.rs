//! The social-media feed model and the pipelines derived from it.
//!
//! The engine itself never looks inside a `Post`; only the key, predicate and
//! mapper functions in [`pipelines`] do.

pub mod pipelines;

pub use pipelines::{interesting_posts, posts_per_minute, recent_activity, trending_tags};

use chrono::{DateTime, Utc};
use std::fmt;

/// Unique identifier of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostId(pub u64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One raw event of the live feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: PostId,
    /// The post this one reposts or quotes, if any.
    pub original: Option<Box<Post>>,
    pub author_followers: u64,
    pub favorite_count: u64,
    pub repost_count: u64,
    /// Tags in the order they appear in the post.
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// A post with no engagement, no tags and no original.
    pub fn new(id: u64) -> Self {
        Self {
            id: PostId(id),
            original: None,
            author_followers: 0,
            favorite_count: 0,
            repost_count: 0,
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_followers(mut self, followers: u64) -> Self {
        self.author_followers = followers;
        self
    }

    pub fn with_favorites(mut self, favorites: u64) -> Self {
        self.favorite_count = favorites;
        self
    }

    pub fn with_reposts(mut self, reposts: u64) -> Self {
        self.repost_count = reposts;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Marks this post as a repost of `original`.
    pub fn reposting(mut self, original: Post) -> Self {
        self.original = Some(Box::new(original));
        self
    }

    pub fn is_repost(&self) -> bool {
        self.original.is_some()
    }

    /// The post that should be judged: the original of a repost, otherwise
    /// the post itself.
    pub fn normalized(self) -> Post {
        match self.original {
            Some(original) => *original,
            None => self,
        }
    }
}

/// How often one tag appeared in one trending window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

impl fmt::Display for TagCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} x{}", self.tag, self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizing_a_repost_yields_the_original() {
        let original = Post::new(1).with_followers(500_000);
        let repost = Post::new(2).reposting(original.clone());
        assert!(repost.is_repost());
        assert_eq!(repost.normalized(), original);
        assert_eq!(Post::new(3).normalized().id, PostId(3));
    }
}
