//! The derived metrics computed over the live feed.
//!
//! Each function only composes operators; none of them keeps state of its
//! own. Pass the same `SchedulerRef` the feed's producer uses so all
//! time-based operators share one timeline.

use super::{Post, TagCount};
use crate::config::{InterestThresholds, RateConfig, RateStrategy, RecentConfig, TrendingConfig};
use crate::scheduler::SchedulerRef;
use crate::stream::Stream;

/// At most one post per sample interval: the latest one seen.
pub fn recent_activity(
    feed: &Stream<Post>,
    config: &RecentConfig,
    scheduler: SchedulerRef,
) -> Stream<Post> {
    feed.sample(config.sample_interval(), scheduler)
}

/// The number of posts in each tumbling rate window, empty windows included.
pub fn posts_per_minute(
    feed: &Stream<Post>,
    config: &RateConfig,
    scheduler: SchedulerRef,
) -> Stream<usize> {
    match config.strategy {
        RateStrategy::Buffer => feed
            .buffer_with_time(config.window(), scheduler)
            .map(|batch| batch.len()),
        RateStrategy::Window => feed
            .window_with_time(config.window(), scheduler)
            .map(|window| window.count())
            .merge_all(),
    }
}

impl InterestThresholds {
    /// Whether `post` clears any one of the thresholds.
    pub fn admits(&self, post: &Post) -> bool {
        post.author_followers > self.min_followers
            || post.repost_count > self.min_reposts
            || post.favorite_count > self.min_favorites
    }
}

/// Posts worth a closer look, each reported once.
///
/// Reposts are judged by their original, so a popular post and all of its
/// reposts surface as the single original post.
pub fn interesting_posts(feed: &Stream<Post>, thresholds: &InterestThresholds) -> Stream<Post> {
    let retention = thresholds.dedup_retention();
    let thresholds = thresholds.clone();
    feed.map(Post::normalized)
        .filter(move |post| thresholds.admits(post))
        .distinct_with(|post| post.id, retention)
}

/// Per trending window, the tags seen more than `min_count` times, in the
/// order they first appeared in that window.
pub fn trending_tags(
    feed: &Stream<Post>,
    config: &TrendingConfig,
    scheduler: SchedulerRef,
) -> Stream<Vec<TagCount>> {
    let min_count = config.min_count;
    feed.window_with_time(config.window(), scheduler)
        .flat_map(move |window| {
            window
                .flat_map(|post: Post| Stream::of(post.tags))
                .group_by(|tag: &String| tag.clone())
                .flat_map(|group| {
                    let tag = group.key;
                    group.stream.count().map(move |count| TagCount {
                        tag: tag.clone(),
                        count,
                    })
                })
                .filter(move |tally| tally.count > min_count)
                .to_vec()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_single_threshold_admits_a_post() {
        let thresholds = InterestThresholds::default();
        assert!(thresholds.admits(&Post::new(1).with_followers(150_000)));
        assert!(thresholds.admits(&Post::new(2).with_reposts(101)));
        assert!(thresholds.admits(&Post::new(3).with_favorites(101)));
        assert!(!thresholds.admits(&Post::new(4).with_followers(10).with_reposts(5)));
        assert!(!thresholds.admits(&Post::new(5).with_followers(100_000)));
    }
}
