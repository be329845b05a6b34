use anyhow::Result;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;
use tidestream::feed::{interesting_posts, posts_per_minute, recent_activity, trending_tags};
use tidestream::prelude::*;
use tidestream::ENGINE_NAME;
use tokio::task::LocalSet;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// How often the simulated producer publishes a post.
const POST_INTERVAL: Duration = Duration::from_millis(200);

/// How many published posts the producer keeps around to repost from.
const RECENT_POSTS: usize = 32;

const TAGS: [&str; 6] = ["rust", "async", "tokio", "streams", "release", "weekend"];

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // 2. Load the pipeline configuration (optional TOML path as first argument).
    let config_path = std::env::args().nth(1);
    let config = TidestreamConfig::load(config_path.as_deref())?;
    info!(?config, "configuration loaded");

    // 3. Everything below runs on one thread, pinned by the LocalSet.
    LocalSet::new().run_until(run(config)).await
}

async fn run(config: TidestreamConfig) -> Result<()> {
    let scheduler: SchedulerRef = Rc::new(RealTimeScheduler::new());
    let feed = Subject::new();

    // 4. Attach every derived pipeline before the producer starts.
    let subscriptions = subscribe_pipelines(&feed.as_stream(), &config, &scheduler);

    // 5. Start the simulated producer.
    let producer = start_producer(&feed, &scheduler);

    info!(
        "{} running with {} pipelines. Press Ctrl+C to shut down.",
        ENGINE_NAME,
        subscriptions.len()
    );
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Completing the feed...");
    producer.cancel();
    feed.complete();
    for subscription in &subscriptions {
        subscription.unsubscribe();
    }
    info!("{} has shut down.", ENGINE_NAME);
    Ok(())
}

/// Subscribes the four derived pipelines and logs their output.
fn subscribe_pipelines(
    feed: &Stream<Post>,
    config: &TidestreamConfig,
    scheduler: &SchedulerRef,
) -> Vec<Subscription> {
    let recent = recent_activity(feed, &config.recent, scheduler.clone()).subscribe_next(|post| {
        info!(
            "[RECENT] => {} followers={} tags={:?}",
            post.id, post.author_followers, post.tags
        );
    });

    let rate = posts_per_minute(feed, &config.rate, scheduler.clone()).subscribe_next({
        let strategy = config.rate.strategy;
        move |count| info!("[RATE] => {} posts in the last window ({:?})", count, strategy)
    });

    let interesting = interesting_posts(feed, &config.interesting).subscribe_next(|post| {
        info!(
            "[INTERESTING] => {} followers={} favorites={} reposts={}",
            post.id, post.author_followers, post.favorite_count, post.repost_count
        );
    });

    let trending = trending_tags(feed, &config.trending, scheduler.clone()).subscribe_next(|tags| {
        let rendered: Vec<String> = tags.iter().map(ToString::to_string).collect();
        info!("[TRENDING] => [{}]", rendered.join(", "));
    });

    vec![recent, rate, interesting, trending]
}

/// Publishes a deterministic pseudo-random post every `POST_INTERVAL`.
fn start_producer(feed: &Subject<Post>, scheduler: &SchedulerRef) -> CancelToken {
    let feed = feed.clone();
    let mut published: VecDeque<Post> = VecDeque::with_capacity(RECENT_POSTS + 1);
    let mut sequence: u64 = 0;
    scheduler.schedule_periodic(
        POST_INTERVAL,
        Box::new(move || {
            sequence += 1;
            let post = synthesize(sequence, &published);
            published.push_back(post.clone());
            if published.len() > RECENT_POSTS {
                published.pop_front();
            }
            feed.next(post);
        }),
    )
}

fn synthesize(sequence: u64, recent: &VecDeque<Post>) -> Post {
    let tag_count = (sequence % 3) as usize + 1;
    let tags = (0..tag_count).map(|i| TAGS[((sequence as usize) * 5 + i * 2) % TAGS.len()]);
    let post = Post::new(sequence)
        .with_followers(sequence.wrapping_mul(7_919) % 180_000)
        .with_favorites(sequence.wrapping_mul(31) % 140)
        .with_reposts(sequence.wrapping_mul(17) % 130)
        .with_tags(tags);

    match recent.iter().rev().nth(2) {
        Some(original) if sequence % 5 == 0 => post.reposting(original.clone().normalized()),
        _ => post,
    }
}
