use anyhow::{anyhow, bail, Result};
use colored::Colorize;
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tidestream::feed::{interesting_posts, posts_per_minute, recent_activity, trending_tags};
use tidestream::prelude::*;
use tidestream::{ENGINE_NAME, VERSION as LIB_VERSION};
use tracing::info;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct ShellHighlighter;

impl Highlighter for ShellHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            Cow::Owned(format!("{} {}", command.yellow().bold(), rest.yellow()))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    const LOGO_TEXT: &str = include_str!("../logo.log");
    println!("{}", LOGO_TEXT.cyan());

    let version_string = format!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    let rule = "-".repeat(72);
    println!("{}", rule.dimmed());
    println!("{}", version_string);
    println!(
        "{}",
        "    Time only moves when you say so: use 'advance <SECONDS>'.".dimmed()
    );
    println!("{}", rule.dimmed());
}

/// The feed, its virtual clock and the pipelines attached to it.
struct Session {
    scheduler: VirtualScheduler,
    feed: Subject<Post>,
    /// Every post published so far, by id, so reposts can refer to them.
    published: HashMap<u64, Post>,
    subscriptions: Vec<Subscription>,
}

impl Session {
    fn new(config: &TidestreamConfig) -> Self {
        let scheduler = VirtualScheduler::new();
        let feed = Subject::new();
        let subscriptions = attach_pipelines(&feed.as_stream(), config, &scheduler);
        Self {
            scheduler,
            feed,
            published: HashMap::new(),
            subscriptions,
        }
    }

    fn publish(&mut self, post: Post) -> Result<()> {
        if self.feed.is_closed() {
            bail!("the feed is complete; restart the shell to publish again");
        }
        println!("--> {} {} at {}", "published".green(), post.id, self.scheduler.now());
        self.published.insert(post.id.0, post.clone());
        self.feed.next(post);
        Ok(())
    }

    fn post(&mut self, args: &[&str]) -> Result<()> {
        let [id, followers, favorites, reposts, tags @ ..] = args else {
            bail!("Usage: post <ID> <FOLLOWERS> <FAVORITES> <REPOSTS> [TAGS...]");
        };
        let post = Post::new(parse(id, "id")?)
            .with_followers(parse(followers, "followers")?)
            .with_favorites(parse(favorites, "favorites")?)
            .with_reposts(parse(reposts, "reposts")?)
            .with_tags(tags.iter().map(|tag| tag.trim_start_matches('#')));
        self.publish(post)
    }

    fn repost(&mut self, args: &[&str]) -> Result<()> {
        let [id, original] = args else {
            bail!("Usage: repost <ID> <ORIGINAL_ID>");
        };
        let original_id: u64 = parse(original, "original id")?;
        let original = self
            .published
            .get(&original_id)
            .cloned()
            .ok_or_else(|| anyhow!("no post #{} has been published", original_id))?;
        let tags = original.tags.clone();
        let post = Post::new(parse(id, "id")?)
            .with_tags(tags)
            .reposting(original.normalized());
        self.publish(post)
    }

    fn advance(&self, args: &[&str]) -> Result<()> {
        let [seconds] = args else {
            bail!("Usage: advance <SECONDS>");
        };
        let seconds: u64 = parse(seconds, "seconds")?;
        self.scheduler.advance_by(Duration::from_secs(seconds));
        println!("--> Clock is now at {}", self.scheduler.now());
        Ok(())
    }

    fn complete(&self) {
        if self.feed.is_closed() {
            println!("--> The feed is already complete.");
            return;
        }
        self.feed.complete();
        println!("--> Feed completed. Pending timers: {}", self.scheduler.pending_timers());
    }

    fn shutdown(&self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

fn parse<T: FromStr>(raw: &str, what: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| anyhow!("'{}' is not a valid {}", raw, what))
}

/// Subscribes all four derived pipelines and prints what they emit.
fn attach_pipelines(
    feed: &Stream<Post>,
    config: &TidestreamConfig,
    scheduler: &VirtualScheduler,
) -> Vec<Subscription> {
    let recent = recent_activity(feed, &config.recent, scheduler.shared()).subscribe_next({
        let clock = scheduler.clone();
        move |post| {
            println!("<-- [{}] {} {}", "RECENT".cyan(), clock.now(), post.id);
        }
    });

    let rate = posts_per_minute(feed, &config.rate, scheduler.shared()).subscribe_next({
        let clock = scheduler.clone();
        move |count| {
            println!("<-- [{}] {} {} posts", "RATE".cyan(), clock.now(), count);
        }
    });

    let interesting = interesting_posts(feed, &config.interesting).subscribe_next(|post| {
        println!(
            "<-- [{}] {} followers={} favorites={} reposts={}",
            "INTERESTING".magenta(),
            post.id,
            post.author_followers,
            post.favorite_count,
            post.repost_count
        );
    });

    let trending = trending_tags(feed, &config.trending, scheduler.shared()).subscribe_next({
        let clock = scheduler.clone();
        move |tags| {
            let rendered: Vec<String> = tags.iter().map(ToString::to_string).collect();
            println!(
                "<-- [{}] {} [{}]",
                "TRENDING".yellow(),
                clock.now(),
                rendered.join(", ")
            );
        }
    });

    vec![recent, rate, interesting, trending]
}

fn print_help() {
    println!("Available commands:");
    println!("  post <ID> <FOL> <FAV> <REP> [TAGS]  - Publishes a post at the current time.");
    println!("  repost <ID> <ORIG>                  - Publishes a repost of an earlier post.");
    println!("  advance <S>                         - Moves the virtual clock forward S seconds.");
    println!("  now                                 - Prints the virtual clock.");
    println!("  timers                              - Counts the timers still scheduled.");
    println!("  complete                            - Completes the feed and flushes windows.");
    println!("  exit                                - Quits the shell.");
}

fn main() -> Result<()> {
    print_banner();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let config_path = env::args().nth(1);
    let config = TidestreamConfig::load(config_path.as_deref())?;
    info!(?config, "configuration loaded");

    let mut session = Session::new(&config);

    let mut rl = Editor::new()?;
    rl.set_helper(Some(ShellHighlighter));

    println!(
        "{} pipelines attached. Type 'help' for commands or 'exit' to quit.",
        ENGINE_NAME.cyan()
    );

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        match rl.readline(&prompt) {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = line.split_whitespace().collect::<Vec<_>>();
                let Some((command, rest)) = args.split_first() else {
                    continue;
                };
                let outcome = match *command {
                    "post" => session.post(rest),
                    "repost" => session.repost(rest),
                    "advance" => session.advance(rest),
                    "now" => {
                        println!("--> {}", session.scheduler.now());
                        Ok(())
                    }
                    "timers" => {
                        println!("--> {} timers pending", session.scheduler.pending_timers());
                        Ok(())
                    }
                    "complete" => {
                        session.complete();
                        Ok(())
                    }
                    "help" => {
                        print_help();
                        Ok(())
                    }
                    "exit" => break,
                    _ => Err(anyhow!("Unknown command: '{}'. Type 'help'.", line.trim())),
                };
                if let Err(error) = outcome {
                    println!("{} {}", "Error:".red(), error);
                }
            }
            Err(_) => {
                println!("Exiting tideshell...");
                break;
            }
        }
    }

    session.shutdown();
    Ok(())
}
