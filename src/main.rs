// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use podplay::view::format_duration;
use podplay::{
    Feed, FeedError, FeedSource, FileStore, HeadlessTransport, NoopReporter, PersistenceAdapter,
    PlaybackPhase, PlayerApp, PlayerConfig, ProgressEvent, ProgressReporter, ProxyFeedSource,
    ReqwestClient, RssFeedSource, SharedProgressReporter, TransportEvent,
};

// Emoji with fallback for terminals without Unicode support
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PLAYING: Emoji<'_, '_> = Emoji("▶️  ", "> ");
static PAUSED: Emoji<'_, '_> = Emoji("⏸️  ", "| ");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");

/// Podcast aggregator and player with resumable sessions
#[derive(Parser, Debug)]
#[command(name = "podplay")]
#[command(about = "Aggregate podcast feeds and resume playback across sessions")]
#[command(version)]
struct Args {
    /// Directory holding the saved session
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// Episodes per page in the episode list
    #[arg(long, global = true)]
    page_size: Option<usize>,

    /// Fetch feeds through a JSON proxy endpoint instead of reading RSS directly
    #[arg(long, global = true)]
    proxy: Option<String>,

    /// Feed URL to aggregate (repeatable; replaces the built-in list)
    #[arg(long = "feed", global = true)]
    feeds: Vec<String>,

    /// Quiet mode - suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the configured feeds and their load status
    Feeds,
    /// List episodes, newest first
    Episodes {
        /// Page to show (1-based)
        #[arg(short, long, default_value = "1")]
        page: usize,
        /// Show every episode instead of one page
        #[arg(long)]
        all: bool,
        /// Include hidden episodes (dimmed)
        #[arg(long)]
        hidden: bool,
    },
    /// Play an episode, or resume the current one
    Play { id: Option<String> },
    /// Pause and save the current position
    Pause,
    /// Jump to a position in the current episode
    Seek { seconds: f64 },
    /// Skip to the next playable episode
    Next,
    /// Go back to the previous playable episode
    Previous,
    /// Hide an episode from the list and from navigation
    Hide { id: String },
    /// Unhide an episode
    Show { id: String },
    /// Show what is playing and where
    Status,
    /// Forget the current episode and all saved progress
    Reset,
}

/// Either way of turning a feed URL into a feed
enum Source {
    Rss(RssFeedSource<ReqwestClient>),
    Proxy(ProxyFeedSource<ReqwestClient>),
}

#[async_trait]
impl FeedSource for Source {
    async fn fetch(&self, url: &str) -> Result<Feed, FeedError> {
        match self {
            Source::Rss(source) => source.fetch(url).await,
            Source::Proxy(source) => source.fetch(url).await,
        }
    }
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(spinner_style("{spinner:.green} {wide_msg}"));
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            main_bar,
        }
    }

    fn bar_for(&self, url: &str) -> Option<ProgressBar> {
        let mut bars = self.bars.lock().ok()?;
        let bar = bars.entry(url.to_string()).or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new_spinner());
            bar.set_style(spinner_style("  {spinner:.cyan} {wide_msg}"));
            bar
        });
        Some(bar.clone())
    }
}

fn spinner_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { url } => {
                if let Some(bar) = self.bar_for(&url) {
                    bar.set_message(format!("{SEARCH}{}", url.cyan()));
                }
                self.main_bar.set_message("Loading feeds...");
            }

            ProgressEvent::FeedLoaded {
                url,
                title,
                episode_count,
            } => {
                if let Some(bar) = self.bar_for(&url) {
                    bar.finish_with_message(format!(
                        "{SUCCESS}{} ({} episodes)",
                        title.green(),
                        episode_count.to_string().cyan()
                    ));
                }
            }

            ProgressEvent::FeedFailed { url, error } => {
                if let Some(bar) = self.bar_for(&url) {
                    bar.abandon_with_message(format!("{FAILURE}{} - {}", url.red(), error.dimmed()));
                }
            }

            ProgressEvent::AggregationCompleted {
                loaded_count,
                failed_count,
                episode_count,
            } => {
                self.main_bar.finish_and_clear();
                if let Ok(mut bars) = self.bars.lock() {
                    for (_, bar) in bars.drain() {
                        bar.finish_and_clear();
                    }
                }
                eprintln!(
                    "{HEADPHONES}{} feeds loaded, {} failed, {} episodes",
                    loaded_count.to_string().green().bold(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    },
                    episode_count.to_string().cyan()
                );
            }
        }
    }
}

/// Initialize tracing on stderr so command output stays clean
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_config(args: &Args) -> PlayerConfig {
    let mut config = PlayerConfig::default();
    if let Some(dir) = &args.state_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(per_page) = args.page_size {
        config = config.with_episodes_per_page(per_page);
    }
    if !args.feeds.is_empty() {
        config = config.with_feeds(args.feeds.clone());
    }
    config
}

/// The headless transport never decodes audio, so report the episode's
/// declared duration as soon as a load is pending. A restored episode that
/// was playing keeps playing.
async fn settle(app: &mut PlayerApp<Source>) {
    let pending = {
        let core = app.session().lock().await;
        match (core.phase(), core.active_load()) {
            (PlaybackPhase::Loading, Some(load)) => {
                let duration = core
                    .current_episode()
                    .map(|e| e.duration_seconds as f64)
                    .unwrap_or(0.0);
                Some((load, duration))
            }
            _ => None,
        }
    };

    if let Some((load, duration_seconds)) = pending {
        app.transport_event(load, TransportEvent::MetadataLoaded { duration_seconds })
            .await;
    }
    app.resume_restored().await;
}

async fn print_status(app: &PlayerApp<Source>) {
    let core = app.session().lock().await;
    let Some(episode) = core.current_episode() else {
        println!("{}", "Nothing playing".dimmed());
        return;
    };

    let (icon, label) = match core.phase() {
        PlaybackPhase::ReadyPlaying | PlaybackPhase::Loading if core.is_playing() => {
            (PLAYING, "playing".green().bold())
        }
        PlaybackPhase::Errored => (FAILURE, "error".red().bold()),
        _ => (PAUSED, "paused".yellow().bold()),
    };
    println!("{icon}{} {}", episode.title.bold(), label);
    println!(
        "   {} • {} / {}",
        episode.feed_title.cyan(),
        format_duration(core.current_time() as u64),
        format_duration(core.duration() as u64)
    );
    if let Some(error) = core.last_error() {
        println!("   {}", error.to_string().red());
    }
}

async fn print_episodes(app: &PlayerApp<Source>, all: bool) {
    let rows = if all { app.all_rows().await } else { app.rows().await };
    if rows.is_empty() {
        println!("{}", "No episodes".dimmed());
        return;
    }

    for row in rows {
        let marker = if row.playing {
            PLAYING.to_string()
        } else if row.current {
            PAUSED.to_string()
        } else {
            "   ".to_string()
        };
        let mut title = if row.played {
            row.title.normal()
        } else {
            row.title.bold()
        };
        if row.hidden || !row.playable {
            title = title.dimmed();
        }
        let progress = row
            .saved_progress
            .map(|t| format!(" @{}", format_duration(t as u64)))
            .unwrap_or_default();

        println!("{marker}{} {}", title, format!("[{}]", row.id).dimmed());
        println!(
            "   {} • {} • {}{}",
            row.feed_title.cyan(),
            row.published,
            format_duration(row.duration_seconds),
            progress.yellow()
        );
        if !row.description.is_empty() {
            println!("   {}", row.description.dimmed());
        }
    }

    if !all {
        println!(
            "\nPage {} of {}",
            app.view().page(),
            app.total_pages().await
        );
    }
}

async fn print_feeds(app: &PlayerApp<Source>) {
    let core = app.session().lock().await;
    for feed in core.catalog().feeds() {
        if feed.is_placeholder() {
            println!("{FAILURE}{}", feed.title.red());
            println!("   {}", feed.description.dimmed());
        } else {
            println!(
                "{SUCCESS}{} ({} episodes)",
                feed.title.bold(),
                feed.episodes.len().to_string().cyan()
            );
            println!("   {}", feed.url.dimmed());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = build_config(&args);
    let client = ReqwestClient::new();
    let source = match &args.proxy {
        Some(endpoint) => Source::Proxy(
            ProxyFeedSource::new(client, endpoint).context("Invalid proxy endpoint")?,
        ),
        None => Source::Rss(RssFeedSource::new(client)),
    };

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    let store = Arc::new(FileStore::new(&config.data_dir));
    let persistence = PersistenceAdapter::new(store, config.storage_key.clone());
    let mut app = PlayerApp::new(
        source,
        reporter,
        Box::new(HeadlessTransport::new()),
        persistence,
        config,
    );

    app.restore().await;
    app.load_feeds().await;
    settle(&mut app).await;

    if let Some(banner) = app.error_banner() {
        eprintln!("{WARNING}{}", banner.yellow());
    }

    match args.command {
        Command::Feeds => print_feeds(&app).await,
        Command::Episodes { page, all, hidden } => {
            app.set_show_hidden(hidden).await;
            app.set_page(page).await;
            print_episodes(&app, all).await;
        }
        Command::Play { id } => {
            match id {
                Some(id) => {
                    if app.select_episode(&id).await.is_none() {
                        anyhow::bail!("Cannot play episode {id}");
                    }
                    settle(&mut app).await;
                }
                None => {
                    if !app.play().await {
                        anyhow::bail!("Nothing to resume");
                    }
                }
            }
            print_status(&app).await;
        }
        Command::Pause => {
            if !app.pause().await {
                anyhow::bail!("Nothing is playing");
            }
            print_status(&app).await;
        }
        Command::Seek { seconds } => {
            if !app.seek(seconds).await {
                anyhow::bail!("Cannot seek to {seconds}");
            }
            print_status(&app).await;
        }
        Command::Next => {
            if app.next_episode().await.is_none() {
                anyhow::bail!("No next episode");
            }
            settle(&mut app).await;
            print_status(&app).await;
        }
        Command::Previous => {
            if app.previous_episode().await.is_none() {
                anyhow::bail!("No previous episode");
            }
            settle(&mut app).await;
            print_status(&app).await;
        }
        Command::Hide { id } => {
            app.hide_episode(&id).await;
            println!("Hidden {}", id.cyan());
        }
        Command::Show { id } => {
            app.show_episode(&id).await;
            println!("Showing {}", id.cyan());
        }
        Command::Status => print_status(&app).await,
        Command::Reset => {
            app.reset().await;
            println!("{}", "Session cleared".green());
            return Ok(());
        }
    }

    app.shutdown().await;
    Ok(())
}
