//! Terminal driver for a reading session.
//!
//! Opens a series from the local library, resuming the last-read position
//! when no chapter is given, then reads single-letter commands from stdin.

use anyhow::{Context, Result, anyhow};
use chapter_reader::cache::load_last_read;
use chapter_reader::config::{
    DEFAULT_CONFIG_PATH, LogLevel, LoggingConfig, ReaderConfig, load_config,
};
use chapter_reader::pagination::Paginator;
use chapter_reader::{
    ChapterEntry, ChapterRoute, LocalLibrary, Navigation, ReadingSession, ResilientInvoker,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const USAGE: &str = "Usage: chapter-reader [--config PATH] <series> [chapter] [page]";
const COMMANDS: &str = "commands: n/p page, N/P chapter, d [count] bulk download, \
s <chapter> download one, l [page] list chapters, o toggle order, q quit";

struct Args {
    config_path: PathBuf,
    series_id: String,
    chapter_id: Option<u32>,
    page: Option<usize>,
}

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    let config = load_config(&args.config_path);
    apply_logging(reload_handle, &config.logging);
    info!(
        series = %args.series_id,
        config = %args.config_path.display(),
        level = %config.logging.log_level,
        "Starting chapter reader"
    );
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(read_series(args, config))
}

async fn read_series(args: Args, config: ReaderConfig) -> Result<()> {
    let library = Arc::new(LocalLibrary::from_config(&config.library));
    let route = initial_route(&library, &args)?;
    info!(route = %route, "Opening chapter");

    let invoker = ResilientInvoker::new(config.retry);
    let mut session = ReadingSession::new(Arc::clone(&library), invoker, route);
    let _subscription = session.events().subscribe(|event| {
        match serde_json::to_string(event) {
            Ok(json) => info!(kind = event.kind(), "{json}"),
            Err(err) => warn!("Failed to serialize session event: {err}"),
        }
    });
    session.load().await;
    print_position(&session);

    let mut chapters = Paginator::from_config(
        &library.list_chapters(&args.series_id).unwrap_or_default(),
        &config.pagination,
    );
    let series_path = library.series_path(&args.series_id);

    println!("{COMMANDS}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };
        let argument = parts.next();
        match command {
            "n" => report(session.next_page().await),
            "p" => report(session.prev_page().await),
            "N" => report(session.next_chapter().await),
            "P" => report(session.prev_chapter().await),
            "d" => {
                let count = argument.and_then(|value| value.parse().ok()).unwrap_or(1);
                let ok = session.download_bulk(&series_path, count).await;
                println!("bulk download of {count}: {}", if ok { "ok" } else { "failed" });
                refresh_chapters(&library, &args.series_id, &mut chapters);
            }
            "s" => {
                let Some(chapter_id) = argument.and_then(|value| value.parse::<u32>().ok()) else {
                    println!("usage: s <chapter>");
                    continue;
                };
                let mut entry = chapters
                    .items()
                    .iter()
                    .find(|entry| entry.chapter_id == chapter_id)
                    .cloned()
                    .unwrap_or(ChapterEntry {
                        chapter_id,
                        title: format!("Chapter {chapter_id}"),
                        downloaded: false,
                    });
                match session.download_single(&series_path, &mut entry).await {
                    Ok(()) => println!("chapter {chapter_id} downloaded"),
                    Err(err) => println!("chapter {chapter_id}: {err}"),
                }
                refresh_chapters(&library, &args.series_id, &mut chapters);
            }
            "l" => {
                if let Some(page) = argument.and_then(|value| value.parse().ok()) {
                    chapters.change_page(page);
                }
                print_chapters(&chapters);
            }
            "o" => {
                chapters.toggle_order();
                print_chapters(&chapters);
            }
            "q" => break,
            other => println!("unknown command {other:?}; {COMMANDS}"),
        }
        if matches!(command, "n" | "p" | "N" | "P") {
            print_position(&session);
        }
    }
    info!("Exiting chapter reader");
    Ok(())
}

fn initial_route(library: &LocalLibrary, args: &Args) -> Result<ChapterRoute> {
    if let Some(chapter_id) = args.chapter_id {
        return Ok(ChapterRoute::new(
            args.series_id.clone(),
            chapter_id,
            args.page.unwrap_or(0),
        )?);
    }
    if let Some(last_read) = load_last_read(library.cache_dir(), &args.series_id) {
        info!(
            chapter = last_read.chapter,
            page = last_read.page,
            "Resuming from last-read position"
        );
        return Ok(ChapterRoute::new(
            args.series_id.clone(),
            last_read.chapter,
            last_read.page,
        )?);
    }
    let first = library
        .chapter_ids(&args.series_id)?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Series {} has no chapters", args.series_id))?;
    Ok(ChapterRoute::new(args.series_id.clone(), first, 0)?)
}

fn refresh_chapters(library: &LocalLibrary, series_id: &str, chapters: &mut Paginator<ChapterEntry>) {
    match library.list_chapters(series_id) {
        Ok(listing) => chapters.set_items(&listing),
        Err(err) => warn!("Failed to refresh chapter list: {err:#}"),
    }
}

fn report(navigation: Navigation) {
    match navigation {
        Navigation::Page(page) => println!("page {page}"),
        Navigation::Chapter(route) => println!("opened {route}"),
        Navigation::Stayed => println!("stayed"),
    }
}

fn print_position(session: &ReadingSession<LocalLibrary>) {
    let chapter = session.chapter();
    if let Some(error) = &chapter.error {
        println!("error: {error}");
    }
    match chapter.current_resource() {
        Some(resource) => println!(
            "{} ch.{} page {}/{}: {}",
            chapter.series_id,
            chapter.chapter_id,
            chapter.current_page,
            chapter.quantity_pages(),
            resource
        ),
        None => println!(
            "{} ch.{}: no page loaded",
            chapter.series_id, chapter.chapter_id
        ),
    }
}

fn print_chapters(chapters: &Paginator<ChapterEntry>) {
    let view = chapters.view();
    println!(
        "page {}/{} ({})",
        view.current_page_index,
        view.total_pages,
        if view.ascending { "ascending" } else { "descending" }
    );
    for entry in chapters.current_items() {
        let marker = if entry.downloaded { "*" } else { " " };
        println!("{marker} {:>4} {}", entry.chapter_id, entry.title);
    }
    println!("pages: {:?}", view.visible_page_numbers);
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut positional = Vec::new();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            let path = args
                .next()
                .ok_or_else(|| anyhow!("--config needs a path\n{USAGE}"))?;
            config_path = PathBuf::from(path);
        } else {
            positional.push(arg);
        }
    }

    let mut positional = positional.into_iter();
    let series_id = positional.next().ok_or_else(|| anyhow!(USAGE))?;
    let chapter_id = positional
        .next()
        .map(|value| value.parse::<u32>())
        .transpose()
        .with_context(|| format!("Chapter must be a number\n{USAGE}"))?;
    let page = positional
        .next()
        .map(|value| value.parse::<usize>())
        .transpose()
        .with_context(|| format!("Page must be a number\n{USAGE}"))?;
    Ok(Args {
        config_path,
        series_id,
        chapter_id,
        page,
    })
}

/// Stderr subscriber whose filter can be swapped once the config is read.
/// Starts from `RUST_LOG`, or the default level when that is unset.
fn init_tracing() -> ReloadHandle {
    let startup = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(LogLevel::default().as_filter_str()));
    let (filter_layer, handle) = reload::Layer::new(startup);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

/// Replace the startup filter with the configured level.
fn apply_logging(handle: &ReloadHandle, logging: &LoggingConfig) {
    let level = logging.log_level;
    match handle.reload(EnvFilter::new(level.as_filter_str())) {
        Ok(()) => debug!(%level, "Log level taken from config"),
        Err(err) => warn!(%level, "Could not apply configured log level: {err}"),
    }
}
