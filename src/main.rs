use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use feedwatch::{ChangeDetector, Config, FeedPoller, HttpFeedSource};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let config = match Config::load_with_env(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {}", config_path, e);
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = feedwatch::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        feedwatch::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    if config.feeds.is_empty() {
        warn!("No feeds configured in {}; nothing to watch", config_path);
        return;
    }

    let source = match HttpFeedSource::new(&config.fetch) {
        Ok(source) => Arc::new(source),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let mut handles = Vec::with_capacity(config.feeds.len());
    for feed in &config.feeds {
        let detector = match &feed.name {
            Some(name) => ChangeDetector::with_name(name.clone(), feed.url.clone(), source.clone()),
            None => ChangeDetector::new(feed.url.clone(), source.clone()),
        };

        let name = detector.name().to_string();
        detector.on_new_items(move |entries| {
            for entry in entries {
                info!(
                    feed = %name,
                    "{} | {}",
                    entry.title.as_deref().unwrap_or("(untitled)"),
                    entry.guid.as_deref().unwrap_or("(no guid)")
                );
            }
        });
        let name = detector.name().to_string();
        detector.on_error(move |e| warn!(feed = %name, "poll failed: {}", e));

        let interval = Duration::from_secs(feed.interval_secs(&config.poller));
        match FeedPoller::with_interval(detector, interval) {
            Ok(poller) => handles.push(poller.start()),
            Err(e) => error!(url = %feed.url, "{}", e),
        }
    }

    info!("Watching {} feed(s)", handles.len());

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    for handle in handles {
        let url = handle.url().to_string();
        if let Err(e) = handle.stop().await {
            error!(%url, "{}", e);
        }
    }
}
