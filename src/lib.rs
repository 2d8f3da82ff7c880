pub mod app;
pub mod config;
pub mod console;
pub mod game;
pub mod oracle;
pub mod reading;
pub mod utils;
pub mod vision;

use std::sync::Arc;

use anyhow::Context;
use config::OracleConfig;
use console::KeyboardBackend;
use reading::GeminiReadingSource;

pub use app::OracleApp;

pub fn run() -> anyhow::Result<()> {
    let config = OracleConfig::load()?;

    // Initialize logging (reads RUST_LOG env var)
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(level) = level_override(config.debug, std::env::var_os("RUST_LOG").is_some()) {
        builder.filter_level(level);
    }
    builder.init();

    log::info!("Astrolabe starting up...");
    if config.gemini.api_key.is_none() {
        log::warn!("no Gemini API key configured; every reading will be the fallback");
    }

    let reading_source =
        GeminiReadingSource::new(&config.gemini).context("Failed to build Gemini client")?;
    let keyboard = KeyboardBackend::new();
    let app = Arc::new(OracleApp::new(
        config,
        Arc::new(reading_source),
        Arc::new(keyboard.clone()),
    ));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;

    runtime.block_on(console::run_console(app, keyboard))
}

/// Level forced on top of `RUST_LOG`: debug mode always wins, otherwise Info
/// applies only when `RUST_LOG` is unset.
fn level_override(debug: bool, rust_log_set: bool) -> Option<log::LevelFilter> {
    if debug {
        Some(log::LevelFilter::Debug)
    } else if rust_log_set {
        None
    } else {
        Some(log::LevelFilter::Info)
    }
}
