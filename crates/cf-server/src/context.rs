//! Application context shared by every handler.
//!
//! [`AppContext`] is cloned into each request via Axum state. Everything in it
//! is immutable after startup, so it is a bundle of `Arc`s and nothing more.

use std::sync::Arc;

use tokio::sync::Semaphore;

use cf_av::{Extractor, Ffmpeg, ToolRegistry, Transcoder, YtDlp};
use cf_core::config::Config;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub tools: Arc<ToolRegistry>,
    pub extractor: Arc<dyn Extractor>,
    pub transcoder: Arc<dyn Transcoder>,
    /// Permits for concurrently streaming downloads, when limited.
    pub download_slots: Option<Arc<Semaphore>>,
}

impl AppContext {
    /// Build a context wired to the real yt-dlp and ffmpeg backends.
    pub fn new(config: Config, tools: Arc<ToolRegistry>) -> Self {
        let extractor: Arc<dyn Extractor> = Arc::new(YtDlp::new(tools.clone(), &config));
        let transcoder: Arc<dyn Transcoder> = Arc::new(Ffmpeg::new(tools.clone(), &config));
        Self::with_backends(config, tools, extractor, transcoder)
    }

    /// Build a context around explicit backends.
    pub fn with_backends(
        config: Config,
        tools: Arc<ToolRegistry>,
        extractor: Arc<dyn Extractor>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let download_slots = config
            .server
            .max_concurrent_downloads
            .map(|n| Arc::new(Semaphore::new(n)));
        Self {
            config: Arc::new(config),
            tools,
            extractor,
            transcoder,
            download_slots,
        }
    }
}
