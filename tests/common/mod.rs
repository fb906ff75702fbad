//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which builds a full [`AppContext`] around an
//! in-process [`FakeExtractor`] and [`FakeTranscoder`], so the HTTP layer can
//! be exercised without yt-dlp or ffmpeg installed. [`TestHarness::serve`]
//! starts Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use futures::stream::{self, StreamExt};

use cf_av::{ByteStream, Extractor, ToolRegistry, Transcoder};
use cf_core::config::Config;
use cf_core::{DownloadPlan, Error, FormatDescriptor, FormatSelector, Result, VideoInfo, VideoUrl};
use cf_server::context::AppContext;
use cf_server::router::build_router;

pub const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

/// Bytes every fake media stream carries.
pub const MEDIA_BYTES: &[u8] = b"fake media payload";

/// Prefix the fake transcoder puts in front of its input.
pub const TRANSCODED_PREFIX: &[u8] = b"transcoded:";

fn format(itag: &str, ext: &str, quality: &str, has_video: bool, has_audio: bool) -> FormatDescriptor {
    let kind = if has_video { "video" } else { "audio" };
    FormatDescriptor {
        itag: itag.into(),
        quality: Some(quality.into()),
        mime_type: format!("{kind}/{ext}"),
        content_length: Some(1_000_000),
        ext: ext.into(),
        has_video,
        has_audio,
    }
}

/// Metadata with two muxed formats, one video-only and one audio-only.
pub fn sample_info() -> VideoInfo {
    VideoInfo {
        title: "Never Gonna Give You Up".into(),
        duration: Some(213),
        formats: vec![
            format("18", "mp4", "360p", true, true),
            format("137", "mp4", "1080p", true, false),
            format("140", "m4a", "medium", false, true),
            format("22", "mp4", "720p", true, true),
        ],
    }
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// What the fake extractor does when asked for a stream.
#[derive(Debug, Clone)]
pub enum StreamBehavior {
    /// Emit [`MEDIA_BYTES`].
    Bytes,
    /// End without producing anything.
    Empty,
    /// Fail before the first chunk.
    Fail(String),
}

pub struct FakeExtractor {
    info: std::result::Result<VideoInfo, String>,
    stream: StreamBehavior,
    pub opened: Mutex<Vec<FormatSelector>>,
}

impl FakeExtractor {
    pub fn new(info: VideoInfo) -> Self {
        Self {
            info: Ok(info),
            stream: StreamBehavior::Bytes,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Every metadata lookup fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            info: Err(message.to_string()),
            stream: StreamBehavior::Bytes,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn with_stream(mut self, stream: StreamBehavior) -> Self {
        self.stream = stream;
        self
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn fetch_info(&self, _url: &VideoUrl) -> Result<VideoInfo> {
        self.info.clone().map_err(Error::extraction)
    }

    async fn open_stream(&self, _url: &VideoUrl, selector: &FormatSelector) -> Result<ByteStream> {
        self.opened.lock().unwrap().push(selector.clone());
        let items: Vec<std::io::Result<Bytes>> = match &self.stream {
            StreamBehavior::Bytes => vec![
                Ok(Bytes::from_static(&MEDIA_BYTES[..5])),
                Ok(Bytes::from_static(&MEDIA_BYTES[5..])),
            ],
            StreamBehavior::Empty => vec![],
            StreamBehavior::Fail(message) => vec![Err(std::io::Error::other(message.clone()))],
        };
        Ok(stream::iter(items).boxed())
    }
}

#[derive(Default)]
pub struct FakeTranscoder {
    pub plans: Mutex<Vec<DownloadPlan>>,
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(&self, input: ByteStream, plan: &DownloadPlan) -> Result<ByteStream> {
        self.plans.lock().unwrap().push(plan.clone());
        let prefix = stream::once(async { Ok(Bytes::from_static(TRANSCODED_PREFIX)) });
        Ok(prefix.chain(input).boxed())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Test harness wrapping a fully-constructed [`AppContext`] with fake
/// backends.
pub struct TestHarness {
    pub ctx: AppContext,
    pub extractor: Arc<FakeExtractor>,
    pub transcoder: Arc<FakeTranscoder>,
}

impl TestHarness {
    /// Default configuration, extractor returning [`sample_info`].
    pub fn new() -> Self {
        Self::with_extractor(Config::default(), FakeExtractor::new(sample_info()))
    }

    /// Custom configuration, extractor returning [`sample_info`].
    pub fn with_config(config: Config) -> Self {
        Self::with_extractor(config, FakeExtractor::new(sample_info()))
    }

    pub fn with_extractor(config: Config, extractor: FakeExtractor) -> Self {
        let extractor = Arc::new(extractor);
        let transcoder = Arc::new(FakeTranscoder::default());
        let ctx = AppContext::with_backends(
            config,
            Arc::new(ToolRegistry::default()),
            extractor.clone(),
            transcoder.clone(),
        );
        Self {
            ctx,
            extractor,
            transcoder,
        }
    }

    /// Router for `tower::ServiceExt::oneshot` tests.
    pub fn router(&self) -> Router {
        build_router(self.ctx.clone(), None)
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn serve(self) -> (Self, SocketAddr) {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (self, addr)
    }

    /// Start a server with the default harness.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::new().serve().await
    }

    pub fn transcoded_plans(&self) -> Vec<DownloadPlan> {
        self.transcoder.plans.lock().unwrap().clone()
    }

    pub fn opened_selectors(&self) -> Vec<FormatSelector> {
        self.extractor.opened.lock().unwrap().clone()
    }
}

/// Percent-encode a URL for use as a query value.
pub fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
