//! Video extraction backed by `yt-dlp`.
//!
//! Metadata comes from `yt-dlp --dump-single-json`, media from
//! `yt-dlp --format <selector> --output -` with the bytes read off stdout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use cf_core::config::Config;
use cf_core::media::mime_type_for;
use cf_core::{Error, FormatDescriptor, FormatSelector, Result, VideoInfo, VideoUrl};

use crate::command::ToolCommand;
use crate::process::{ByteStream, ProcessStream};
use crate::tools::{ToolRegistry, YTDLP};

/// Title used when the extractor reports none.
const UNTITLED: &str = "Untitled";

/// Source of video metadata and media bytes.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Fetch title, duration, and every format the platform offers.
    async fn fetch_info(&self, url: &VideoUrl) -> Result<VideoInfo>;

    /// Open a byte stream for the given format selector.
    async fn open_stream(&self, url: &VideoUrl, selector: &FormatSelector) -> Result<ByteStream>;
}

/// [`Extractor`] implementation that shells out to `yt-dlp`.
pub struct YtDlp {
    tools: Arc<ToolRegistry>,
    extra_args: Vec<String>,
    info_timeout: Duration,
}

impl YtDlp {
    pub fn new(tools: Arc<ToolRegistry>, config: &Config) -> Self {
        Self {
            tools,
            extra_args: config.extractor.extra_args.clone(),
            info_timeout: Duration::from_secs(config.tools.info_timeout_secs),
        }
    }

    /// Arguments for a metadata lookup.
    pub fn info_args(&self, url: &VideoUrl) -> Vec<String> {
        let mut args: Vec<String> = [
            "--dump-single-json",
            "--no-playlist",
            "--no-warnings",
            "--skip-download",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        args.extend(self.extra_args.iter().cloned());
        args.push("--".into());
        args.push(url.as_str().into());
        args
    }

    /// Arguments for streaming media to stdout.
    pub fn stream_args(&self, url: &VideoUrl, selector: &FormatSelector) -> Vec<String> {
        let mut args: Vec<String> = vec!["--format".into(), selector.as_arg().into()];
        args.extend(
            [
                "--output",
                "-",
                "--no-playlist",
                "--no-part",
                "--quiet",
                "--no-warnings",
                "--no-progress",
            ]
            .into_iter()
            .map(String::from),
        );
        args.extend(self.extra_args.iter().cloned());
        args.push("--".into());
        args.push(url.as_str().into());
        args
    }
}

#[async_trait]
impl Extractor for YtDlp {
    async fn fetch_info(&self, url: &VideoUrl) -> Result<VideoInfo> {
        let tool = self.tools.require(YTDLP)?;

        let mut cmd = ToolCommand::new(tool.path.clone());
        cmd.args(self.info_args(url));
        cmd.timeout(self.info_timeout);

        // Private, removed and geo-blocked videos all land here.
        let output = cmd.execute().await.map_err(|e| match e {
            Error::Tool { message, .. } => Error::extraction(message),
            other => other,
        })?;

        let info = parse_info(&output.stdout)?;
        tracing::debug!(
            url = %url,
            title = %info.title,
            formats = info.formats.len(),
            "Fetched video info"
        );
        Ok(info)
    }

    async fn open_stream(&self, url: &VideoUrl, selector: &FormatSelector) -> Result<ByteStream> {
        let tool = self.tools.require(YTDLP)?;
        tracing::info!(url = %url, format = %selector, "Opening media stream");
        let stream = ProcessStream::spawn(&tool.path, &self.stream_args(url, selector), None)?;
        Ok(stream.boxed())
    }
}

// ---------------------------------------------------------------------------
// JSON parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawInfo {
    title: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: String,
    #[serde(default)]
    ext: String,
    vcodec: Option<String>,
    acodec: Option<String>,
    format_note: Option<String>,
    height: Option<u32>,
    resolution: Option<String>,
    filesize: Option<f64>,
    filesize_approx: Option<f64>,
}

impl RawFormat {
    fn has_stream(codec: &Option<String>) -> bool {
        codec.as_deref().is_some_and(|c| !c.is_empty() && c != "none")
    }

    fn quality(&self) -> Option<String> {
        let note = self
            .format_note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        if let Some(note) = note {
            return Some(note.to_string());
        }
        if let Some(height) = self.height {
            return Some(format!("{height}p"));
        }
        self.resolution.clone().filter(|r| !r.is_empty())
    }

    fn into_descriptor(self) -> FormatDescriptor {
        let quality = self.quality();
        let content_length = self
            .filesize
            .or(self.filesize_approx)
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n.round() as u64);
        FormatDescriptor {
            mime_type: mime_type_for(&self.ext, self.vcodec.as_deref(), self.acodec.as_deref()),
            has_video: Self::has_stream(&self.vcodec),
            has_audio: Self::has_stream(&self.acodec),
            itag: self.format_id,
            quality,
            content_length,
            ext: self.ext,
        }
    }
}

/// Parse the output of `yt-dlp --dump-single-json`.
pub fn parse_info(json: &str) -> Result<VideoInfo> {
    let raw: RawInfo = serde_json::from_str(json)
        .map_err(|e| Error::extraction(format!("unexpected yt-dlp output: {e}")))?;

    let title = raw
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    Ok(VideoInfo {
        title,
        duration: raw
            .duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.round() as u64),
        formats: raw.formats.into_iter().map(RawFormat::into_descriptor).collect(),
    })
}
