//! Download requests and how they resolve against extractor metadata.
//!
//! A [`DownloadRequest`] is parsed from raw query values. Once the extractor
//! has reported a [`VideoInfo`], [`DownloadPlan::resolve`] decides which
//! format to pull, whether ffmpeg sits in the middle, and what the response
//! is called.

use std::fmt;

use crate::media::{FormatDescriptor, VideoInfo};
use crate::video_url::VideoUrl;
use crate::{Error, Result};

/// Longest file stem we put in a `Content-Disposition` header.
const MAX_FILENAME_CHARS: usize = 120;

/// Fallback stem when the title sanitises to nothing.
const FALLBACK_STEM: &str = "video";

// ---------------------------------------------------------------------------
// TimeRange
// ---------------------------------------------------------------------------

/// A `[start, end)` window in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    start: f64,
    end: f64,
}

impl TimeRange {
    /// Build a range; both bounds must be finite, non-negative, and ordered.
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(Error::validation("Time range must be finite"));
        }
        if start < 0.0 || end < 0.0 {
            return Err(Error::validation("Time range cannot be negative"));
        }
        if end <= start {
            return Err(Error::validation("endTime must be greater than startTime"));
        }
        Ok(Self { start, end })
    }

    /// Parse the raw `startTime`/`endTime` pair.
    ///
    /// A range only exists when both values are present and non-empty; a
    /// lone bound is ignored.
    pub fn from_params(start: Option<&str>, end: Option<&str>) -> Result<Option<Self>> {
        let start = start.map(str::trim).filter(|s| !s.is_empty());
        let end = end.map(str::trim).filter(|s| !s.is_empty());
        let (Some(start), Some(end)) = (start, end) else {
            return Ok(None);
        };

        let start = parse_seconds("startTime", start)?;
        let end = parse_seconds("endTime", end)?;
        Self::new(start, end).map(Some)
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

fn parse_seconds(name: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|_| Error::validation(format!("{name} must be a number of seconds")))
}

/// Render seconds the way ffmpeg's `-ss`/`-t` accept them.
pub fn format_seconds(secs: f64) -> String {
    let rendered = format!("{secs:.3}");
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

// ---------------------------------------------------------------------------
// DownloadRequest
// ---------------------------------------------------------------------------

/// A validated download request.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub url: VideoUrl,
    pub itag: Option<String>,
    pub range: Option<TimeRange>,
    pub audio_only: bool,
}

impl DownloadRequest {
    /// Validate raw query values.
    pub fn from_params(
        url: Option<&str>,
        itag: Option<&str>,
        start_time: Option<&str>,
        end_time: Option<&str>,
        audio_only: Option<&str>,
        allowed_hosts: &[String],
    ) -> Result<Self> {
        let url = url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| Error::validation("URL is required"))?;
        let url = VideoUrl::parse(url, allowed_hosts)?;

        let itag = itag
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        Ok(Self {
            url,
            itag,
            range: TimeRange::from_params(start_time, end_time)?,
            audio_only: audio_only.is_some_and(parse_flag),
        })
    }
}

/// Query-string truthiness: `true`, `1`, `yes`, `on`.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

// ---------------------------------------------------------------------------
// DownloadPlan
// ---------------------------------------------------------------------------

/// Which stream the extractor should produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatSelector {
    /// A specific format id reported by the extractor.
    Id(String),
    /// Best single file containing audio and video.
    Best,
    /// Best audio-only stream.
    BestAudio,
}

impl FormatSelector {
    /// The selector expression yt-dlp understands.
    pub fn as_arg(&self) -> &str {
        match self {
            FormatSelector::Id(id) => id,
            FormatSelector::Best => "best",
            FormatSelector::BestAudio => "bestaudio",
        }
    }
}

impl fmt::Display for FormatSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// What reaches the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputKind {
    /// Extractor bytes untouched.
    Passthrough { content_type: String, ext: String },
    /// Time-trimmed fragmented MP4 from ffmpeg.
    Clip,
    /// MP3 from ffmpeg.
    Audio,
}

impl OutputKind {
    pub fn content_type(&self) -> &str {
        match self {
            OutputKind::Passthrough { content_type, .. } => content_type,
            OutputKind::Clip => "video/mp4",
            OutputKind::Audio => "audio/mpeg",
        }
    }

    pub fn extension(&self) -> &str {
        match self {
            OutputKind::Passthrough { ext, .. } => ext,
            OutputKind::Clip => "mp4",
            OutputKind::Audio => "mp3",
        }
    }

    /// Whether the stream must go through the transcoder.
    pub fn needs_transcode(&self) -> bool {
        !matches!(self, OutputKind::Passthrough { .. })
    }
}

/// A download request resolved against extractor metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadPlan {
    pub selector: FormatSelector,
    pub output: OutputKind,
    pub range: Option<TimeRange>,
    /// Attachment file name including extension.
    pub filename: String,
}

impl DownloadPlan {
    /// Decide what to fetch and how to shape it.
    ///
    /// - audio-only wins over everything: best audio, converted to MP3, the
    ///   time range still applies
    /// - a requested itag must be one the extractor reported
    /// - without an itag the highest muxed format is chosen
    /// - a time range turns the result into a trimmed MP4 clip
    pub fn resolve(request: &DownloadRequest, info: &VideoInfo) -> Result<Self> {
        if request.audio_only {
            return Ok(Self::new(
                FormatSelector::BestAudio,
                OutputKind::Audio,
                request.range,
                &info.title,
            ));
        }

        let format = match request.itag.as_deref() {
            Some(itag) => Some(info.format(itag).ok_or_else(|| {
                Error::validation(format!("Format {itag} is not available for this video"))
            })?),
            None => info.muxed_formats().last(),
        };

        let selector = format
            .map(|f| FormatSelector::Id(f.itag.clone()))
            .unwrap_or(FormatSelector::Best);

        let output = match request.range {
            Some(_) => OutputKind::Clip,
            None => passthrough_for(format),
        };

        Ok(Self::new(selector, output, request.range, &info.title))
    }

    fn new(
        selector: FormatSelector,
        output: OutputKind,
        range: Option<TimeRange>,
        title: &str,
    ) -> Self {
        let filename = format!("{}.{}", sanitize_stem(title), output.extension());
        Self {
            selector,
            output,
            range,
            filename,
        }
    }

    /// `Content-Disposition` value with an ASCII fallback and an RFC 5987
    /// `filename*` carrying the full UTF-8 name.
    pub fn content_disposition(&self) -> String {
        let ascii: String = self
            .filename
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '(' | ')') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!(
            "attachment; filename=\"{ascii}\"; filename*=UTF-8''{}",
            urlencoding::encode(&self.filename)
        )
    }
}

fn passthrough_for(format: Option<&FormatDescriptor>) -> OutputKind {
    match format {
        Some(f) => OutputKind::Passthrough {
            content_type: f.essence().to_string(),
            ext: if f.ext.is_empty() { "bin".into() } else { f.ext.clone() },
        },
        None => OutputKind::Passthrough {
            content_type: "video/mp4".into(),
            ext: "mp4".into(),
        },
    }
}

/// Strip characters that are unsafe in file names or header values.
fn sanitize_stem(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .take(MAX_FILENAME_CHARS)
        .collect();
    let cleaned = cleaned.trim().trim_matches('.').trim();
    if cleaned.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        cleaned.to_string()
    }
}
