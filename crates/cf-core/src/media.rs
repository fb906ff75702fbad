//! Metadata reported by the extractor.
//!
//! These are plain values; the service neither stores nor re-derives them
//! beyond picking a container type for the response.

use serde::{Deserialize, Serialize};

/// One rendition of a video as reported by the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// The extractor's opaque format id (YouTube's itag).
    pub itag: String,
    /// Human-readable quality label such as `720p`.
    pub quality: Option<String>,
    /// Media type with codec parameters, e.g. `video/mp4; codecs="avc1.4d401f, mp4a.40.2"`.
    pub mime_type: String,
    /// Size in bytes, when the extractor knows it.
    pub content_length: Option<u64>,
    /// Container extension (`mp4`, `webm`, `m4a`).
    pub ext: String,
    pub has_video: bool,
    pub has_audio: bool,
}

impl FormatDescriptor {
    /// Whether this format carries both audio and video.
    pub fn is_muxed(&self) -> bool {
        self.has_video && self.has_audio
    }

    /// The media type without codec parameters.
    pub fn essence(&self) -> &str {
        self.mime_type
            .split(';')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("application/octet-stream")
    }
}

/// Video metadata as reported by the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    /// Length in whole seconds, when known (live streams have none).
    pub duration: Option<u64>,
    pub formats: Vec<FormatDescriptor>,
}

impl VideoInfo {
    /// Formats containing both audio and video, in extractor order.
    pub fn muxed_formats(&self) -> impl Iterator<Item = &FormatDescriptor> {
        self.formats.iter().filter(|f| f.is_muxed())
    }

    /// Look up a format by its id.
    pub fn format(&self, itag: &str) -> Option<&FormatDescriptor> {
        self.formats.iter().find(|f| f.itag == itag)
    }
}

/// Build a `type/subtype; codecs="..."` string from extractor fields.
///
/// `vcodec`/`acodec` of `None` or `"none"` mean the stream is absent.
pub fn mime_type_for(ext: &str, vcodec: Option<&str>, acodec: Option<&str>) -> String {
    let vcodec = present(vcodec);
    let acodec = present(acodec);

    let kind = if vcodec.is_some() || acodec.is_none() {
        "video"
    } else {
        "audio"
    };
    let subtype = match (kind, ext) {
        ("audio", "m4a") => "mp4",
        ("audio", "mp3") => "mpeg",
        ("video", "3gp") => "3gpp",
        (_, "") => "octet-stream",
        (_, ext) => ext,
    };

    let codecs: Vec<&str> = [vcodec, acodec].into_iter().flatten().collect();
    if codecs.is_empty() {
        format!("{kind}/{subtype}")
    } else {
        format!("{kind}/{subtype}; codecs=\"{}\"", codecs.join(", "))
    }
}

fn present(codec: Option<&str>) -> Option<&str> {
    codec.filter(|c| !c.is_empty() && *c != "none")
}
