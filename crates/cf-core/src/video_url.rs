//! Video URL validation.
//!
//! URLs arrive as untrusted query parameters. [`VideoUrl::parse`] checks the
//! shape only: scheme, host allow-list, and for YouTube hosts an extractable
//! 11-character video id. Whether the video exists is the extractor's call.

use std::fmt;

use ::url::Url;

use crate::{Error, Result};

/// Hosts whose URLs must carry a recognisable video id.
const YOUTUBE_HOSTS: &[&str] = &["youtube.com", "youtu.be", "youtube-nocookie.com"];

/// Path prefixes that carry the video id as the next segment.
const ID_PATH_PREFIXES: &[&str] = &["embed", "shorts", "live", "v", "e"];

const VIDEO_ID_LEN: usize = 11;

/// A validated reference to a video on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoUrl {
    url: Url,
    video_id: Option<String>,
}

impl VideoUrl {
    /// Validate `input` against the host allow-list.
    ///
    /// An empty `allowed_hosts` accepts any http(s) host.
    pub fn parse(input: &str, allowed_hosts: &[String]) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::validation("URL is required"));
        }

        let url = Url::parse(input).map_err(|e| Error::validation(format!("Invalid URL: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::validation(format!(
                "Invalid URL: unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| Error::validation("Invalid URL: missing host"))?
            .to_ascii_lowercase();

        if !allowed_hosts.is_empty() && !allowed_hosts.iter().any(|h| host_matches(&host, h)) {
            return Err(Error::validation(format!(
                "Invalid URL: host '{host}' is not supported"
            )));
        }

        let video_id = if YOUTUBE_HOSTS.iter().any(|h| host_matches(&host, h)) {
            let id = youtube_video_id(&url, &host)
                .ok_or_else(|| Error::validation("Invalid URL: no video id found"))?;
            Some(id)
        } else {
            None
        };

        Ok(Self { url, video_id })
    }

    /// The URL as it will be handed to the extractor.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// The platform video id, when the host is one we know how to read.
    pub fn video_id(&self) -> Option<&str> {
        self.video_id.as_deref()
    }
}

impl fmt::Display for VideoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// `host` equals `allowed` or is a subdomain of it.
fn host_matches(host: &str, allowed: &str) -> bool {
    let allowed = allowed.trim().trim_start_matches('.').to_ascii_lowercase();
    if allowed.is_empty() {
        return false;
    }
    host == allowed
        || host
            .strip_suffix(allowed.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn youtube_video_id(url: &Url, host: &str) -> Option<String> {
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    if host_matches(host, "youtu.be") {
        return segments.next().filter(|id| is_video_id(id)).map(String::from);
    }

    if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
        return is_video_id(&v).then(|| v.into_owned());
    }

    let first = segments.next()?;
    if ID_PATH_PREFIXES.contains(&first) {
        return segments.next().filter(|id| is_video_id(id)).map(String::from);
    }

    None
}

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == VIDEO_ID_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
