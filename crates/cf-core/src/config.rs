//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from TOML and carries the
//! server, tool, extractor, and transcode sections. Every section defaults
//! sensibly so an empty file is valid. Environment variables are applied on
//! top of the file by [`Config::apply_env`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::Error;

/// Locations searched when no explicit config path is given.
const DEFAULT_PATHS: &[&str] = &[
    "./clipforge.toml",
    "~/.config/clipforge/config.toml",
    "/etc/clipforge/config.toml",
];

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub tools: ToolsConfig,
    pub extractor: ExtractorConfig,
    pub transcode: TranscodeConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration from `path`, or from the first default location
    /// that exists, or fall back to defaults.
    ///
    /// An explicit path that cannot be read or parsed is an error; the
    /// default locations are only probed for existence.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        for candidate in DEFAULT_PATHS {
            let expanded = shellexpand::tilde(candidate);
            let candidate = Path::new(expanded.as_ref());
            if candidate.exists() {
                tracing::info!("Loading config from {}", candidate.display());
                return Self::load(candidate);
            }
        }

        tracing::info!("No config file found; using defaults");
        Ok(Self::default())
    }

    /// Apply environment overrides from the process environment, falling
    /// back to a `.env` file in the working directory for unset keys.
    pub fn apply_process_env(&mut self) {
        let file = read_env_file(Path::new(".env"));
        self.apply_env(|key| std::env::var(key).ok().or_else(|| file.get(key).cloned()));
    }

    /// Apply environment overrides using the given lookup.
    ///
    /// Recognised keys: `HOST`, `PORT`, `CORS_ORIGINS` (comma separated),
    /// `STATIC_DIR`, `YTDLP_PATH`, `FFMPEG_PATH`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("PORT") {
            match port.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PORT value {port:?}"),
            }
        }
        if let Some(origins) = get("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(dir) = get("STATIC_DIR") {
            self.server.static_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = get("YTDLP_PATH") {
            self.tools.ytdlp_path = Some(PathBuf::from(path));
        }
        if let Some(path) = get("FFMPEG_PATH") {
            self.tools.ffmpeg_path = Some(PathBuf::from(path));
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.server.max_concurrent_downloads == Some(0) {
            warnings.push("server.max_concurrent_downloads is 0; every download will be refused".into());
        }

        for origin in &self.server.cors_origins {
            if origin != "*" && ::url::Url::parse(origin).is_err() {
                warnings.push(format!("server.cors_origins entry '{origin}' is not a valid origin"));
            }
        }

        if self.tools.info_timeout_secs == 0 {
            warnings.push("tools.info_timeout_secs is 0; metadata lookups will time out immediately".into());
        }

        if self.transcode.audio_bitrate.trim().is_empty() {
            warnings.push("transcode.audio_bitrate is empty".into());
        }

        warnings
    }
}

/// Read `KEY=value` pairs from a dotenv file. A missing file yields nothing.
pub fn read_env_file(path: &Path) -> HashMap<String, String> {
    let entries = match dotenvy::from_path_iter(path) {
        Ok(entries) => entries,
        Err(e) if e.not_found() => return HashMap::new(),
        Err(e) => {
            tracing::warn!("Ignoring {}: {e}", path.display());
            return HashMap::new();
        }
    };

    entries
        .filter_map(|entry| match entry {
            Ok(pair) => Some(pair),
            Err(e) => {
                tracing::warn!("Skipping line in {}: {e}", path.display());
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding the single-page UI bundle.
    pub static_dir: Option<PathBuf>,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
    /// Upper bound on simultaneously streaming downloads. `None` = unbounded.
    pub max_concurrent_downloads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3001,
            static_dir: Some(PathBuf::from("web")),
            cors_origins: vec!["http://localhost:3000".into()],
            max_concurrent_downloads: None,
        }
    }
}

/// Paths and limits for external CLI tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ytdlp_path: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    /// Maximum time a metadata lookup may take.
    pub info_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            ffmpeg_path: None,
            info_timeout_secs: 60,
        }
    }
}

/// Extractor (yt-dlp) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Hosts accepted by URL validation; subdomains match too. Empty accepts
    /// any http(s) host.
    pub allowed_hosts: Vec<String>,
    /// Extra arguments passed to every yt-dlp invocation (e.g. cookies).
    pub extra_args: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: vec![
                "youtube.com".into(),
                "youtu.be".into(),
                "youtube-nocookie.com".into(),
            ],
            extra_args: Vec::new(),
        }
    }
}

/// How trimmed video clips are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipMode {
    /// Re-encode to H.264/AAC; frame-accurate cuts.
    #[default]
    Reencode,
    /// Stream copy; cuts snap to keyframes.
    Copy,
}

/// Transcoder (ffmpeg) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    pub audio_bitrate: String,
    pub clip_mode: ClipMode,
    pub video_preset: String,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            audio_bitrate: "192k".into(),
            clip_mode: ClipMode::default(),
            video_preset: "veryfast".into(),
        }
    }
}
