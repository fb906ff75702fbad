//! # cf-av
//!
//! External media tools for clipforge.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to yt-dlp
//!   and ffmpeg.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout
//!   support for one-shot invocations.
//! - **Process streams** ([`ProcessStream`]) -- a child's stdout as a byte
//!   stream, with optional stdin feeding and kill-on-drop.
//! - **Extraction** ([`Extractor`], [`YtDlp`]) -- metadata and media via
//!   yt-dlp.
//! - **Transcoding** ([`Transcoder`], [`Ffmpeg`]) -- mp3 conversion and clip
//!   trimming via ffmpeg.

pub mod command;
pub mod ffmpeg;
pub mod process;
pub mod tools;
pub mod ytdlp;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use ffmpeg::{ffmpeg_args, Ffmpeg, Transcoder};
pub use process::{ByteStream, ProcessStream};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use ytdlp::{Extractor, YtDlp};
