//! On-the-fly transcoding backed by `ffmpeg`.
//!
//! ffmpeg reads the extractor's bytes on `pipe:0` and writes the result to
//! `pipe:1`. Clips are muxed as fragmented MP4 because a regular MP4 needs a
//! seekable output for its index.

use std::sync::Arc;

use async_trait::async_trait;

use cf_core::config::{ClipMode, Config, TranscodeConfig};
use cf_core::download::format_seconds;
use cf_core::{DownloadPlan, Error, OutputKind, Result};

use crate::process::{ByteStream, ProcessStream};
use crate::tools::{ToolRegistry, FFMPEG};

/// Movflags that let an MP4 be written to a pipe.
const STREAMING_MOVFLAGS: &str = "frag_keyframe+empty_moov+default_base_moof";

/// Converts a byte stream according to a [`DownloadPlan`].
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, input: ByteStream, plan: &DownloadPlan) -> Result<ByteStream>;
}

/// [`Transcoder`] implementation that pipes through `ffmpeg`.
pub struct Ffmpeg {
    tools: Arc<ToolRegistry>,
    settings: TranscodeConfig,
}

impl Ffmpeg {
    pub fn new(tools: Arc<ToolRegistry>, config: &Config) -> Self {
        Self {
            tools,
            settings: config.transcode.clone(),
        }
    }
}

#[async_trait]
impl Transcoder for Ffmpeg {
    async fn transcode(&self, input: ByteStream, plan: &DownloadPlan) -> Result<ByteStream> {
        let tool = self.tools.require(FFMPEG)?;
        let args = ffmpeg_args(plan, &self.settings)?;
        tracing::info!(
            output = ?plan.output,
            range = ?plan.range,
            "Transcoding stream"
        );
        let stream = ProcessStream::spawn(&tool.path, &args, Some(input))?;
        Ok(stream.boxed())
    }
}

/// Build the ffmpeg argument list for a plan.
///
/// Fails for passthrough plans, which never reach the transcoder.
pub fn ffmpeg_args(plan: &DownloadPlan, settings: &TranscodeConfig) -> Result<Vec<String>> {
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-i", "pipe:0"]
        .into_iter()
        .map(String::from)
        .collect();

    if let Some(range) = plan.range {
        args.push("-ss".into());
        args.push(format_seconds(range.start()));
        args.push("-t".into());
        args.push(format_seconds(range.duration()));
    }

    match &plan.output {
        OutputKind::Audio => {
            args.extend(["-vn", "-c:a", "libmp3lame", "-b:a"].map(String::from));
            args.push(settings.audio_bitrate.clone());
            args.extend(["-f", "mp3"].map(String::from));
        }
        OutputKind::Clip => {
            match settings.clip_mode {
                ClipMode::Reencode => {
                    args.extend(["-c:v", "libx264", "-preset"].map(String::from));
                    args.push(settings.video_preset.clone());
                    args.extend(["-c:a", "aac"].map(String::from));
                }
                ClipMode::Copy => {
                    args.extend(["-c", "copy"].map(String::from));
                }
            }
            args.extend(["-movflags", STREAMING_MOVFLAGS, "-f", "mp4"].map(String::from));
        }
        OutputKind::Passthrough { .. } => {
            return Err(Error::Internal(
                "passthrough downloads do not need transcoding".into(),
            ));
        }
    }

    args.push("pipe:1".into());
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cf_core::{FormatSelector, TimeRange};

    fn plan(output: OutputKind, range: Option<(f64, f64)>) -> DownloadPlan {
        DownloadPlan {
            selector: FormatSelector::Best,
            output,
            range: range.map(|(s, e)| TimeRange::new(s, e).unwrap()),
            filename: "clip.mp4".into(),
        }
    }

    fn joined(args: &[String]) -> String {
        args.join(" ")
    }

    #[test]
    fn audio_args() {
        let args = ffmpeg_args(&plan(OutputKind::Audio, None), &TranscodeConfig::default()).unwrap();
        assert_eq!(
            joined(&args),
            "-hide_banner -loglevel error -i pipe:0 -vn -c:a libmp3lame -b:a 192k -f mp3 pipe:1"
        );
    }

    #[test]
    fn audio_with_range_is_trimmed() {
        let args = ffmpeg_args(
            &plan(OutputKind::Audio, Some((30.0, 45.5))),
            &TranscodeConfig::default(),
        )
        .unwrap();
        assert!(joined(&args).contains("-ss 30 -t 15.5 -vn"));
    }

    #[test]
    fn clip_reencode_args() {
        let args = ffmpeg_args(
            &plan(OutputKind::Clip, Some((10.0, 20.0))),
            &TranscodeConfig::default(),
        )
        .unwrap();
        assert_eq!(
            joined(&args),
            "-hide_banner -loglevel error -i pipe:0 -ss 10 -t 10 \
             -c:v libx264 -preset veryfast -c:a aac \
             -movflags frag_keyframe+empty_moov+default_base_moof -f mp4 pipe:1"
        );
    }

    #[test]
    fn clip_copy_mode() {
        let settings = TranscodeConfig {
            clip_mode: ClipMode::Copy,
            ..TranscodeConfig::default()
        };
        let args = ffmpeg_args(&plan(OutputKind::Clip, Some((1.25, 2.0))), &settings).unwrap();
        let joined = joined(&args);
        assert!(joined.contains("-ss 1.25 -t 0.75 -c copy -movflags"));
        assert!(!joined.contains("libx264"));
    }

    #[test]
    fn passthrough_is_rejected() {
        let output = OutputKind::Passthrough {
            content_type: "video/mp4".into(),
            ext: "mp4".into(),
        };
        let err = ffmpeg_args(&plan(output, None), &TranscodeConfig::default()).unwrap_err();
        assert_eq!(err.http_status(), 500);
    }

    #[tokio::test]
    async fn missing_ffmpeg_is_tool_error() {
        let ffmpeg = Ffmpeg::new(Arc::new(ToolRegistry::default()), &Config::default());
        let input: ByteStream = Box::pin(futures::stream::empty());
        let err = ffmpeg
            .transcode(input, &plan(OutputKind::Audio, None))
            .await
            .err()
            .unwrap();
        assert_eq!(err.code(), "tool_error");
    }

    #[cfg(unix)]
    fn write_script(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn extractor_output_flows_through_transcoder() {
        use crate::tools::YTDLP;
        use crate::ytdlp::{Extractor, YtDlp};
        use cf_core::VideoUrl;
        use futures::TryStreamExt;

        let dir = tempfile::tempdir().unwrap();
        // `--format <selector>` comes first; echo the selector as the payload.
        let ytdlp = write_script(dir.path(), "yt-dlp", r#"printf 'media:%s' "$2""#);
        // Ignores the ffmpeg argv and copies stdin to stdout.
        let ffmpeg = write_script(dir.path(), "ffmpeg", "exec cat");

        let tools = Arc::new(ToolRegistry::with_paths([(YTDLP, ytdlp), (FFMPEG, ffmpeg)]));
        let config = Config::default();
        let extractor = YtDlp::new(tools.clone(), &config);
        let transcoder = Ffmpeg::new(tools, &config);

        let url = VideoUrl::parse("https://youtu.be/dQw4w9WgXcQ", &[]).unwrap();
        let source = extractor
            .open_stream(&url, &FormatSelector::BestAudio)
            .await
            .unwrap();
        let output = transcoder
            .transcode(source, &plan(OutputKind::Audio, Some((0.0, 5.0))))
            .await
            .unwrap();

        let chunks: Vec<bytes::Bytes> = output.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"media:bestaudio");
    }
}
