//! Streaming downloads.
//!
//! The extractor's stream is piped through the transcoder when the plan asks
//! for mp3 or a trimmed clip, and the bytes go straight into the response
//! body. Nothing touches the disk.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use futures::stream::{self, StreamExt};
use serde::Deserialize;

use cf_av::tools::FFMPEG;
use cf_av::ByteStream;
use cf_core::{DownloadPlan, DownloadRequest, Error};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// Query parameters for `/api/download`.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct DownloadParams {
    /// Video page URL.
    pub url: Option<String>,
    /// Format id from `/api/info`; the best muxed format when absent.
    pub itag: Option<String>,
    /// Clip start in seconds.
    pub start_time: Option<String>,
    /// Clip end in seconds.
    pub end_time: Option<String>,
    /// `true` converts the best audio stream to mp3.
    pub audio_only: Option<String>,
}

/// GET /api/download
#[utoipa::path(
    get,
    path = "/api/download",
    params(DownloadParams),
    responses(
        (status = 200, description = "Media stream as an attachment", content_type = "application/octet-stream"),
        (status = 400, description = "Missing URL, unknown format or bad time range"),
        (status = 500, description = "Extraction or transcoding failed"),
        (status = 503, description = "Too many downloads in progress")
    )
)]
pub async fn download(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, AppError> {
    stream_download(&ctx, &params)
        .await
        .map_err(|e| AppError::new(e).with_request_id(request_id.0))
}

async fn stream_download(ctx: &AppContext, params: &DownloadParams) -> cf_core::Result<Response> {
    let request = DownloadRequest::from_params(
        params.url.as_deref(),
        params.itag.as_deref(),
        params.start_time.as_deref(),
        params.end_time.as_deref(),
        params.audio_only.as_deref(),
        &ctx.config.extractor.allowed_hosts,
    )?;

    // Held until the response body is dropped.
    let permit = match &ctx.download_slots {
        Some(slots) => Some(slots.clone().try_acquire_owned().map_err(|_| {
            Error::Unavailable("Too many downloads in progress, try again shortly".into())
        })?),
        None => None,
    };

    let info = ctx.extractor.fetch_info(&request.url).await?;
    let plan = DownloadPlan::resolve(&request, &info)?;

    tracing::info!(
        url = %request.url,
        format = %plan.selector,
        output = ?plan.output,
        range = ?plan.range,
        filename = %plan.filename,
        "Starting download"
    );

    let mut stream = ctx.extractor.open_stream(&request.url, &plan.selector).await?;
    if plan.output.needs_transcode() {
        stream = ctx.transcoder.transcode(stream, &plan).await?;
    }

    let stream = prime(stream, plan.output.needs_transcode()).await?;
    let body = stream.map(move |chunk| {
        let _slot = &permit;
        if let Err(e) = &chunk {
            tracing::warn!("Download aborted mid-stream: {e}");
        }
        chunk
    });

    let headers = [
        (header::CONTENT_TYPE, plan.output.content_type().to_string()),
        (header::CONTENT_DISPOSITION, plan.content_disposition()),
        (header::CACHE_CONTROL, "no-store".to_string()),
    ];
    Ok((headers, Body::from_stream(body)).into_response())
}

/// Wait for the first chunk so a process that dies before producing output
/// becomes an error response instead of an empty 200.
///
/// A transcoded stream is read from ffmpeg, so its failures are tool errors.
async fn prime(mut stream: ByteStream, transcoded: bool) -> cf_core::Result<ByteStream> {
    let fail = |message: String| {
        if transcoded {
            Error::tool(FFMPEG, message)
        } else {
            Error::extraction(message)
        }
    };

    match stream.next().await {
        Some(Ok(first)) => Ok(stream::once(async move { Ok(first) }).chain(stream).boxed()),
        Some(Err(e)) => Err(fail(e.to_string())),
        None => Err(fail("the media stream ended before any data arrived".into())),
    }
}
