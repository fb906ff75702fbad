//! Video metadata lookup.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use cf_core::{FormatDescriptor, VideoInfo, VideoUrl};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// Query parameters for `/api/info`.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct InfoParams {
    /// Video page URL.
    pub url: Option<String>,
}

/// A downloadable rendition containing both audio and video.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormatResponse {
    pub itag: String,
    pub quality: Option<String>,
    pub mime_type: String,
    /// Size in bytes as a decimal string, when known.
    pub content_length: Option<String>,
}

impl From<&FormatDescriptor> for FormatResponse {
    fn from(f: &FormatDescriptor) -> Self {
        Self {
            itag: f.itag.clone(),
            quality: f.quality.clone(),
            mime_type: f.mime_type.clone(),
            content_length: f.content_length.map(|n| n.to_string()),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct InfoResponse {
    pub title: String,
    pub formats: Vec<FormatResponse>,
    /// Length in seconds.
    pub duration: Option<u64>,
}

impl From<&VideoInfo> for InfoResponse {
    fn from(info: &VideoInfo) -> Self {
        Self {
            title: info.title.clone(),
            formats: info.muxed_formats().map(FormatResponse::from).collect(),
            duration: info.duration,
        }
    }
}

/// GET /api/info
#[utoipa::path(
    get,
    path = "/api/info",
    params(InfoParams),
    responses(
        (status = 200, description = "Video title, duration and muxed formats", body = InfoResponse),
        (status = 400, description = "Missing or invalid URL"),
        (status = 500, description = "Extraction failed")
    )
)]
pub async fn video_info(
    State(ctx): State<AppContext>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<InfoParams>,
) -> Result<Json<InfoResponse>, AppError> {
    lookup(&ctx, params.url.as_deref())
        .await
        .map(Json)
        .map_err(|e| AppError::new(e).with_request_id(request_id.0))
}

async fn lookup(ctx: &AppContext, url: Option<&str>) -> cf_core::Result<InfoResponse> {
    let url = url.unwrap_or_default();
    let url = VideoUrl::parse(url, &ctx.config.extractor.allowed_hosts)?;

    let info = ctx.extractor.fetch_info(&url).await?;
    let response = InfoResponse::from(&info);
    tracing::info!(
        url = %url,
        title = %response.title,
        formats = response.formats.len(),
        "Video info served"
    );
    Ok(response)
}
