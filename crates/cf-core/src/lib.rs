//! cf-core: shared types, errors, configuration, and request model.
//!
//! This crate is the foundational dependency for the other cf-* crates. It
//! knows nothing about processes or HTTP; it validates what a client sends,
//! describes what the extractor reports, and turns the two into a
//! [`DownloadPlan`].

pub mod config;
pub mod download;
pub mod error;
pub mod media;
pub mod video_url;

// Re-export the most commonly used items at the crate root.
pub use download::{DownloadPlan, DownloadRequest, FormatSelector, OutputKind, TimeRange};
pub use error::{Error, Result};
pub use media::{FormatDescriptor, VideoInfo};
pub use video_url::VideoUrl;
