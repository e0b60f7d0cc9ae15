pub mod api;
pub mod db;
pub mod error;
pub mod extractor;
pub mod matcher;
pub mod media;
pub mod models;
pub mod utils;
pub mod workflow;

use std::path::PathBuf;
use std::sync::Arc;

use crate::db::gallery::GalleryStore;
use crate::extractor::FaceExtractor;
use crate::media::MediaStore;
use crate::utils::config::Config;

#[derive(Clone)]
pub struct AppPaths {
    pub data: PathBuf,
    pub db_path: PathBuf,
    pub uploads: PathBuf,
    pub models: PathBuf,
}

/// Shared request state: configuration plus the injected collaborators.
///
/// Every handle is constructed once in `main` and passed in here; nothing in
/// the request path reaches for ambient globals.
#[derive(Clone)]
pub struct AppState {
    pub started_at: std::time::Instant,
    pub cfg: Config,
    pub paths: AppPaths,
    pub gallery: GalleryStore,
    pub media: Arc<dyn MediaStore>,
    pub extractor: Arc<dyn FaceExtractor>,
}

impl AppState {
    pub fn new(
        cfg: Config,
        paths: AppPaths,
        gallery: GalleryStore,
        media: Arc<dyn MediaStore>,
        extractor: Arc<dyn FaceExtractor>,
    ) -> Self {
        Self {
            started_at: std::time::Instant::now(),
            cfg,
            paths,
            gallery,
            media,
            extractor,
        }
    }
}
