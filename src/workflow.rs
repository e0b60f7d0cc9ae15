use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::FaceError;
use crate::extractor::FaceExtractor;
use crate::matcher;
use crate::media::MediaStore;
use crate::AppState;

#[derive(Debug)]
pub struct EnrollOutcome {
    pub name: String,
    pub image_url: String,
}

#[derive(Debug)]
pub struct VerifyOutcome {
    pub name: String,
    pub distance: f32,
}

#[derive(Debug)]
pub struct CompareOutcome {
    pub distance: f32,
    pub same_person: bool,
}

/// Enroll one identity: extract first, persist after.
///
/// Extraction runs before any write, so a photo without a usable face leaves
/// both stores untouched. If the gallery write fails after the image landed
/// in the media store, the image is removed again best-effort.
pub async fn enroll(state: &AppState, name: &str, image: Vec<u8>) -> Result<EnrollOutcome, FaceError> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(FaceError::Validation("nombre must not be empty".into()));
    }

    let embedding = extract_embedding(state, image.clone()).await?;

    let key = format!("{}.jpg", name);
    let image_url = media_put(state, key.clone(), image).await?;

    let gallery = state.gallery.clone();
    let upsert_name = name.clone();
    let result = tokio::task::spawn_blocking(move || gallery.upsert(&upsert_name, &embedding))
        .await
        .map_err(|e| FaceError::Storage(format!("gallery task failed: {}", e)))?;

    if let Err(e) = result {
        if let Err(cleanup) = media_delete(state.media.clone(), &key).await {
            warn!("failed to clean up image for {} after gallery error: {}", name, cleanup);
        }
        return Err(e);
    }

    info!("usuario {} registrado", name);
    Ok(EnrollOutcome { name, image_url })
}

/// Match an incoming photo against the enrolled gallery.
///
/// `Ok(None)` means the photo produced a valid probe but nobody in the
/// gallery sits under the threshold; an empty gallery is never an error.
pub async fn verify(state: &AppState, image: Vec<u8>) -> Result<Option<VerifyOutcome>, FaceError> {
    let probe = extract_embedding(state, image).await?;

    let gallery = state.gallery.clone();
    let records = tokio::task::spawn_blocking(move || gallery.list())
        .await
        .map_err(|e| FaceError::Storage(format!("gallery task failed: {}", e)))??;

    let hit = matcher::match_probe(&probe, &records, state.cfg.match_threshold);
    Ok(hit.map(|h| VerifyOutcome {
        name: h.record.name.clone(),
        distance: h.distance,
    }))
}

/// Distance between the faces in two photos, judged against the same
/// threshold the gallery matcher uses.
pub async fn compare(state: &AppState, image1: Vec<u8>, image2: Vec<u8>) -> Result<CompareOutcome, FaceError> {
    let e1 = extract_embedding(state, image1).await?;
    let e2 = extract_embedding(state, image2).await?;
    let distance = matcher::euclidean_distance(&e1, &e2).ok_or_else(|| {
        FaceError::ExtractionFailed("embeddings have mismatched dimensions".into())
    })?;
    Ok(CompareOutcome {
        distance,
        same_person: distance < state.cfg.match_threshold,
    })
}

/// Remove an identity. The gallery delete is authoritative; the media delete
/// is best-effort and a failure there is logged, never surfaced.
pub async fn remove(state: &AppState, name: &str) -> Result<bool, FaceError> {
    let gallery = state.gallery.clone();
    let delete_name = name.to_string();
    let existed = tokio::task::spawn_blocking(move || gallery.delete(&delete_name))
        .await
        .map_err(|e| FaceError::Storage(format!("gallery task failed: {}", e)))??;

    let key = format!("{}.jpg", name);
    if let Err(e) = media_delete(state.media.clone(), &key).await {
        warn!("failed to delete image {}: {}", key, e);
    }

    info!("usuario {} eliminado (existed: {})", name, existed);
    Ok(existed)
}

async fn extract_embedding(state: &AppState, image: Vec<u8>) -> Result<Vec<f32>, FaceError> {
    let extractor: Arc<dyn FaceExtractor> = state.extractor.clone();
    run_with_deadline(
        state.cfg.extract_timeout,
        tokio::task::spawn_blocking(move || extractor.extract(&image)),
    )
    .await
}

async fn media_put(state: &AppState, key: String, bytes: Vec<u8>) -> Result<String, FaceError> {
    let media = state.media.clone();
    run_with_deadline(
        state.cfg.storage_timeout,
        tokio::task::spawn_blocking(move || media.put(&key, &bytes)),
    )
    .await
}

async fn media_delete(media: Arc<dyn MediaStore>, key: &str) -> Result<(), FaceError> {
    let key = key.to_string();
    tokio::task::spawn_blocking(move || media.delete(&key))
        .await
        .map_err(|e| FaceError::Storage(format!("media task failed: {}", e)))?
}

async fn run_with_deadline<T>(
    deadline: Duration,
    task: tokio::task::JoinHandle<Result<T, FaceError>>,
) -> Result<T, FaceError> {
    match timeout(deadline, task).await {
        Err(_) => Err(FaceError::Timeout(deadline)),
        Ok(Err(join)) => Err(FaceError::Storage(format!("worker task failed: {}", join))),
        Ok(Ok(result)) => result,
    }
}
