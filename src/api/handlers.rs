use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
    Json,
};
use ndarray::ArrayView1;
use serde::Deserialize;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::{
    core::distance::DistanceMetric,
    error::{Error, Result},
    inspect_with,
    utils::{ensure_dir_exists, upload_path},
    AppState,
};

use super::responses::{ApiResponse, DistanceResult};

/// Body of `POST /api/distance`
#[derive(Debug, Deserialize)]
pub(crate) struct DistanceRequest {
    metric: DistanceMetric,
    x1: Vec<f64>,
    x2: Vec<f64>,
}

pub(crate) async fn compute_distance(Json(request): Json<DistanceRequest>) -> Result<impl IntoResponse> {
    let distance = request
        .metric
        .compute(ArrayView1::from(&request.x1[..]), ArrayView1::from(&request.x2[..]))?;
    log::debug!(
        "{} distance over {} values: {}",
        request.metric,
        request.x1.len(),
        distance
    );

    Ok(ApiResponse::success(DistanceResult {
        metric: request.metric,
        distance,
    }))
}

pub(crate) async fn inspect_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let upload_dir = state.config.upload_dir.clone();
    ensure_dir_exists(&upload_dir)?;

    let mut temp_path = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .ok_or_else(|| Error::InvalidInput("No filename provided".to_string()))?
            .to_string();

        let path = upload_path(&upload_dir, &file_name);
        let content = field.bytes().await?;
        let mut temp_file = File::create(&path).await?;
        temp_file.write_all(&content).await?;
        temp_file.flush().await?;
        log::debug!("Stored upload {} ({} bytes) as {}", file_name, content.len(), path.display());
        temp_path = Some(path);
        break;
    }
    let temp_path = temp_path.ok_or_else(|| Error::InvalidInput("No file provided".to_string()))?;

    let registry = state.registry.clone();
    let path = temp_path.clone();
    let result = tokio::task::spawn_blocking(move || inspect_with(&path, &registry)).await;

    if let Err(e) = tokio::fs::remove_file(&temp_path).await {
        log::warn!("Failed to remove upload {}: {}", temp_path.display(), e);
    }

    Ok(ApiResponse::success(result??))
}
