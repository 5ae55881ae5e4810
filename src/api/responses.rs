use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::core::distance::DistanceMetric;

/// Envelope for every successful API response. Failures are rendered by
/// [`crate::Error`] instead.
#[derive(Debug, Serialize)]
pub(crate) struct ApiResponse<T: Serialize> {
    pub(crate) success: bool,
    pub(crate) data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub(crate) fn success(data: T) -> Self {
        Self { success: true, data }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Result of `POST /api/distance`
#[derive(Debug, Serialize)]
pub(crate) struct DistanceResult {
    pub(crate) metric: DistanceMetric,
    pub(crate) distance: f64,
}
