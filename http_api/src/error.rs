use anyhow::Error as AnyhowError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::{debug, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("negative tile coordinates")]
    CoordinatesNegative,
    #[error("zoom level {zoom} is too large")]
    ZoomTooLarge { zoom: i64 },
    #[error("tile not found")]
    TileNotFound,
    #[error("internal error")]
    Internal(#[from] AnyhowError),
}

impl Error {
    const fn status_code(&self) -> StatusCode {
        match self {
            Self::ZoomTooLarge { .. } => StatusCode::BAD_REQUEST,
            Self::CoordinatesNegative | Self::TileNotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(error) => warn!("internal error serving tile: {error:?}"),
            error => debug!("rejected tile request: {error}"),
        }

        (self.status_code(), self.to_string()).into_response()
    }
}
