use std::sync::Arc;

use anyhow::Context as _;
use axum::{
    extract::{Query, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use database::Database;
use serde::Deserialize;
use snap::raw::Decoder;
use tiles::{tile_key, MAX_ARTIFICIAL_ZOOM, TILE_BYTES, TILE_TYPE_VALIDATOR_ORDER};

use crate::{
    error::Error,
    http_api_config::HttpApiConfig,
    tile_view::{resolve_tile, TileView},
};

const INDEX_TEMPLATE: &str = include_str!("index.html");

#[derive(Clone)]
pub struct AppState {
    pub tiles_db: Arc<Database>,
    pub config: HttpApiConfig,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/tile", get(tile))
        .route("/", get(index))
        .with_state(state)
}

#[derive(Deserialize)]
struct TileQuery {
    x: i64,
    y: i64,
    z: i64,
}

async fn tile(
    State(state): State<AppState>,
    Query(query): Query<TileQuery>,
) -> Result<Response, Error> {
    let TileQuery { x, y, z } = query;

    if x < 0 || y < 0 || z < 0 {
        return Err(Error::CoordinatesNegative);
    }

    if z > i64::from(MAX_ARTIFICIAL_ZOOM) {
        return Err(Error::ZoomTooLarge { zoom: z });
    }

    let (x, y) = match (u32::try_from(x), u32::try_from(y)) {
        (Ok(x), Ok(y)) => (x, y),
        _ => return Err(Error::TileNotFound),
    };

    let resolved = resolve_tile(x, y, u8::try_from(z).expect("z is at most 13"));

    let compressed = state
        .tiles_db
        .get(tile_key(
            TILE_TYPE_VALIDATOR_ORDER,
            resolved.stored_zoom,
            resolved.tile_x,
            resolved.tile_y,
        ))
        .context("failed to read tile")?
        .ok_or(Error::TileNotFound)?;

    let planes = Decoder::new()
        .decompress_vec(&compressed)
        .context("failed to decompress tile")?;

    if planes.len() != TILE_BYTES {
        return Err(Error::Internal(anyhow::anyhow!(
            "tile decompressed to {} bytes",
            planes.len(),
        )));
    }

    let png = TileView::new(planes, resolved)
        .to_png()
        .context("failed to encode tile")?;

    Ok(([(CONTENT_TYPE, "image/png")], png).into_response())
}

async fn index(State(state): State<AppState>) -> (StatusCode, Html<String>) {
    let page = INDEX_TEMPLATE
        .replace("{title}", &state.config.site_title)
        .replace("{api}", &state.config.public_endpoint);

    (StatusCode::OK, Html(page))
}
