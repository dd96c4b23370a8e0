pub use crate::{
    http_api_config::HttpApiConfig,
    task::HttpApi,
    tile_view::{resolve_tile, ResolvedTile, TileView},
};

mod error;
mod http_api_config;
mod routing;
mod task;
mod tile_view;
