//! Tile building and storage.
//!
//! A tile is a 128×128 RGBA fragment of the (epoch, validator) plane.
//! The stored payload keeps the four channels as separate planes, and
//! pixels within a plane are laid out column by column: a validator's
//! run of adjacent epochs is contiguous, which is where most of the
//! snappy compression win comes from. Do not "fix" this to row-major.

pub use crate::{
    base::build_base_tiles,
    pyramid::downsample_column,
    store::{get_tile, last_tile_epoch, put_tile, reset_tiles, tile_key, TILE_KEY_PREFIX},
};

mod base;
mod pyramid;
mod store;

use anyhow::{ensure, Context as _, Result};
use database::Database;
use log::info;
use types::primitives::Epoch;

pub const TILE_SIZE: usize = 128;
pub const TILE_SIZE_SQUARED: usize = TILE_SIZE * TILE_SIZE;
/// Four channel planes of `TILE_SIZE`² bytes each.
pub const TILE_BYTES: usize = 4 * TILE_SIZE_SQUARED;

pub const MAX_ZOOM: u8 = 9;
/// Zoom levels past `MAX_ZOOM` only scale pixels at serve time rather
/// than providing more detail.
pub const MAX_ARTIFICIAL_ZOOM: u8 = 13;

/// The over-zoom replication factor may not exceed the tile size.
const _: () = assert!(MAX_ARTIFICIAL_ZOOM - MAX_ZOOM <= TILE_SIZE.ilog2() as u8);

/// The "natural validator order" tile type. The type byte stays in keys
/// and requests so further orderings can join without a keyspace change.
pub const TILE_TYPE_VALIDATOR_ORDER: u8 = 0;

/// Rebuilds tiles covering `[start_epoch, end_epoch)`: the zoom-0 pass
/// first, then each zoom level from the one below it. Later zoom levels
/// read what earlier phases wrote, so the phases are fully sequential.
pub fn update_tiles(
    tiles_db: &Database,
    perf_db: &Database,
    start_epoch: Epoch,
    end_epoch: Epoch,
) -> Result<()> {
    ensure!(
        start_epoch <= end_epoch,
        "invalid epoch range {start_epoch}..{end_epoch}",
    );

    let last_perf_epoch = validator_performance::last_epoch(perf_db)?
        .context("the performance store holds no records")?;

    let mut end_epoch = end_epoch;

    if last_perf_epoch < end_epoch {
        info!("reducing end epoch to available performance data: {last_perf_epoch}");
        end_epoch = last_perf_epoch;
    }

    let tile_size = TILE_SIZE as u64;

    for tile_x in start_epoch / tile_size..=end_epoch / tile_size {
        info!("building base tiles at x {tile_x}");
        build_base_tiles(tiles_db, perf_db, TILE_TYPE_VALIDATOR_ORDER, tile_x)?;
    }

    for zoom in 1..=MAX_ZOOM {
        let epochs_per_tile = tile_size << zoom;
        let tiles_x_start = start_epoch / epochs_per_tile;
        let tiles_x_end = end_epoch.div_ceil(epochs_per_tile);

        for tile_x in tiles_x_start..tiles_x_end {
            info!("downsampling tiles at x {tile_x} zoom {zoom}");
            downsample_column(tiles_db, TILE_TYPE_VALIDATOR_ORDER, tile_x, zoom)?;
        }
    }

    info!("finished building tiles for epochs {start_epoch}..{end_epoch}");

    Ok(())
}
