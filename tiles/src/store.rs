use anyhow::{anyhow, Result};
use database::Database;
use snap::raw::{Decoder, Encoder};
use types::{
    config::Spec,
    primitives::{Epoch, Slot},
};

use crate::{MAX_ZOOM, TILE_BYTES, TILE_SIZE};

/// Tile keys: prefix, type, zoom, then big-endian X before big-endian Y,
/// so a prefix scan over one zoom level orders tiles by epoch position.
pub const TILE_KEY_PREFIX: &[u8; 3] = b"til";

const KEY_SIZE: usize = TILE_KEY_PREFIX.len() + 1 + 1 + 4 + 4;

#[must_use]
pub fn tile_key(tile_type: u8, zoom: u8, tile_x: u32, tile_y: u32) -> [u8; KEY_SIZE] {
    let mut key = [0; KEY_SIZE];
    key[..3].copy_from_slice(TILE_KEY_PREFIX);
    key[3] = tile_type;
    key[4] = zoom;
    key[5..9].copy_from_slice(&tile_x.to_be_bytes());
    key[9..13].copy_from_slice(&tile_y.to_be_bytes());
    key
}

pub fn put_tile(
    database: &Database,
    tile_type: u8,
    zoom: u8,
    tile_x: u32,
    tile_y: u32,
    planes: &[u8],
) -> Result<()> {
    debug_assert_eq!(planes.len(), TILE_BYTES);

    let compressed = Encoder::new().compress_vec(planes)?;
    database.put(tile_key(tile_type, zoom, tile_x, tile_y), compressed)
}

/// The decompressed channel planes of a stored tile.
pub fn get_tile(
    database: &Database,
    tile_type: u8,
    zoom: u8,
    tile_x: u32,
    tile_y: u32,
) -> Result<Option<Vec<u8>>> {
    let Some(compressed) = database.get(tile_key(tile_type, zoom, tile_x, tile_y))? else {
        return Ok(None);
    };

    let planes = Decoder::new().decompress_vec(&compressed)?;

    if planes.len() != TILE_BYTES {
        return Err(anyhow!(
            "tile ({tile_x}, {tile_y}) at zoom {zoom} decompressed to {} bytes",
            planes.len(),
        ));
    }

    Ok(Some(planes))
}

/// The first epoch of the rightmost zoom-0 tile column, found by a
/// reverse scan over the type's zoom-0 keys.
pub fn last_tile_epoch(database: &Database, tile_type: u8) -> Result<Option<Epoch>> {
    let prefix = [
        TILE_KEY_PREFIX[0],
        TILE_KEY_PREFIX[1],
        TILE_KEY_PREFIX[2],
        tile_type,
        0,
    ];

    let Some(result) = database
        .descending_from(tile_key(tile_type, 0, u32::MAX, u32::MAX))?
        .next()
    else {
        return Ok(None);
    };

    let (key, _) = result?;

    if !key.starts_with(&prefix) {
        return Ok(None);
    }

    let tile_x = key[5..9]
        .try_into()
        .map(u32::from_be_bytes)
        .map_err(|_| anyhow!("tile key of unexpected length: {}", key.len()))?;

    Ok(Some(u64::from(tile_x) * TILE_SIZE as u64))
}

/// Deletes every tile of the type that covers the epoch of `from_slot` or
/// anything after it, at every zoom level, one batch per level.
pub fn reset_tiles(
    database: &Database,
    spec: &Spec,
    tile_type: u8,
    from_slot: Slot,
) -> Result<()> {
    let reset_epoch = spec.epoch_at_slot(from_slot);

    let Some(last_epoch) = last_tile_epoch(database, tile_type)? else {
        return Ok(());
    };

    if reset_epoch > last_epoch {
        return Ok(());
    }

    for zoom in 0..=MAX_ZOOM {
        let epochs_per_tile_log2 = TILE_SIZE.ilog2() + u32::from(zoom);
        let start = u32::try_from(reset_epoch >> epochs_per_tile_log2)?;
        let end = u32::try_from(last_epoch >> epochs_per_tile_log2)?;

        database.delete_range(
            tile_key(tile_type, zoom, start, 0).to_vec()
                ..tile_key(tile_type, zoom, end + 1, 0).to_vec(),
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_order_x_before_y() {
        assert!(tile_key(0, 0, 0, 5) < tile_key(0, 0, 1, 0));
        assert!(tile_key(0, 0, 1, 0) < tile_key(0, 0, 1, 1));
        assert!(tile_key(0, 0, u32::MAX, u32::MAX) < tile_key(0, 1, 0, 0));
    }

    #[test]
    fn tiles_round_trip() -> Result<()> {
        let database = Database::in_memory();
        let planes = vec![0x42; TILE_BYTES];

        put_tile(&database, 0, 3, 7, 9, &planes)?;

        assert_eq!(get_tile(&database, 0, 3, 7, 9)?, Some(planes));
        assert_eq!(get_tile(&database, 0, 3, 7, 10)?, None);

        Ok(())
    }

    #[test]
    fn last_tile_epoch_reads_the_rightmost_column() -> Result<()> {
        let database = Database::in_memory();

        assert_eq!(last_tile_epoch(&database, 0)?, None);

        let planes = vec![0; TILE_BYTES];
        put_tile(&database, 0, 0, 2, 0, &planes)?;
        put_tile(&database, 0, 0, 7, 4, &planes)?;
        // Higher zoom levels must not count.
        put_tile(&database, 0, 1, 100, 0, &planes)?;

        assert_eq!(last_tile_epoch(&database, 0)?, Some(7 * TILE_SIZE as u64));

        Ok(())
    }

    #[test]
    fn reset_removes_covering_tiles_at_every_zoom() -> Result<()> {
        let spec = Spec::mainnet();
        let database = Database::in_memory();
        let planes = vec![0; TILE_BYTES];

        for tile_x in 0..4 {
            put_tile(&database, 0, 0, tile_x, 0, &planes)?;
        }
        put_tile(&database, 0, 1, 1, 0, &planes)?;

        // Slot of epoch 300: zoom-0 tile 2, zoom-1 tile 1.
        reset_tiles(&database, &spec, 0, 300 * 32)?;

        assert!(get_tile(&database, 0, 0, 1, 0)?.is_some());
        assert!(get_tile(&database, 0, 0, 2, 0)?.is_none());
        assert!(get_tile(&database, 0, 0, 3, 0)?.is_none());
        assert!(get_tile(&database, 0, 1, 1, 0)?.is_none());

        Ok(())
    }
}
