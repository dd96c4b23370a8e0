use anyhow::Result;
use database::Database;
use log::debug;
use types::primitives::Epoch;
use validator_performance::{get_performance, ValidatorPerformance, HEAD_DISTANCE_UNKNOWN};

use crate::{put_tile, TILE_SIZE, TILE_SIZE_SQUARED};

const DISTANCE_UNKNOWN_BRIGHTNESS: u8 = 0x30;
const UNSEEN_GRAY: u8 = 0x20;

/// Brightness of a distance byte: full at distance 1, falling off with a
/// quintic curve, a fixed dim value when the distance is unknown.
fn distance_curve(distance: u8) -> u8 {
    if distance == HEAD_DISTANCE_UNKNOWN {
        return DISTANCE_UNKNOWN_BRIGHTNESS;
    }

    // Distances beyond the curve's domain darken to black rather than
    // wrapping around.
    let q = u32::from(64_u8.saturating_sub(distance));

    ((q * q * q * q * q) >> 22) as u8
}

/// Builds the zoom-0 tile column for tile X-coordinate `tile_x`, covering
/// epochs `[tile_x · 128, tile_x · 128 + 128)`. The column is as tall as
/// the largest performance record in the window; epochs without records
/// stay transparent.
pub fn build_base_tiles(
    tiles_db: &Database,
    perf_db: &Database,
    tile_type: u8,
    tile_x: u64,
) -> Result<()> {
    let tile_size = TILE_SIZE as u64;

    let mut max_validators = 0_usize;

    for x in 0..tile_size {
        let epoch: Epoch = tile_x * tile_size + x;

        if let Some(performance) = get_performance(perf_db, epoch)? {
            max_validators = max_validators.max(performance.len());
        }
    }

    let tiles_y = max_validators.div_ceil(TILE_SIZE);
    let mut tiles = vec![vec![0_u8; 4 * TILE_SIZE_SQUARED]; tiles_y];

    for x in 0..TILE_SIZE {
        let epoch = tile_x * tile_size + x as u64;

        let Some(performance) = get_performance(perf_db, epoch)? else {
            debug!("no performance record for epoch {epoch}");
            continue;
        };

        for (validator_index, word) in performance.iter().enumerate() {
            let tile = &mut tiles[validator_index / TILE_SIZE];
            let y = validator_index % TILE_SIZE;
            let position = x * TILE_SIZE + y;

            let (red, green, blue, alpha) = pixel(*word);

            tile[position] = red;
            tile[TILE_SIZE_SQUARED + position] = green;
            tile[2 * TILE_SIZE_SQUARED + position] = blue;
            tile[3 * TILE_SIZE_SQUARED + position] = alpha;
        }

        // Indices past this epoch's record are not yet activated:
        // transparent, distinct from the opaque black of exited
        // validators.
    }

    for (tile_y, planes) in tiles.iter().enumerate() {
        put_tile(
            tiles_db,
            tile_type,
            0,
            u32::try_from(tile_x)?,
            u32::try_from(tile_y)?,
            planes,
        )?;
    }

    Ok(())
}

fn pixel(word: ValidatorPerformance) -> (u8, u8, u8, u8) {
    if !word.exists() {
        // An inactive gap between activations, or an exited validator.
        return (0, 0, 0, 0xff);
    }

    if !word.is_credited() {
        return (UNSEEN_GRAY, UNSEEN_GRAY, UNSEEN_GRAY, 0xff);
    }

    let red = distance_curve(word.head_distance());
    let green = if word.target_correct() { 0xff } else { 0 };
    let blue = distance_curve(word.inclusion_distance());

    (red, green, blue, 0xff)
}

#[cfg(test)]
mod tests {
    use validator_performance::put_performance;

    use crate::get_tile;

    use super::*;

    #[test]
    fn curve_is_bright_near_and_dark_far() {
        assert_eq!(distance_curve(1), 236);
        assert!(distance_curve(2) < distance_curve(1));
        assert_eq!(distance_curve(64), 0);
        assert_eq!(distance_curve(100), 0);
        assert_eq!(distance_curve(HEAD_DISTANCE_UNKNOWN), DISTANCE_UNKNOWN_BRIGHTNESS);
    }

    #[test]
    fn base_tiles_are_column_major_planes() -> Result<()> {
        let tiles_db = Database::in_memory();
        let perf_db = Database::in_memory();

        // Three validators: unseen, perfect, beyond-activation (absent in
        // epoch 1's shorter record).
        put_performance(
            &perf_db,
            0,
            &[
                ValidatorPerformance::EXISTS,
                ValidatorPerformance::attested(true, 1, 1),
                ValidatorPerformance::from_u32(0),
            ],
        )?;
        put_performance(&perf_db, 1, &[ValidatorPerformance::EXISTS])?;

        build_base_tiles(&tiles_db, &perf_db, 0, 0)?;

        let planes = get_tile(&tiles_db, 0, 0, 0, 0)?.expect("base tile should exist");

        let pixel_at = |x: usize, y: usize| {
            let position = x * TILE_SIZE + y;
            (
                planes[position],
                planes[TILE_SIZE_SQUARED + position],
                planes[2 * TILE_SIZE_SQUARED + position],
                planes[3 * TILE_SIZE_SQUARED + position],
            )
        };

        // Epoch 0: unseen gray, perfect attestation, inactive gap.
        assert_eq!(pixel_at(0, 0), (UNSEEN_GRAY, UNSEEN_GRAY, UNSEEN_GRAY, 0xff));
        assert_eq!(pixel_at(0, 1), (236, 0xff, 236, 0xff));
        assert_eq!(pixel_at(0, 2), (0, 0, 0, 0xff));

        // Epoch 1's record is shorter: the tail is transparent.
        assert_eq!(pixel_at(1, 0), (UNSEEN_GRAY, UNSEEN_GRAY, UNSEEN_GRAY, 0xff));
        assert_eq!(pixel_at(1, 1), (0, 0, 0, 0));
        assert_eq!(pixel_at(1, 2), (0, 0, 0, 0));

        // Epochs with no record at all stay fully transparent.
        assert_eq!(pixel_at(5, 0), (0, 0, 0, 0));

        Ok(())
    }

    #[test]
    fn tall_validator_sets_span_multiple_tiles() -> Result<()> {
        let tiles_db = Database::in_memory();
        let perf_db = Database::in_memory();

        let performance = vec![ValidatorPerformance::EXISTS; TILE_SIZE + 1];
        put_performance(&perf_db, 0, &performance)?;

        build_base_tiles(&tiles_db, &perf_db, 0, 0)?;

        let lower = get_tile(&tiles_db, 0, 0, 0, 1)?.expect("second tile row should exist");

        // Validator 128 is the first row of the second tile.
        assert_eq!(lower[0], UNSEEN_GRAY);
        assert_eq!(lower[3 * TILE_SIZE_SQUARED], 0xff);
        // Validator 129 does not exist in the record: transparent.
        assert_eq!(lower[3 * TILE_SIZE_SQUARED + 1], 0);

        Ok(())
    }

    #[test]
    fn missed_head_renders_the_dim_marker() -> Result<()> {
        let tiles_db = Database::in_memory();
        let perf_db = Database::in_memory();

        put_performance(
            &perf_db,
            0,
            &[ValidatorPerformance::attested(true, HEAD_DISTANCE_UNKNOWN, 1)],
        )?;

        build_base_tiles(&tiles_db, &perf_db, 0, 0)?;

        let planes = get_tile(&tiles_db, 0, 0, 0, 0)?.expect("base tile should exist");

        assert_eq!(planes[0], DISTANCE_UNKNOWN_BRIGHTNESS);
        assert_eq!(planes[TILE_SIZE_SQUARED], 0xff);

        Ok(())
    }
}
