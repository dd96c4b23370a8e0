use anyhow::Result;
use database::Database;

use crate::{get_tile, put_tile, tile_key, TILE_BYTES, TILE_SIZE, TILE_SIZE_SQUARED};

/// Builds the zoom-`zoom` tile column at `tile_x` from the four zoom-`zoom − 1`
/// tiles under each output tile. The column ends at the first Y where all
/// four inputs are absent; a partially absent input quadrant averages as
/// fully transparent black.
pub fn downsample_column(
    tiles_db: &Database,
    tile_type: u8,
    tile_x: u32,
    zoom: u8,
) -> Result<()> {
    assert!(zoom > 0, "zoom 0 tiles are built from performance records");

    for tile_y in 0.. {
        // y grows downward: (2x, 2y) is the top-left input.
        let inputs = [
            (2 * tile_x, 2 * tile_y),
            (2 * tile_x + 1, 2 * tile_y),
            (2 * tile_x, 2 * tile_y + 1),
            (2 * tile_x + 1, 2 * tile_y + 1),
        ];

        let mut any_present = false;

        for (x, y) in inputs {
            if tiles_db.contains_key(tile_key(tile_type, zoom - 1, x, y))? {
                any_present = true;
            }
        }

        if !any_present {
            break;
        }

        let mut output = vec![0_u8; TILE_BYTES];
        let half = TILE_SIZE / 2;

        for (quadrant, (x, y)) in inputs.into_iter().enumerate() {
            let input = get_tile(tiles_db, tile_type, zoom - 1, x, y)?
                .unwrap_or_else(|| vec![0; TILE_BYTES]);

            let offset_x = (quadrant % 2) * half;
            let offset_y = (quadrant / 2) * half;

            downsample_quadrant(&input, &mut output, offset_x, offset_y);
        }

        put_tile(tiles_db, tile_type, zoom, tile_x, tile_y, &output)?;
    }

    Ok(())
}

/// Averages each 2×2 block of `input` into one pixel of the output
/// quadrant at `(offset_x, offset_y)`, channel plane by channel plane.
fn downsample_quadrant(input: &[u8], output: &mut [u8], offset_x: usize, offset_y: usize) {
    let mix = |a: u8, b: u8, c: u8, d: u8| {
        ((u16::from(a) + u16::from(b) + u16::from(c) + u16::from(d)) / 4) as u8
    };

    for x in 0..TILE_SIZE / 2 {
        for y in 0..TILE_SIZE / 2 {
            // Top-left, top-right, bottom-left, bottom-right of the block,
            // in the column-major plane layout.
            let p0 = 2 * x * TILE_SIZE + 2 * y;
            let p1 = p0 + TILE_SIZE;
            let p2 = p0 + 1;
            let p3 = p2 + TILE_SIZE;

            let position = (offset_x + x) * TILE_SIZE + offset_y + y;

            for plane in (0..4 * TILE_SIZE_SQUARED).step_by(TILE_SIZE_SQUARED) {
                output[position + plane] = mix(
                    input[p0 + plane],
                    input[p1 + plane],
                    input[p2 + plane],
                    input[p3 + plane],
                );
            }
        }
    }
}
