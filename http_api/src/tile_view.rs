use anyhow::Result;
use tiles::{MAX_ZOOM, TILE_SIZE, TILE_SIZE_SQUARED};

/// Where a request's `(x, y, z)` lands in the stored pyramid.
///
/// Up to `MAX_ZOOM` the request maps straight onto a stored tile. Past it
/// the zoom is synthetic: the zoom-0 tile is served with its pixels
/// replicated `2^scale` times, which enlarges without client-side
/// interpolation artifacts.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ResolvedTile {
    pub stored_zoom: u8,
    pub tile_x: u32,
    pub tile_y: u32,
    pub scale: u8,
    pub offset_x: usize,
    pub offset_y: usize,
}

#[must_use]
pub fn resolve_tile(x: u32, y: u32, z: u8) -> ResolvedTile {
    if z > MAX_ZOOM {
        let scale = z - MAX_ZOOM;
        let tile_x = x >> scale;
        let tile_y = y >> scale;

        ResolvedTile {
            stored_zoom: 0,
            tile_x,
            tile_y,
            scale,
            offset_x: (x - (tile_x << scale)) as usize * (TILE_SIZE >> scale),
            offset_y: (y - (tile_y << scale)) as usize * (TILE_SIZE >> scale),
        }
    } else {
        ResolvedTile {
            stored_zoom: MAX_ZOOM - z,
            tile_x: x,
            tile_y: y,
            scale: 0,
            offset_x: 0,
            offset_y: 0,
        }
    }
}

/// An RGBA view over a stored tile's channel planes. The lowest validator
/// index of the first epoch is the top-left pixel.
pub struct TileView {
    planes: Vec<u8>,
    offset_x: usize,
    offset_y: usize,
    scale: u8,
}

impl TileView {
    #[must_use]
    pub const fn new(planes: Vec<u8>, resolved: ResolvedTile) -> Self {
        Self {
            planes,
            offset_x: resolved.offset_x,
            offset_y: resolved.offset_y,
            scale: resolved.scale,
        }
    }

    #[must_use]
    pub fn rgba_at(&self, x: usize, y: usize) -> [u8; 4] {
        let x = (x + self.offset_x) >> self.scale;
        let y = (y + self.offset_y) >> self.scale;

        if x >= TILE_SIZE || y >= TILE_SIZE {
            return [0; 4];
        }

        let position = x * TILE_SIZE + y;

        [
            self.planes[position],
            self.planes[TILE_SIZE_SQUARED + position],
            self.planes[2 * TILE_SIZE_SQUARED + position],
            self.planes[3 * TILE_SIZE_SQUARED + position],
        ]
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut pixels = Vec::with_capacity(4 * TILE_SIZE_SQUARED);

        for y in 0..TILE_SIZE {
            for x in 0..TILE_SIZE {
                pixels.extend_from_slice(&self.rgba_at(x, y));
            }
        }

        let mut bytes = vec![];

        let mut encoder = png::Encoder::new(&mut bytes, TILE_SIZE as u32, TILE_SIZE as u32);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.write_header()?.write_image_data(&pixels)?;

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use tiles::TILE_BYTES;

    use super::*;

    #[test]
    fn stored_zoom_counts_down_from_max() {
        assert_eq!(
            resolve_tile(5, 6, 0),
            ResolvedTile {
                stored_zoom: MAX_ZOOM,
                tile_x: 5,
                tile_y: 6,
                scale: 0,
                offset_x: 0,
                offset_y: 0,
            },
        );

        assert_eq!(resolve_tile(5, 6, MAX_ZOOM).stored_zoom, 0);
    }

    #[test]
    fn over_zoom_scales_out_of_the_base_tile() {
        let resolved = resolve_tile(3, 0, MAX_ZOOM + 2);

        assert_eq!(
            resolved,
            ResolvedTile {
                stored_zoom: 0,
                tile_x: 0,
                tile_y: 0,
                scale: 2,
                offset_x: 96,
                offset_y: 0,
            },
        );
    }

    #[test]
    fn over_zoom_view_replicates_source_pixels() {
        let mut planes = vec![0; TILE_BYTES];
        // Red channel of the column-major pixel at (24, 0).
        planes[24 * TILE_SIZE] = 0x77;

        let view = TileView::new(planes, resolve_tile(3, 0, MAX_ZOOM + 2));

        assert_eq!(view.rgba_at(0, 0)[0], 0x77);
        // 2² view pixels per source pixel.
        assert_eq!(view.rgba_at(3, 3)[0], 0x77);
        assert_eq!(view.rgba_at(4, 0)[0], 0);
    }

    #[test]
    fn out_of_range_pixels_are_transparent() {
        let view = TileView::new(vec![0xff; TILE_BYTES], resolve_tile(0, 0, 0));

        assert_eq!(view.rgba_at(TILE_SIZE, 0), [0; 4]);
        assert_eq!(view.rgba_at(0, TILE_SIZE), [0; 4]);
        assert_eq!(view.rgba_at(0, 0), [0xff; 4]);
    }

    #[test]
    fn png_round_trips_the_view() -> Result<()> {
        let mut planes = vec![0; TILE_BYTES];
        planes[0] = 10;
        planes[TILE_SIZE_SQUARED] = 20;
        planes[2 * TILE_SIZE_SQUARED] = 30;
        planes[3 * TILE_SIZE_SQUARED] = 0xff;

        let view = TileView::new(planes, resolve_tile(0, 0, 0));
        let encoded = view.to_png()?;

        let decoder = png::Decoder::new(std::io::Cursor::new(encoded));
        let mut reader = decoder.read_info()?;
        let mut pixels = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut pixels)?;

        assert_eq!(info.width, TILE_SIZE as u32);
        assert_eq!(info.height, TILE_SIZE as u32);
        assert_eq!(&pixels[..4], [10, 20, 30, 0xff]);

        Ok(())
    }
}
