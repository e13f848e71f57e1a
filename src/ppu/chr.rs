//! Pattern table decoding for CHR viewers.
//!
//! A tile is 16 bytes: eight rows of the low bit plane followed by eight rows of the high plane,
//! leftmost pixel in bit 7. A pattern table is 256 tiles laid out 16×16, i.e. 128×128 pixels.

use crate::cartridge::mapper::mapper::Mapper;
use crate::ppu::palette;

pub const TILE_BYTES: usize = 16;
/// Width and height of one pattern table in pixels.
pub const TABLE_SIDE: usize = 128;
const TILES_PER_ROW: usize = TABLE_SIDE / 8;

/// Colours used when no game palette is at hand: black, dark grey, light grey, white.
pub const GREYS: [u32; 4] = [
    palette::NES_PALETTE_RGB[0x0F],
    palette::NES_PALETTE_RGB[0x00],
    palette::NES_PALETTE_RGB[0x10],
    palette::NES_PALETTE_RGB[0x30],
];

/// Decode one tile into 2-bit colour indices, row-major.
pub fn decode_tile(tile: &[u8; TILE_BYTES]) -> [[u8; 8]; 8] {
    let mut pixels = [[0u8; 8]; 8];
    for (y, row) in pixels.iter_mut().enumerate() {
        let lo = tile[y];
        let hi = tile[y + 8];
        for (x, pixel) in row.iter_mut().enumerate() {
            let bit = 7 - x;
            *pixel = ((lo >> bit) & 1) | (((hi >> bit) & 1) << 1);
        }
    }
    pixels
}

/// Decode pattern table `table` (0 = $0000, 1 = $1000) as currently banked in by `mapper`.
/// Returns `TABLE_SIDE * TABLE_SIDE` colour indices 0–3.
pub fn pattern_table(mapper: &dyn Mapper, table: usize) -> Vec<u8> {
    let base = ((table & 1) * 0x1000) as u16;
    let mut image = vec![0u8; TABLE_SIDE * TABLE_SIDE];
    for index in 0..TILES_PER_ROW * TILES_PER_ROW {
        let mut tile = [0u8; TILE_BYTES];
        for (i, byte) in tile.iter_mut().enumerate() {
            *byte = mapper.chr_read(base + (index * TILE_BYTES + i) as u16);
        }
        let (tile_x, tile_y) = (index % TILES_PER_ROW * 8, index / TILES_PER_ROW * 8);
        for (y, row) in decode_tile(&tile).iter().enumerate() {
            let start = (tile_y + y) * TABLE_SIDE + tile_x;
            image[start..start + 8].copy_from_slice(row);
        }
    }
    image
}

/// Both pattern tables side by side (256×128), coloured with `colours`.
pub fn render(mapper: &dyn Mapper, colours: [u32; 4]) -> Vec<u32> {
    let tables = [pattern_table(mapper, 0), pattern_table(mapper, 1)];
    let mut pixels = Vec::with_capacity(2 * TABLE_SIDE * TABLE_SIDE);
    for y in 0..TABLE_SIDE {
        for table in &tables {
            let row = &table[y * TABLE_SIDE..(y + 1) * TABLE_SIDE];
            pixels.extend(row.iter().map(|&index| colours[index as usize & 3]));
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::{
        cartridge::{Cartridge, tests::ines},
        mapper::new_mapper,
    };

    /// The "½" tile from the NESdev PPU pattern table page.
    const HALF: [u8; TILE_BYTES] = [
        0x41, 0xC2, 0x44, 0x48, 0x10, 0x20, 0x40, 0x80, // low plane
        0x01, 0x02, 0x04, 0x08, 0x16, 0x21, 0x42, 0x87, // high plane
    ];

    #[test]
    fn decodes_both_bit_planes() {
        let pixels = decode_tile(&HALF);
        assert_eq!(pixels[0], [0, 1, 0, 0, 0, 0, 0, 3]);
        assert_eq!(pixels[1], [1, 1, 0, 0, 0, 0, 3, 0]);
        assert_eq!(pixels[4], [0, 0, 0, 3, 0, 2, 2, 0]);
        assert_eq!(pixels[7], [3, 0, 0, 0, 0, 2, 2, 2]);
    }

    #[test]
    fn pattern_table_places_tiles_in_a_16x16_grid() {
        let cart = Cartridge::from_bytes(&ines(1, 0, 0x00, 0x00)).unwrap();
        let mut mapper = new_mapper(&cart).unwrap();
        // Tile 0x11 of the right-hand table: top row solid colour 3.
        let tile = 0x1000 + 0x11 * TILE_BYTES as u16;
        mapper.chr_write(tile, 0xFF);
        mapper.chr_write(tile + 8, 0xFF);

        let right = pattern_table(mapper.as_ref(), 1);
        assert_eq!(right.len(), TABLE_SIDE * TABLE_SIDE);
        let row = &right[8 * TABLE_SIDE + 8..8 * TABLE_SIDE + 16];
        assert_eq!(row, &[3; 8]);
        assert_eq!(right[9 * TABLE_SIDE + 8], 0);
        assert!(pattern_table(mapper.as_ref(), 0).iter().all(|&p| p == 0));

        let pixels = render(mapper.as_ref(), GREYS);
        assert_eq!(pixels.len(), 256 * 128);
        assert_eq!(pixels[8 * 256 + TABLE_SIDE + 8], GREYS[3]);
        assert_eq!(pixels[8 * 256 + 8], GREYS[0]);
    }
}
