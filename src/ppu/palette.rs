//! 2C02 master palette.

/// 64 system colours as 0xRRGGBB.
pub const NES_PALETTE_RGB: [u32; 64] = [
    0x545454, 0x001E74, 0x081090, 0x300088, 0x440064, 0x5C0030, 0x540400, 0x3C1800, 0x202A00,
    0x083A00, 0x004000, 0x003C00, 0x00302C, 0x000000, 0x000000, 0x000000, 0x989698, 0x084CC4,
    0x3032EC, 0x5C1EE4, 0x8814B0, 0xA01464, 0x982220, 0x783C00, 0x545A00, 0x287200, 0x087C00,
    0x007628, 0x006678, 0x000000, 0x000000, 0x000000, 0xECEEEC, 0x3C7EEC, 0x5C5CEC, 0x8844EC,
    0xB02CEC, 0xE028B0, 0xD83C50, 0xC45400, 0xAC7000, 0x808800, 0x409C30, 0x20A458, 0x209A88,
    0x404040, 0x000000, 0x000000, 0xECEEEC, 0xA8BCEC, 0xBCACEC, 0xD4A0EC, 0xEC94EC, 0xEC90D4,
    0xEC9CB4, 0xE4B090, 0xDCC878, 0xD4DC78, 0xB8EC98, 0xA8ECBC, 0xA0E4E4, 0xA0A0A0, 0x000000,
    0x000000,
];

/// RGB for a palette RAM entry. Grayscale keeps only the column-0 greys.
pub fn rgb(entry: u8, grayscale: bool) -> u32 {
    let mask = if grayscale { 0x30 } else { 0x3F };
    NES_PALETTE_RGB[(entry & mask) as usize]
}

/// Index into the 32-byte palette RAM for $3F00–$3FFF. $3F10/$14/$18/$1C alias $3F00/$04/$08/$0C.
pub fn palette_index(addr: u16) -> usize {
    let index = (addr & 0x1F) as usize;
    if index >= 0x10 && index & 0x03 == 0 {
        index - 0x10
    } else {
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprite_backdrop_entries_alias_background() {
        assert_eq!(palette_index(0x3F10), 0x00);
        assert_eq!(palette_index(0x3F14), 0x04);
        assert_eq!(palette_index(0x3F1C), 0x0C);
        assert_eq!(palette_index(0x3F11), 0x11);
        assert_eq!(palette_index(0x3F30), 0x00);
    }

    #[test]
    fn grayscale_drops_hue() {
        assert_eq!(rgb(0x21, true), NES_PALETTE_RGB[0x20]);
        assert_eq!(rgb(0x21, false), NES_PALETTE_RGB[0x21]);
    }
}
