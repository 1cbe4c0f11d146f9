//! Bit string → tiled 1-bpp plane.

use crate::bits::BitString;
use crate::PanelGeometry;

/// Tile `bits` over the panel in `block_size`-pixel square cells.
///
/// Cells are filled row-major from the top-left, one bit per cell, repeating
/// `bits` cyclically. Each cell row is emitted `block_size` times, every
/// emitted row is cropped to the panel width and the rows are concatenated
/// without per-row byte alignment. The stream is cropped to exactly
/// `width * height` bits, packed MSB-first and zero-padded to
/// [`PanelGeometry::plane_len`] bytes.
///
/// `block_size` below 1 is treated as 1. An empty bit string yields an
/// all-zero plane.
pub fn make_buffer_from_bitstring(
    bits: &BitString,
    block_size: usize,
    geometry: PanelGeometry,
) -> Vec<u8> {
    let mut buffer = vec![0u8; geometry.plane_len()];
    let pattern = bits.as_slice();
    if pattern.is_empty() || geometry.width == 0 || geometry.height == 0 {
        return buffer;
    }

    let block = block_size.max(1);
    let block_width = geometry.width.div_ceil(block);

    // Cell rows below the panel edge are cropped, not spilled into padding.
    let mut pos = 0usize;
    for row in 0..geometry.height {
        let cell_row = row / block;
        for x in 0..geometry.width {
            let cell = cell_row * block_width + x / block;
            if pattern[cell % pattern.len()] {
                buffer[pos / 8] |= 0x80 >> (pos % 8);
            }
            pos += 1;
        }
    }
    buffer
}
