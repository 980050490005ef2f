//! The single-bit allocator shared by the inode and data bitmaps. Bit
//! ordering is LSB-first within each byte; `find_free` early-skips any
//! byte equal to `0xFF`.

use crate::image::Image;
use crate::layout::BLOCK_SIZE;

/// A bitmap's home: the block it starts at within the image. Plain data,
/// not a borrow, so a `FileSystem` can hold several of these alongside one
/// `Image` without any aliasing trouble.
#[derive(Debug, Clone, Copy)]
pub struct BitmapRegion {
    pub start_block: u32,
}

impl BitmapRegion {
    pub fn new(start_block: u32) -> Self {
        Self { start_block }
    }

    fn locate(index: u32) -> (u32, usize, u8) {
        let byte_index = index / 8;
        let bit = (index % 8) as u8;
        let block_offset = byte_index / BLOCK_SIZE as u32;
        let byte_in_block = (byte_index % BLOCK_SIZE as u32) as usize;
        (block_offset, byte_in_block, bit)
    }

    pub fn test(&self, image: &Image, index: u32) -> bool {
        let (block_offset, byte_in_block, bit) = Self::locate(index);
        let mut buf = [0u8; BLOCK_SIZE];
        image.read_block(self.start_block + block_offset, &mut buf);
        (buf[byte_in_block] & (1 << bit)) != 0
    }

    pub fn set(&self, image: &mut Image, index: u32) {
        let (block_offset, byte_in_block, bit) = Self::locate(index);
        let mut buf = [0u8; BLOCK_SIZE];
        let block = self.start_block + block_offset;
        image.read_block(block, &mut buf);
        buf[byte_in_block] |= 1 << bit;
        image.write_block(block, &buf);
    }

    pub fn clear(&self, image: &mut Image, index: u32) {
        let (block_offset, byte_in_block, bit) = Self::locate(index);
        let mut buf = [0u8; BLOCK_SIZE];
        let block = self.start_block + block_offset;
        image.read_block(block, &mut buf);
        buf[byte_in_block] &= !(1 << bit);
        image.write_block(block, &buf);
    }

    /// Lowest `i` in `[min_index, total_bits)` whose bit is clear, or
    /// `None`. Monotonically advancing across calls provided nothing in
    /// between clears a lower bit.
    pub fn find_free(&self, image: &Image, total_bits: u32, min_index: u32) -> Option<u32> {
        let bits_per_block = 8 * BLOCK_SIZE as u32;
        let blocks_to_check = total_bits.div_ceil(bits_per_block);

        for block_offset in 0..blocks_to_check {
            let mut buf = [0u8; BLOCK_SIZE];
            image.read_block(self.start_block + block_offset, &mut buf);

            for (byte_in_block, &byte) in buf.iter().enumerate() {
                if byte == 0xFF {
                    continue;
                }
                for bit in 0..8u32 {
                    if byte & (1 << bit) != 0 {
                        continue;
                    }
                    let index = block_offset * bits_per_block + byte_in_block as u32 * 8 + bit;
                    if index < total_bits && index >= min_index {
                        return Some(index);
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any subset of indices set then cleared leaves the region back
        /// at all-zero, regardless of order.
        #[test]
        fn set_and_clear_every_index_is_a_no_op(indices in proptest::collection::hash_set(0u32..256, 0..64)) {
            let mut image = Image::new_zeroed();
            let region = BitmapRegion::new(1);
            for &i in &indices {
                region.set(&mut image, i);
            }
            for &i in &indices {
                region.clear(&mut image, i);
            }
            for &i in &indices {
                prop_assert!(!region.test(&image, i));
            }
        }

        /// `find_free` never returns an index below `min_index` or at or
        /// above `total_bits`, and whatever it returns is actually clear.
        #[test]
        fn find_free_result_is_in_range_and_clear(
            set_indices in proptest::collection::hash_set(0u32..256, 0..64),
            min_index in 0u32..256,
        ) {
            let mut image = Image::new_zeroed();
            let region = BitmapRegion::new(1);
            for &i in &set_indices {
                region.set(&mut image, i);
            }
            if let Some(found) = region.find_free(&image, 256, min_index) {
                prop_assert!(found >= min_index && found < 256);
                prop_assert!(!region.test(&image, found));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_free_skips_set_bits() {
        let mut image = Image::new_zeroed();
        let region = BitmapRegion::new(1);
        region.set(&mut image, 0);
        region.set(&mut image, 1);
        assert_eq!(region.find_free(&image, 100, 0), Some(2));
    }

    #[test]
    fn find_free_honors_min_index() {
        let image = Image::new_zeroed();
        let region = BitmapRegion::new(1);
        assert_eq!(region.find_free(&image, 128, 1), Some(1));
    }

    #[test]
    fn set_then_clear_round_trips() {
        let mut image = Image::new_zeroed();
        let region = BitmapRegion::new(1);
        region.set(&mut image, 42);
        assert!(region.test(&image, 42));
        region.clear(&mut image, 42);
        assert!(!region.test(&image, 42));
    }

    #[test]
    fn find_free_exhausted_returns_none() {
        let mut image = Image::new_zeroed();
        let region = BitmapRegion::new(1);
        for i in 0..16 {
            region.set(&mut image, i);
        }
        assert_eq!(region.find_free(&image, 16, 0), None);
    }
}
