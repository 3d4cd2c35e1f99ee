//! Image comparison engine: bitmap decode/padding, pixel diff mask,
//! 8-connected region extraction, and the row-density gutter.

mod bitmap;
mod differ;
mod gutter;
mod regions;

pub use bitmap::{union_dimensions, Bitmap, DecodeError, CHANNELS, TRANSPARENT};
pub use differ::{DiffMask, DEFAULT_DIFF_THRESHOLD};
pub use gutter::GutterMap;
pub use regions::{extract_regions, DiffRegion, RegionCursor, DEFAULT_MIN_REGION_PIXELS};

use serde::{Deserialize, Serialize};

/// Tunables for one comparison.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompareConfig {
    /// Max absolute channel delta treated as identical.
    pub threshold: u8,
    /// Noise floor for region extraction.
    pub min_region_pixels: usize,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DIFF_THRESHOLD,
            min_region_pixels: DEFAULT_MIN_REGION_PIXELS,
        }
    }
}

/// Everything derived from one (base, current) pair: both bitmaps padded to
/// their union bounding box, the difference mask, the ordered region list,
/// and the gutter densities.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub base: Bitmap,
    pub current: Bitmap,
    pub mask: DiffMask,
    pub regions: Vec<DiffRegion>,
    pub gutter: GutterMap,
}

impl Comparison {
    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    pub fn region(&self, index: usize) -> Option<&DiffRegion> {
        self.regions.get(index)
    }
}

/// Compare two bitmaps. Dimension mismatches are handled by transparent
/// padding, never an error; the output depends only on the two bitmaps and
/// the config.
pub fn compare(base: &Bitmap, current: &Bitmap, config: &CompareConfig) -> Comparison {
    let (width, height) = union_dimensions(base, current);
    let base = base.pad_to(width, height);
    let current = current.pad_to(width, height);
    let mask = DiffMask::compute(&base, &current, config.threshold);
    let regions = extract_regions(&mask, config.min_region_pixels);
    let gutter = GutterMap::compute(&mask);
    Comparison {
        base,
        current,
        mask,
        regions,
        gutter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, pixel: [u8; 4]) -> Bitmap {
        let data: Vec<u8> = pixel
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Bitmap::from_rgba(width, height, data).unwrap()
    }

    #[test]
    fn identical_bitmaps_compare_clean() {
        let bitmap = solid(6, 4, [40, 40, 40, 255]);
        let result = compare(&bitmap, &bitmap, &CompareConfig::default());
        assert_eq!(result.mask.differing_pixels(), 0);
        assert!(result.regions.is_empty());
        assert_eq!(result.gutter.total(), 0);
    }

    #[test]
    fn mismatched_sizes_pad_to_the_union() {
        // 10x10 gray against 12x12: same gray interior, a checkered band of
        // opaque and transparent pixels in rows/cols 10-11.
        let gray = [128, 128, 128, 255];
        let small = solid(10, 10, gray);

        let mut data = vec![0u8; 12 * 12 * 4];
        for row in 0..12u32 {
            for col in 0..12u32 {
                let idx = (row as usize * 12 + col as usize) * 4;
                let px = if row < 10 && col < 10 {
                    gray
                } else if (row + col) % 2 == 0 {
                    [200, 0, 0, 255]
                } else {
                    TRANSPARENT
                };
                data[idx..idx + 4].copy_from_slice(&px);
            }
        }
        let large = Bitmap::from_rgba(12, 12, data).unwrap();

        let result = compare(&small, &large, &CompareConfig { threshold: 0, min_region_pixels: 1 });
        assert_eq!(result.mask.width(), 12);
        assert_eq!(result.mask.height(), 12);

        // The shared interior is identical
        assert!(!result.mask.differs(5, 5));
        // The padded band differs exactly where the larger bitmap is opaque
        for row in 0..12u32 {
            for col in 0..12u32 {
                if row < 10 && col < 10 {
                    continue;
                }
                let expect_diff = (row + col) % 2 == 0;
                assert_eq!(
                    result.mask.differs(row, col),
                    expect_diff,
                    "row {row} col {col}"
                );
            }
        }
    }

    #[test]
    fn derived_outputs_are_consistent() {
        let base = solid(8, 8, [0, 0, 0, 255]);
        let mut data = base.data().to_vec();
        // Paint a 3x3 white block at (2, 2)
        for row in 2..5usize {
            for col in 2..5usize {
                let idx = (row * 8 + col) * 4;
                data[idx..idx + 4].copy_from_slice(&[255, 255, 255, 255]);
            }
        }
        let current = Bitmap::from_rgba(8, 8, data).unwrap();

        let result = compare(&base, &current, &CompareConfig::default());
        assert_eq!(result.regions.len(), 1);
        assert_eq!(result.regions[0].pixel_count, 9);
        assert_eq!(result.gutter.total() as usize, result.mask.differing_pixels());
        assert_eq!(result.region(0), Some(&result.regions[0]));
        assert_eq!(result.region(7), None);
    }
}
