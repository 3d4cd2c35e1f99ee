use super::bitmap::{Bitmap, CHANNELS};

/// Channel delta at or below which a pixel pair is treated as identical.
/// Absorbs lossless re-encoding noise; 0 gives bit-exact comparison.
pub const DEFAULT_DIFF_THRESHOLD: u8 = 5;

/// Per-pixel difference magnitudes between two equal-sized bitmaps.
/// A cell is 0 when the pixels match under the threshold, otherwise it
/// holds the maximum absolute channel delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffMask {
    width: u32,
    height: u32,
    cells: Vec<u8>,
}

impl DiffMask {
    /// Compare two equal-dimension bitmaps. Linear in pixel count and
    /// symmetric in its inputs.
    pub fn compute(base: &Bitmap, current: &Bitmap, threshold: u8) -> Self {
        debug_assert_eq!(base.width(), current.width(), "Bitmap widths must match");
        debug_assert_eq!(base.height(), current.height(), "Bitmap heights must match");

        let cells = base
            .data()
            .chunks_exact(CHANNELS)
            .zip(current.data().chunks_exact(CHANNELS))
            .map(|(a, b)| {
                let magnitude = pixel_magnitude(a, b);
                if magnitude > threshold {
                    magnitude
                } else {
                    0
                }
            })
            .collect();

        Self {
            width: base.width(),
            height: base.height(),
            cells,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Difference magnitude at a cell. Out-of-range reads as 0.
    #[inline]
    pub fn magnitude(&self, row: u32, col: u32) -> u8 {
        if row >= self.height || col >= self.width {
            return 0;
        }
        self.cells[row as usize * self.width as usize + col as usize]
    }

    #[inline]
    pub fn differs(&self, row: u32, col: u32) -> bool {
        self.magnitude(row, col) != 0
    }

    /// Total count of differing cells.
    pub fn differing_pixels(&self) -> usize {
        self.cells.iter().filter(|&&m| m != 0).count()
    }
}

/// Maximum absolute delta across the R/G/B/A channels of one pixel pair.
#[inline]
fn pixel_magnitude(a: &[u8], b: &[u8]) -> u8 {
    let mut max = 0i16;
    for ch in 0..CHANNELS {
        let delta = (a[ch] as i16 - b[ch] as i16).abs();
        if delta > max {
            max = delta;
        }
    }
    max as u8
}
