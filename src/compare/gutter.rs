use super::differ::DiffMask;

/// Row-wise density of differing pixels, rendered as the minimap alongside
/// the comparison. Purely visual; navigation never reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GutterMap {
    width: u32,
    counts: Vec<u32>,
}

impl GutterMap {
    pub fn compute(mask: &DiffMask) -> Self {
        let mut counts = vec![0u32; mask.height() as usize];
        for row in 0..mask.height() {
            let mut count = 0;
            for col in 0..mask.width() {
                if mask.differs(row, col) {
                    count += 1;
                }
            }
            counts[row as usize] = count;
        }
        Self {
            width: mask.width(),
            counts,
        }
    }

    pub fn rows(&self) -> usize {
        self.counts.len()
    }

    /// Differing cells in one row. Out-of-range reads as 0.
    pub fn count(&self, row: u32) -> u32 {
        self.counts.get(row as usize).copied().unwrap_or(0)
    }

    /// Density of one row, normalized to [0, 1] by the row width.
    pub fn density(&self, row: u32) -> f32 {
        self.count(row) as f32 / self.width as f32
    }

    /// Fresh top-to-bottom pass over the row densities. Each call restarts
    /// from the first row.
    pub fn densities(&self) -> impl Iterator<Item = f32> + '_ {
        self.counts.iter().map(|&c| c as f32 / self.width as f32)
    }

    /// Total differing cells across all rows.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }

    /// Largest per-row density, for scaling the minimap shade ramp.
    pub fn max_density(&self) -> f32 {
        self.counts
            .iter()
            .map(|&c| c as f32 / self.width as f32)
            .fold(0.0, f32::max)
    }
}
