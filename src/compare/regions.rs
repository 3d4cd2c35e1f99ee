use super::differ::DiffMask;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Components smaller than this many pixels are dropped as compression noise.
pub const DEFAULT_MIN_REGION_PIXELS: usize = 4;

/// Bounding box of one 8-connected cluster of differing pixels.
/// Coordinates are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRegion {
    pub min_row: u32,
    pub min_col: u32,
    pub max_row: u32,
    pub max_col: u32,
    pub pixel_count: usize,
}

impl DiffRegion {
    pub fn width(&self) -> u32 {
        self.max_col - self.min_col + 1
    }

    pub fn height(&self) -> u32 {
        self.max_row - self.min_row + 1
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.min_row && row <= self.max_row && col >= self.min_col && col <= self.max_col
    }

    pub fn center(&self) -> (u32, u32) {
        (
            self.min_row + self.height() / 2,
            self.min_col + self.width() / 2,
        )
    }
}

/// Cluster the mask's differing pixels into bounding-box regions.
///
/// Connected-component labeling with 8-connectivity, so anti-aliased
/// diagonal edges form one navigable region instead of fragmenting.
/// Components under `min_pixels` are discarded; they still count in the
/// mask and gutter. Result is sorted ascending by `(min_row, min_col)`.
pub fn extract_regions(mask: &DiffMask, min_pixels: usize) -> Vec<DiffRegion> {
    let width = mask.width();
    let height = mask.height();
    let mut visited = vec![false; width as usize * height as usize];
    let mut regions = Vec::new();
    let mut frontier: VecDeque<(u32, u32)> = VecDeque::new();

    for row in 0..height {
        for col in 0..width {
            let idx = row as usize * width as usize + col as usize;
            if visited[idx] || !mask.differs(row, col) {
                continue;
            }

            // Breadth-first walk over one connected component
            visited[idx] = true;
            frontier.push_back((row, col));
            let mut region = DiffRegion {
                min_row: row,
                min_col: col,
                max_row: row,
                max_col: col,
                pixel_count: 0,
            };

            while let Some((r, c)) = frontier.pop_front() {
                region.pixel_count += 1;
                region.min_row = region.min_row.min(r);
                region.min_col = region.min_col.min(c);
                region.max_row = region.max_row.max(r);
                region.max_col = region.max_col.max(c);

                for dr in -1i64..=1 {
                    for dc in -1i64..=1 {
                        if dr == 0 && dc == 0 {
                            continue;
                        }
                        let nr = r as i64 + dr;
                        let nc = c as i64 + dc;
                        if nr < 0 || nc < 0 || nr >= height as i64 || nc >= width as i64 {
                            continue;
                        }
                        let (nr, nc) = (nr as u32, nc as u32);
                        let nidx = nr as usize * width as usize + nc as usize;
                        if !visited[nidx] && mask.differs(nr, nc) {
                            visited[nidx] = true;
                            frontier.push_back((nr, nc));
                        }
                    }
                }
            }

            if region.pixel_count >= min_pixels {
                regions.push(region);
            }
        }
    }

    regions.sort_by_key(|r| (r.min_row, r.min_col));
    regions
}

/// Circular cursor over an ordered region list. `None` is the unselected
/// home position; navigation with an empty list is a no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionCursor {
    selected: Option<usize>,
}

impl RegionCursor {
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    pub fn next(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        self.selected = Some(match self.selected {
            None => 0,
            Some(i) => (i + 1) % len,
        });
    }

    pub fn prev(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        self.selected = Some(match self.selected {
            None | Some(0) => len - 1,
            Some(i) => i - 1,
        });
    }
}
