use super::{ComparisonState, RenderLayout, Side};
use crate::compare::Comparison;

/// Smallest neighborhood radius the loupe will sample.
pub const MIN_LOUPE_ZOOM: u32 = 2;
/// Largest neighborhood radius the loupe will sample.
pub const MAX_LOUPE_ZOOM: u32 = 16;
/// Radius a fresh loupe starts at.
pub const DEFAULT_LOUPE_ZOOM: u32 = 4;

/// One magnified readout: the image coordinate under the cursor plus
/// square neighborhoods of base, current, and mask values around it,
/// row-major with side length `2 * radius + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct LoupeSample {
    pub row: u32,
    pub col: u32,
    pub side: Side,
    pub radius: u32,
    pub base: Vec<[u8; 4]>,
    pub current: Vec<[u8; 4]>,
    pub mask: Vec<u8>,
}

impl LoupeSample {
    pub fn size(&self) -> u32 {
        2 * self.radius + 1
    }

    fn center_index(&self) -> usize {
        let size = self.size() as usize;
        (size * size) / 2
    }

    pub fn center_base(&self) -> [u8; 4] {
        self.base[self.center_index()]
    }

    pub fn center_current(&self) -> [u8; 4] {
        self.current[self.center_index()]
    }

    pub fn center_magnitude(&self) -> u8 {
        self.mask[self.center_index()]
    }
}

/// Loupe sampler. Active only while the modifier-held cursor is present in
/// the state; releasing the modifier clears the cursor and hides it.
pub struct Loupe;

impl Loupe {
    /// Sample the neighborhoods under the cursor, inverse-transforming the
    /// canvas position through the rendered frame's geometry. Cursor
    /// positions outside the image clamp to the nearest valid pixel.
    pub fn sample(
        state: &ComparisonState,
        comparison: &Comparison,
        layout: &RenderLayout,
    ) -> Option<LoupeSample> {
        let (x, y) = state.loupe.cursor?;
        let (x, y) = (u32::from(x), u32::from(y));
        // Over chrome or out of every pane: fall back to the primary pane
        // and let the clamp pull the coordinate into bounds.
        let pane = layout.pane_at(x, y).or_else(|| layout.primary())?;
        let (row, col) = pane.to_image_clamped(x, y);

        let radius = state.loupe.zoom;
        let size = (2 * radius + 1) as usize;
        let mut base = Vec::with_capacity(size * size);
        let mut current = Vec::with_capacity(size * size);
        let mut mask = Vec::with_capacity(size * size);

        for dr in -(radius as i64)..=radius as i64 {
            for dc in -(radius as i64)..=radius as i64 {
                let r = row as i64 + dr;
                let c = col as i64 + dc;
                if r < 0 || c < 0 {
                    base.push(crate::compare::TRANSPARENT);
                    current.push(crate::compare::TRANSPARENT);
                    mask.push(0);
                } else {
                    let (r, c) = (r as u32, c as u32);
                    base.push(comparison.base.pixel(r, c));
                    current.push(comparison.current.pixel(r, c));
                    mask.push(comparison.mask.magnitude(r, c));
                }
            }
        }

        Some(LoupeSample {
            row,
            col,
            side: pane.side,
            radius,
            base,
            current,
            mask,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{compare, Bitmap, CompareConfig};
    use crate::view::{render_comparison, Canvas, ComparisonState};

    fn comparison_with_marker() -> Comparison {
        // 6x6 opaque black pair, current has one white pixel at row 2, col 3
        let mut black = vec![0u8; 144];
        for px in black.chunks_exact_mut(4) {
            px[3] = 255;
        }
        let base = Bitmap::from_rgba(6, 6, black.clone()).unwrap();
        let idx = (2 * 6 + 3) * 4;
        black[idx..idx + 4].copy_from_slice(&[255, 255, 255, 255]);
        let current = Bitmap::from_rgba(6, 6, black).unwrap();
        compare(
            &base,
            &current,
            &CompareConfig {
                threshold: 0,
                min_region_pixels: 1,
            },
        )
    }

    fn state_with_cursor(x: u16, y: u16, zoom: u32) -> ComparisonState {
        let mut state = ComparisonState::new();
        state.select_mode(4);
        state.loupe.zoom = zoom;
        state.set_loupe_cursor(Some((x, y)));
        state
    }

    #[test]
    fn hidden_without_a_cursor() {
        let comparison = comparison_with_marker();
        let mut state = ComparisonState::new();
        state.select_mode(4);
        let mut canvas = Canvas::new(6, 6);
        let layout = render_comparison(&mut canvas, &comparison, &state);
        assert!(Loupe::sample(&state, &comparison, &layout).is_none());
    }

    #[test]
    fn samples_all_three_sources_at_the_cursor() {
        let comparison = comparison_with_marker();
        let state = state_with_cursor(3, 2, MIN_LOUPE_ZOOM);
        let mut canvas = Canvas::new(6, 6);
        let layout = render_comparison(&mut canvas, &comparison, &state);

        let sample = Loupe::sample(&state, &comparison, &layout).unwrap();
        assert_eq!((sample.row, sample.col), (2, 3));
        assert_eq!(sample.size(), 5);
        assert_eq!(sample.center_base(), [0, 0, 0, 255]);
        assert_eq!(sample.center_current(), [255, 255, 255, 255]);
        assert_eq!(sample.center_magnitude(), 255);
    }

    #[test]
    fn cursor_at_the_canvas_edge_clamps_into_the_image() {
        let comparison = comparison_with_marker();
        // Far corner of a canvas larger than the drawn image
        let state = state_with_cursor(49, 49, MIN_LOUPE_ZOOM);
        let mut canvas = Canvas::new(50, 50);
        let layout = render_comparison(&mut canvas, &comparison, &state);

        let sample = Loupe::sample(&state, &comparison, &layout).unwrap();
        assert_eq!((sample.row, sample.col), (5, 5));
    }

    #[test]
    fn neighborhood_beyond_the_image_reads_transparent() {
        let comparison = comparison_with_marker();
        let state = state_with_cursor(0, 0, MIN_LOUPE_ZOOM);
        let mut canvas = Canvas::new(6, 6);
        let layout = render_comparison(&mut canvas, &comparison, &state);

        let sample = Loupe::sample(&state, &comparison, &layout).unwrap();
        assert_eq!((sample.row, sample.col), (0, 0));
        // Top-left corner of the grid is outside the image on both axes
        assert_eq!(sample.base[0], crate::compare::TRANSPARENT);
        assert_eq!(sample.mask[0], 0);
    }

    #[test]
    fn pan_shifts_the_inverse_transform() {
        let comparison = comparison_with_marker();
        let mut state = state_with_cursor(0, 0, MIN_LOUPE_ZOOM);
        // Scroll two rows down in a viewport shorter than the image
        state.viewport.scroll_by(2.0, 0.0, (10.0, 0.0));
        let mut canvas = Canvas::new(6, 3);
        let layout = render_comparison(&mut canvas, &comparison, &state);

        let sample = Loupe::sample(&state, &comparison, &layout).unwrap();
        assert_eq!(sample.row, 2, "cursor row 0 lands on image row pan_row");
    }

    #[test]
    fn swipe_divider_decides_the_reported_side() {
        let comparison = comparison_with_marker();
        let mut state = state_with_cursor(1, 1, MIN_LOUPE_ZOOM);
        state.select_mode(3);
        state.set_loupe_cursor(Some((1, 1)));
        let mut canvas = Canvas::new(6, 6);
        let layout = render_comparison(&mut canvas, &comparison, &state);

        let left = Loupe::sample(&state, &comparison, &layout).unwrap();
        assert_eq!(left.side, Side::Base);

        state.set_loupe_cursor(Some((5, 1)));
        let right = Loupe::sample(&state, &comparison, &layout).unwrap();
        assert_eq!(right.side, Side::Current);
    }
}
