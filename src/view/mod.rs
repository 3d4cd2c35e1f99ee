//! Comparison view controller: the closed set of rendering modes, the
//! per-file interaction state, and the pure transitions driven by input
//! events.

mod canvas;
mod loupe;
mod render;

pub use canvas::Canvas;
pub use loupe::{Loupe, LoupeSample, DEFAULT_LOUPE_ZOOM, MAX_LOUPE_ZOOM, MIN_LOUPE_ZOOM};
pub use render::{render_comparison, render_placeholder, render_single, PaneTransform, RenderLayout};

use crate::compare::RegionCursor;
use serde::{Deserialize, Serialize};

/// Crossfade opacity a freshly selected crossfade mode starts at.
pub const DEFAULT_CROSSFADE_OPACITY: f32 = 0.5;
/// Split fraction a freshly selected swipe mode starts at.
pub const DEFAULT_SWIPE_SPLIT: f32 = 0.5;

/// Which side of the pair a pixel or pane belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Base,
    Current,
}

impl Side {
    pub fn label(&self) -> &'static str {
        match self {
            Side::Base => "base",
            Side::Current => "current",
        }
    }
}

/// The four comparison modes. Each variant carries only the parameters it
/// needs; switching modes resets the incoming variant's parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ViewMode {
    SideBySide,
    Crossfade { opacity: f32 },
    Swipe { split: f32 },
    DiffOverlay,
}

impl Default for ViewMode {
    fn default() -> Self {
        ViewMode::SideBySide
    }
}

impl ViewMode {
    /// Mode for a digit key, with that mode's default parameters.
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            1 => Some(ViewMode::SideBySide),
            2 => Some(ViewMode::Crossfade {
                opacity: DEFAULT_CROSSFADE_OPACITY,
            }),
            3 => Some(ViewMode::Swipe {
                split: DEFAULT_SWIPE_SPLIT,
            }),
            4 => Some(ViewMode::DiffOverlay),
            _ => None,
        }
    }

    pub fn digit(&self) -> u8 {
        match self {
            ViewMode::SideBySide => 1,
            ViewMode::Crossfade { .. } => 2,
            ViewMode::Swipe { .. } => 3,
            ViewMode::DiffOverlay => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ViewMode::SideBySide => "side-by-side",
            ViewMode::Crossfade { .. } => "crossfade",
            ViewMode::Swipe { .. } => "swipe",
            ViewMode::DiffOverlay => "diff overlay",
        }
    }
}

/// Image-space scroll position of the view. The render layer clamps panning
/// against the visible pane each frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Viewport {
    pub pan_row: f32,
    pub pan_col: f32,
}

impl Viewport {
    pub fn reset(&mut self) {
        *self = Viewport::default();
    }

    /// Scroll by a delta, clamped to `[0, max]` per axis.
    pub fn scroll_by(&mut self, delta_rows: f32, delta_cols: f32, max: (f32, f32)) {
        self.pan_row = (self.pan_row + delta_rows).clamp(0.0, max.0.max(0.0));
        self.pan_col = (self.pan_col + delta_cols).clamp(0.0, max.1.max(0.0));
    }

    /// Center the given image row in the visible span, clamped.
    pub fn center_on_row(&mut self, row: f32, visible_rows: f32, max_pan_row: f32) {
        self.pan_row = (row - visible_rows / 2.0).clamp(0.0, max_pan_row.max(0.0));
    }
}

/// Loupe parameters: neighborhood radius and the live cursor position on
/// the canvas. `cursor: None` means hidden (modifier not held).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoupeState {
    pub zoom: u32,
    pub cursor: Option<(u16, u16)>,
}

impl Default for LoupeState {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_LOUPE_ZOOM,
            cursor: None,
        }
    }
}

/// Per-file interaction state. Single writer: the controller transitions
/// below, each driven by one discrete input event. Reset to defaults when
/// the active file changes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ComparisonState {
    pub mode: ViewMode,
    pub cursor: RegionCursor,
    pub viewport: Viewport,
    pub loupe: LoupeState,
}

impl ComparisonState {
    pub fn new() -> Self {
        Self::default()
    }

    /// File navigation resets everything to defaults for the new file.
    pub fn reset_for_file(&mut self) {
        *self = Self::default();
    }

    /// Digit-key mode selection. Preserves the file and region selection;
    /// the incoming mode's transient parameter starts at its default.
    pub fn select_mode(&mut self, digit: u8) -> bool {
        match ViewMode::from_digit(digit) {
            Some(mode) => {
                self.mode = mode;
                true
            }
            None => false,
        }
    }

    pub fn next_region(&mut self, region_count: usize) {
        self.cursor.next(region_count);
    }

    pub fn prev_region(&mut self, region_count: usize) {
        self.cursor.prev(region_count);
    }

    /// Nudge the active mode's continuous parameter, clamped to [0, 1].
    /// No-op for modes without one.
    pub fn adjust_param(&mut self, delta: f32) {
        match &mut self.mode {
            ViewMode::Crossfade { opacity } => *opacity = (*opacity + delta).clamp(0.0, 1.0),
            ViewMode::Swipe { split } => *split = (*split + delta).clamp(0.0, 1.0),
            ViewMode::SideBySide | ViewMode::DiffOverlay => {}
        }
    }

    /// Set the active mode's continuous parameter absolutely (pointer drag).
    pub fn set_param(&mut self, value: f32) {
        match &mut self.mode {
            ViewMode::Crossfade { opacity } => *opacity = value.clamp(0.0, 1.0),
            ViewMode::Swipe { split } => *split = value.clamp(0.0, 1.0),
            ViewMode::SideBySide | ViewMode::DiffOverlay => {}
        }
    }

    pub fn loupe_zoom_in(&mut self) {
        self.loupe.zoom = (self.loupe.zoom + 1).min(MAX_LOUPE_ZOOM);
    }

    pub fn loupe_zoom_out(&mut self) {
        self.loupe.zoom = self.loupe.zoom.saturating_sub(1).max(MIN_LOUPE_ZOOM);
    }

    /// Pointer moved with the loupe modifier held (Some) or released (None).
    pub fn set_loupe_cursor(&mut self, cursor: Option<(u16, u16)>) {
        self.loupe.cursor = cursor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_map_onto_the_four_modes() {
        assert_eq!(ViewMode::from_digit(1), Some(ViewMode::SideBySide));
        assert_eq!(
            ViewMode::from_digit(2),
            Some(ViewMode::Crossfade { opacity: 0.5 })
        );
        assert_eq!(ViewMode::from_digit(3), Some(ViewMode::Swipe { split: 0.5 }));
        assert_eq!(ViewMode::from_digit(4), Some(ViewMode::DiffOverlay));
        assert_eq!(ViewMode::from_digit(5), None);
        assert_eq!(ViewMode::from_digit(0), None);
    }

    #[test]
    fn mode_switch_resets_the_transient_parameter() {
        let mut state = ComparisonState::new();
        state.select_mode(2);
        state.set_param(0.9);
        assert_eq!(state.mode, ViewMode::Crossfade { opacity: 0.9 });

        // Leave and come back: opacity is at its default again
        state.select_mode(3);
        state.select_mode(2);
        assert_eq!(
            state.mode,
            ViewMode::Crossfade {
                opacity: DEFAULT_CROSSFADE_OPACITY
            }
        );
    }

    #[test]
    fn mode_switch_preserves_region_selection() {
        let mut state = ComparisonState::new();
        state.next_region(3);
        state.next_region(3);
        assert_eq!(state.cursor.selected(), Some(1));
        state.select_mode(4);
        assert_eq!(state.cursor.selected(), Some(1));
    }

    #[test]
    fn file_change_resets_to_defaults() {
        let mut state = ComparisonState::new();
        state.select_mode(3);
        state.set_param(0.8);
        state.next_region(5);
        state.viewport.scroll_by(40.0, 0.0, (100.0, 0.0));
        state.loupe.zoom = 9;

        state.reset_for_file();
        assert_eq!(state, ComparisonState::default());
    }

    #[test]
    fn param_adjustment_clamps_and_ignores_fixed_modes() {
        let mut state = ComparisonState::new();
        state.adjust_param(0.3); // side-by-side has no parameter
        assert_eq!(state.mode, ViewMode::SideBySide);

        state.select_mode(3);
        state.adjust_param(0.7);
        state.adjust_param(0.7);
        assert_eq!(state.mode, ViewMode::Swipe { split: 1.0 });
        state.adjust_param(-3.0);
        assert_eq!(state.mode, ViewMode::Swipe { split: 0.0 });
    }

    #[test]
    fn viewport_scroll_clamps_to_bounds() {
        let mut viewport = Viewport::default();
        viewport.scroll_by(-10.0, -10.0, (50.0, 20.0));
        assert_eq!(viewport, Viewport::default());

        viewport.scroll_by(500.0, 500.0, (50.0, 20.0));
        assert_eq!(viewport.pan_row, 50.0);
        assert_eq!(viewport.pan_col, 20.0);

        viewport.center_on_row(10.0, 30.0, 50.0);
        assert_eq!(viewport.pan_row, 0.0);
        viewport.center_on_row(45.0, 30.0, 50.0);
        assert_eq!(viewport.pan_row, 30.0);
    }

    #[test]
    fn loupe_zoom_stays_in_bounds() {
        let mut state = ComparisonState::new();
        for _ in 0..50 {
            state.loupe_zoom_in();
        }
        assert_eq!(state.loupe.zoom, MAX_LOUPE_ZOOM);
        for _ in 0..50 {
            state.loupe_zoom_out();
        }
        assert_eq!(state.loupe.zoom, MIN_LOUPE_ZOOM);
    }
}
