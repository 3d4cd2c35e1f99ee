use super::{Canvas, ComparisonState, Side, ViewMode, Viewport};
use crate::compare::{Bitmap, Comparison};

// Render palette
const BACKGROUND: [u8; 4] = [16, 16, 20, 255];
const DIVIDER: [u8; 4] = [90, 90, 100, 255];
const DIFF_TINT: [u8; 4] = [255, 40, 40, 255];
const REGION_OUTLINE: [u8; 4] = [255, 220, 0, 255];
const PLACEHOLDER_CROSS: [u8; 4] = [70, 70, 80, 255];

/// How far mask-positive pixels are pulled toward the tint color.
const TINT_STRENGTH: f32 = 0.55;

/// Mapping between one pane's canvas rectangle and image space. The loupe
/// inverse-transforms pointer positions through this.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaneTransform {
    pub side: Side,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub image_width: u32,
    pub image_height: u32,
    pub scale: f32,
    pub pan_row: f32,
    pub pan_col: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl PaneTransform {
    fn new(
        side: Side,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
        viewport: &Viewport,
    ) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        // Fit to pane width, never upscale; tall images scroll vertically.
        let scale = (width as f32 / image_width as f32).min(1.0);
        let drawn_width = image_width as f32 * scale;
        let drawn_height = image_height as f32 * scale;

        let visible_rows = height as f32 / scale;
        let max_pan_row = (image_height as f32 - visible_rows).max(0.0);
        let pan_row = viewport.pan_row.clamp(0.0, max_pan_row);

        let visible_cols = width as f32 / scale;
        let max_pan_col = (image_width as f32 - visible_cols).max(0.0);
        let pan_col = viewport.pan_col.clamp(0.0, max_pan_col);

        let offset_x = ((width as f32 - drawn_width) / 2.0).max(0.0);
        let offset_y = ((height as f32 - drawn_height) / 2.0).max(0.0);

        Self {
            side,
            x,
            y,
            width,
            height,
            image_width,
            image_height,
            scale,
            pan_row,
            pan_col,
            offset_x,
            offset_y,
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    /// Canvas position to fractional image (row, col).
    pub fn to_image(&self, x: u32, y: u32) -> (f32, f32) {
        let col = (x as f32 - self.x as f32 - self.offset_x) / self.scale + self.pan_col;
        let row = (y as f32 - self.y as f32 - self.offset_y) / self.scale + self.pan_row;
        (row, col)
    }

    /// Canvas position to an image coordinate clamped into bounds, for
    /// cursor positions near the pane edges.
    pub fn to_image_clamped(&self, x: u32, y: u32) -> (u32, u32) {
        let (row, col) = self.to_image(x, y);
        let row = (row.floor().max(0.0) as u32).min(self.image_height.saturating_sub(1));
        let col = (col.floor().max(0.0) as u32).min(self.image_width.saturating_sub(1));
        (row, col)
    }

    /// Image (row, col) to fractional canvas position.
    pub fn to_canvas(&self, row: f32, col: f32) -> (f32, f32) {
        let x = self.x as f32 + self.offset_x + (col - self.pan_col) * self.scale;
        let y = self.y as f32 + self.offset_y + (row - self.pan_row) * self.scale;
        (x, y)
    }

    /// Image rows that fit in the pane at the current scale.
    pub fn visible_rows(&self) -> f32 {
        self.height as f32 / self.scale
    }

    /// Scroll limits (rows, cols) for this pane's image.
    pub fn max_pan(&self) -> (f32, f32) {
        let rows = (self.image_height as f32 - self.visible_rows()).max(0.0);
        let cols = (self.image_width as f32 - self.width as f32 / self.scale).max(0.0);
        (rows, cols)
    }
}

/// Geometry of the last rendered frame, for pointer hit tests and scrolling.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderLayout {
    pub panes: Vec<PaneTransform>,
    /// Canvas column of the swipe divider, when the swipe mode is active.
    pub swipe_divider_x: Option<u32>,
}

impl RenderLayout {
    pub fn empty() -> Self {
        Self {
            panes: Vec::new(),
            swipe_divider_x: None,
        }
    }

    /// Pane under a canvas position. In swipe mode both panes share the
    /// geometry; the divider decides which side the cursor is over.
    pub fn pane_at(&self, x: u32, y: u32) -> Option<&PaneTransform> {
        if let Some(divider) = self.swipe_divider_x {
            return self
                .panes
                .iter()
                .find(|p| p.contains(x, y) && (x < divider) == (p.side == Side::Base));
        }
        self.panes.iter().find(|p| p.contains(x, y))
    }

    pub fn primary(&self) -> Option<&PaneTransform> {
        self.panes.first()
    }

    /// Scroll limits of the primary pane; (0, 0) when nothing is rendered.
    pub fn max_pan(&self) -> (f32, f32) {
        self.primary().map_or((0.0, 0.0), PaneTransform::max_pan)
    }
}

/// Render the comparison in the active mode and report the frame geometry.
/// Pure with respect to the state: rendering never mutates it.
pub fn render_comparison(
    canvas: &mut Canvas,
    comparison: &Comparison,
    state: &ComparisonState,
) -> RenderLayout {
    canvas.clear(BACKGROUND);
    match state.mode {
        ViewMode::SideBySide => render_side_by_side(canvas, comparison, state),
        ViewMode::Crossfade { opacity } => render_crossfade(canvas, comparison, state, opacity),
        ViewMode::Swipe { split } => render_swipe(canvas, comparison, state, split),
        ViewMode::DiffOverlay => render_overlay(canvas, comparison, state),
    }
}

fn render_side_by_side(
    canvas: &mut Canvas,
    comparison: &Comparison,
    state: &ComparisonState,
) -> RenderLayout {
    let width = canvas.width();
    let height = canvas.height();
    let left_width = width.saturating_sub(1) / 2;
    let right_x = left_width + 1;
    let right_width = width.saturating_sub(right_x);

    // Both panes share the viewport so scrolling stays synchronized
    let left = PaneTransform::new(
        Side::Base,
        0,
        0,
        left_width,
        height,
        comparison.width(),
        comparison.height(),
        &state.viewport,
    );
    let right = PaneTransform::new(
        Side::Current,
        right_x,
        0,
        right_width,
        height,
        comparison.width(),
        comparison.height(),
        &state.viewport,
    );

    draw_pane(canvas, &comparison.base, &left);
    draw_pane(canvas, &comparison.current, &right);
    for y in 0..height {
        canvas.set_pixel(left_width, y, DIVIDER);
    }

    RenderLayout {
        panes: vec![left, right],
        swipe_divider_x: None,
    }
}

fn render_crossfade(
    canvas: &mut Canvas,
    comparison: &Comparison,
    state: &ComparisonState,
    opacity: f32,
) -> RenderLayout {
    let pane = full_pane(canvas, comparison, state, Side::Current);
    each_pane_pixel(canvas, &pane, |row, col| {
        let base = comparison.base.pixel(row, col);
        let current = comparison.current.pixel(row, col);
        lerp(base, current, opacity)
    });
    RenderLayout {
        panes: vec![pane],
        swipe_divider_x: None,
    }
}

fn render_swipe(
    canvas: &mut Canvas,
    comparison: &Comparison,
    state: &ComparisonState,
    split: f32,
) -> RenderLayout {
    let base_pane = full_pane(canvas, comparison, state, Side::Base);
    let mut current_pane = base_pane;
    current_pane.side = Side::Current;

    let divider_x = (canvas.width() as f32 * split.clamp(0.0, 1.0)) as u32;
    let pane = base_pane;
    for y in pane.y..pane.y + pane.height {
        for x in pane.x..pane.x + pane.width {
            let (row_f, col_f) = pane.to_image(x, y);
            if let Some((row, col)) = in_image(&pane, row_f, col_f) {
                let bitmap = if x < divider_x {
                    &comparison.base
                } else {
                    &comparison.current
                };
                canvas.set_pixel(x, y, bitmap.pixel(row, col));
            }
        }
    }
    for y in 0..canvas.height() {
        canvas.set_pixel(divider_x, y, DIVIDER);
    }

    RenderLayout {
        panes: vec![base_pane, current_pane],
        swipe_divider_x: Some(divider_x),
    }
}

fn render_overlay(
    canvas: &mut Canvas,
    comparison: &Comparison,
    state: &ComparisonState,
) -> RenderLayout {
    let pane = full_pane(canvas, comparison, state, Side::Current);
    each_pane_pixel(canvas, &pane, |row, col| {
        let px = comparison.current.pixel(row, col);
        if comparison.mask.differs(row, col) {
            lerp(px, DIFF_TINT, TINT_STRENGTH)
        } else {
            px
        }
    });

    // Emphasis outline around the selected region
    if let Some(region) = state.cursor.selected().and_then(|i| comparison.region(i)) {
        let (x0, y0) = pane.to_canvas(region.min_row as f32, region.min_col as f32);
        let width = (region.width() as f32 * pane.scale).round().max(1.0) as u32;
        let height = (region.height() as f32 * pane.scale).round().max(1.0) as u32;
        canvas.stroke_rect(
            x0.round() as i64,
            y0.round() as i64,
            width,
            height,
            REGION_OUTLINE,
        );
    }

    RenderLayout {
        panes: vec![pane],
        swipe_divider_x: None,
    }
}

/// Fallback when only one side decoded: render it alone, full width.
pub fn render_single(
    canvas: &mut Canvas,
    bitmap: &Bitmap,
    side: Side,
    state: &ComparisonState,
) -> RenderLayout {
    canvas.clear(BACKGROUND);
    let pane = PaneTransform::new(
        side,
        0,
        0,
        canvas.width(),
        canvas.height(),
        bitmap.width(),
        bitmap.height(),
        &state.viewport,
    );
    draw_pane(canvas, bitmap, &pane);
    RenderLayout {
        panes: vec![pane],
        swipe_divider_x: None,
    }
}

/// Fallback when neither side is available: a crossed-out empty frame.
pub fn render_placeholder(canvas: &mut Canvas) -> RenderLayout {
    canvas.clear(BACKGROUND);
    let width = canvas.width();
    let height = canvas.height();
    if width == 0 || height == 0 {
        return RenderLayout::empty();
    }
    for x in 0..width {
        let y = (x as u64 * height.saturating_sub(1) as u64
            / width.saturating_sub(1).max(1) as u64) as u32;
        canvas.set_pixel(x, y, PLACEHOLDER_CROSS);
        canvas.set_pixel(x, height - 1 - y, PLACEHOLDER_CROSS);
    }
    RenderLayout::empty()
}

fn full_pane(
    canvas: &Canvas,
    comparison: &Comparison,
    state: &ComparisonState,
    side: Side,
) -> PaneTransform {
    PaneTransform::new(
        side,
        0,
        0,
        canvas.width(),
        canvas.height(),
        comparison.width(),
        comparison.height(),
        &state.viewport,
    )
}

fn draw_pane(canvas: &mut Canvas, bitmap: &Bitmap, pane: &PaneTransform) {
    each_pane_pixel(canvas, pane, |row, col| bitmap.pixel(row, col));
}

/// Walk every canvas pixel of a pane, sampling image space through the
/// pane's transform. Positions outside the image keep the backdrop.
fn each_pane_pixel(
    canvas: &mut Canvas,
    pane: &PaneTransform,
    mut color_at: impl FnMut(u32, u32) -> [u8; 4],
) {
    for y in pane.y..pane.y + pane.height {
        for x in pane.x..pane.x + pane.width {
            let (row_f, col_f) = pane.to_image(x, y);
            if let Some((row, col)) = in_image(pane, row_f, col_f) {
                canvas.set_pixel(x, y, color_at(row, col));
            }
        }
    }
}

#[inline]
fn in_image(pane: &PaneTransform, row: f32, col: f32) -> Option<(u32, u32)> {
    if row < 0.0 || col < 0.0 {
        return None;
    }
    let (row, col) = (row.floor() as u32, col.floor() as u32);
    if row >= pane.image_height || col >= pane.image_width {
        return None;
    }
    Some((row, col))
}

/// Linear interpolation from `a` (t = 0) to `b` (t = 1) per channel.
#[inline]
fn lerp(a: [u8; 4], b: [u8; 4], t: f32) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    let mut out = [0u8; 4];
    for ch in 0..4 {
        out[ch] = (a[ch] as f32 + (b[ch] as f32 - a[ch] as f32) * t).round() as u8;
    }
    out
}
