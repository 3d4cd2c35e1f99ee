use crate::compare::{Bitmap, CHANNELS, TRANSPARENT};

/// Software RGBA drawing surface the mode renderers target. Supports the
/// operations the comparison needs: blitting bitmaps, filled and stroked
/// rectangles, and pixel readback for the loupe and the terminal painter.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * CHANNELS],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear(&mut self, color: [u8; 4]) {
        for px in self.data.chunks_exact_mut(CHANNELS) {
            px.copy_from_slice(&color);
        }
    }

    /// Read one pixel. Out-of-range coordinates read as transparent.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return TRANSPARENT;
        }
        let idx = (y as usize * self.width as usize + x as usize) * CHANNELS;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }

    /// Write one pixel. Out-of-range writes are dropped.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * CHANNELS;
        self.data[idx..idx + CHANNELS].copy_from_slice(&color);
    }

    /// Fill a rectangle, clipped to the canvas.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: [u8; 4]) {
        let x_end = x.saturating_add(width).min(self.width);
        let y_end = y.saturating_add(height).min(self.height);
        for py in y.min(self.height)..y_end {
            for px in x.min(self.width)..x_end {
                self.set_pixel(px, py, color);
            }
        }
    }

    /// One-pixel rectangle outline, clipped to the canvas. Coordinates may
    /// start off-canvas (negative) when the box is partly scrolled out.
    pub fn stroke_rect(&mut self, x: i64, y: i64, width: u32, height: u32, color: [u8; 4]) {
        if width == 0 || height == 0 {
            return;
        }
        let right = x + width as i64 - 1;
        let bottom = y + height as i64 - 1;
        for px in x..=right {
            self.set_pixel_signed(px, y, color);
            self.set_pixel_signed(px, bottom, color);
        }
        for py in y..=bottom {
            self.set_pixel_signed(x, py, color);
            self.set_pixel_signed(right, py, color);
        }
    }

    #[inline]
    fn set_pixel_signed(&mut self, x: i64, y: i64, color: [u8; 4]) {
        if x < 0 || y < 0 {
            return;
        }
        self.set_pixel(x as u32, y as u32, color);
    }

    /// Copy a rectangle of bitmap pixels onto the canvas. Source rows/cols
    /// outside the bitmap read as transparent, so callers can blit padded
    /// viewports without pre-clipping.
    pub fn blit(
        &mut self,
        bitmap: &Bitmap,
        src_row: u32,
        src_col: u32,
        dst_x: u32,
        dst_y: u32,
        width: u32,
        height: u32,
    ) {
        for dy in 0..height {
            for dx in 0..width {
                let px = bitmap.pixel(src_row + dy, src_col + dx);
                self.set_pixel(dst_x + dx, dst_y + dy, px);
            }
        }
    }
}
