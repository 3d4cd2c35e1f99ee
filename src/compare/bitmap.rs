use thiserror::Error;

/// Number of channels per pixel (RGBA).
pub const CHANNELS: usize = 4;

/// Fully transparent pixel, used for padded area and out-of-range reads.
pub const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to decode PNG: {0}")]
    Png(#[from] image::ImageError),
    #[error("decoded image has zero width or height")]
    EmptyImage,
    #[error("pixel buffer length {actual} does not match {expected} for {width}x{height}")]
    BufferLength {
        expected: usize,
        actual: usize,
        width: u32,
        height: u32,
    },
}

/// Decoded RGBA pixel grid. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<u8>, // row-major, CHANNELS bytes per pixel
}

impl Bitmap {
    /// Decode PNG bytes into an RGBA bitmap.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let decoded = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::EmptyImage);
        }
        Ok(Self {
            width,
            height,
            data: rgba.into_raw(),
        })
    }

    /// Build a bitmap from a raw RGBA buffer (length must be width * height * 4).
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 {
            return Err(DecodeError::EmptyImage);
        }
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(DecodeError::BufferLength {
                expected,
                actual: data.len(),
                width,
                height,
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Read one pixel. Out-of-range coordinates read as fully transparent.
    #[inline]
    pub fn pixel(&self, row: u32, col: u32) -> [u8; 4] {
        if row >= self.height || col >= self.width {
            return TRANSPARENT;
        }
        let idx = (row as usize * self.width as usize + col as usize) * CHANNELS;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }

    /// One row of pixels as a raw byte slice.
    #[inline]
    pub fn row(&self, row: u32) -> &[u8] {
        let stride = self.width as usize * CHANNELS;
        let start = row as usize * stride;
        &self.data[start..start + stride]
    }

    /// Copy this bitmap onto a larger transparent canvas. Padding never
    /// fails: target dimensions smaller than the bitmap are clamped up.
    pub fn pad_to(&self, width: u32, height: u32) -> Bitmap {
        let width = width.max(self.width);
        let height = height.max(self.height);
        if width == self.width && height == self.height {
            return self.clone();
        }

        let mut data = vec![0u8; width as usize * height as usize * CHANNELS];
        let src_stride = self.width as usize * CHANNELS;
        let dst_stride = width as usize * CHANNELS;
        for row in 0..self.height as usize {
            let src = row * src_stride;
            let dst = row * dst_stride;
            data[dst..dst + src_stride].copy_from_slice(&self.data[src..src + src_stride]);
        }

        Bitmap {
            width,
            height,
            data,
        }
    }
}

/// Union bounding box of two bitmaps.
pub fn union_dimensions(a: &Bitmap, b: &Bitmap) -> (u32, u32) {
    (a.width.max(b.width), a.height.max(b.height))
}
