// image.rs — Owned 8-bit planes for the frame-level driver.
//
// The streaming core never sees whole images: it consumes one sample per
// tick. Images only exist at the edges, where the raster driver scans a
// frame into a sample stream and reassembles the output.
//
// Layout is row-major and contiguous (stride == width). A frame with
// chroma is three planes of equal size (4:4:4); chroma rides alongside the
// luma sample unchanged.

use std::fmt;

// ---------------------------------------------------------------------------
// Image
// ---------------------------------------------------------------------------

/// A single 8-bit plane with runtime dimensions.
#[derive(Clone, PartialEq, Eq)]
pub struct Image {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl Image {
    /// Zero-filled plane.
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0)
    }

    /// Plane with every pixel set to `value`.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Image {
            data: vec![value; width * height],
            width,
            height,
        }
    }

    /// Wrap an existing row-major buffer.
    ///
    /// # Panics
    /// Panics if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            width * height,
            "data length ({}) must equal width * height ({})",
            data.len(),
            width * height,
        );
        Image { data, width, height }
    }

    /// Build a plane by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> u8) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Image { data, width, height }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixel at (x, y).
    ///
    /// # Panics
    /// Panics if (x, y) is out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.bounds_check(x, y);
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.bounds_check(x, y);
        self.data[y * self.width + x] = value;
    }

    /// Borrow row `y`.
    #[inline]
    pub fn row(&self, y: usize) -> &[u8] {
        assert!(y < self.height, "row {y} out of bounds (height {})", self.height);
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    /// All pixels in raster order.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Smallest and largest pixel value, or `None` for an empty plane.
    pub fn min_max(&self) -> Option<(u8, u8)> {
        let min = self.data.iter().copied().min()?;
        let max = self.data.iter().copied().max()?;
        Some((min, max))
    }

    /// Mean pixel value.
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&v| v as u64).sum::<u64>() as f64 / self.data.len() as f64
    }

    #[inline]
    fn bounds_check(&self, x: usize, y: usize) {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x},{y}) out of bounds for image {}×{}",
            self.width,
            self.height,
        );
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Image {{ {}×{} }}", self.width, self.height)?;
        for y in 0..self.height.min(8) {
            write!(f, "  row {y}: [")?;
            for x in 0..self.width.min(16) {
                if x > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", self.get(x, y))?;
            }
            if self.width > 16 {
                write!(f, ", ...")?;
            }
            writeln!(f, "]")?;
        }
        if self.height > 8 {
            writeln!(f, "  ...")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// YuvFrame
// ---------------------------------------------------------------------------

/// Luma plus two full-resolution chroma planes.
///
/// Only `y` is equalized. `u` and `v` are delayed with it so all three
/// channels of a pixel leave the pipeline on the same tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YuvFrame {
    pub y: Image,
    pub u: Image,
    pub v: Image,
}

impl YuvFrame {
    /// Luma-only frame with neutral (128) chroma.
    pub fn from_luma(y: Image) -> Self {
        let (w, h) = (y.width(), y.height());
        YuvFrame {
            y,
            u: Image::filled(w, h, 128),
            v: Image::filled(w, h, 128),
        }
    }

    /// # Panics
    /// Panics if the planes differ in size.
    pub fn new(y: Image, u: Image, v: Image) -> Self {
        assert!(
            y.width() == u.width() && y.width() == v.width()
                && y.height() == u.height() && y.height() == v.height(),
            "YUV planes must share dimensions",
        );
        YuvFrame { y, u, v }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.y.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.y.height()
    }
}
