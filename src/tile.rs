// tile.rs — Tile locator: raster position → tile index and local offset.
//
// The frame is cut into `cols × rows` tiles of nominal size
// ceil(width / cols) × ceil(height / rows). When the frame does not divide
// evenly the last column/row is narrower; those tiles are still valid, they
// just have fewer pixels (and a smaller expected pixel count).
//
//   width = 10, cols = 4  →  nominal 3
//
//   x:      0 1 2 | 3 4 5 | 6 7 8 | 9
//   tile:   0     | 1     | 2     | 3 (1 px wide)
//
// Everything here is a pure function of the grid; no state is kept.

/// Result of locating one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCoord {
    /// `row * cols + col`.
    pub index: usize,
    pub col: usize,
    pub row: usize,
    /// Offset inside the tile.
    pub local_x: usize,
    pub local_y: usize,
}

/// Fixed partition of a frame into tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileGrid {
    width: usize,
    height: usize,
    cols: usize,
    rows: usize,
    tile_w: usize,
    tile_h: usize,
}

impl TileGrid {
    /// Grid for a `width × height` frame. Geometry is assumed validated
    /// (see `ClaheConfig::validate`).
    pub fn new(width: usize, height: usize, cols: usize, rows: usize) -> Self {
        TileGrid {
            width,
            height,
            cols,
            rows,
            tile_w: width.div_ceil(cols),
            tile_h: height.div_ceil(rows),
        }
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn tile_count(&self) -> usize {
        self.cols * self.rows
    }

    /// Nominal (interior) tile size.
    pub fn nominal_tile_size(&self) -> (usize, usize) {
        (self.tile_w, self.tile_h)
    }

    /// Locate the sample at `(x, y)`.
    #[inline]
    pub fn locate(&self, x: usize, y: usize) -> TileCoord {
        debug_assert!(x < self.width && y < self.height);
        let col = x / self.tile_w;
        let row = y / self.tile_h;
        TileCoord {
            index: row * self.cols + col,
            col,
            row,
            local_x: x - col * self.tile_w,
            local_y: y - row * self.tile_h,
        }
    }

    /// Width of tile column `col`.
    #[inline]
    pub fn col_width(&self, col: usize) -> usize {
        span_len(col, self.tile_w, self.width)
    }

    /// Height of tile row `row`.
    #[inline]
    pub fn row_height(&self, row: usize) -> usize {
        span_len(row, self.tile_h, self.height)
    }

    /// First pixel column of tile column `col`.
    #[inline]
    pub fn col_start(&self, col: usize) -> usize {
        col * self.tile_w
    }

    /// First pixel row of tile row `row`.
    #[inline]
    pub fn row_start(&self, row: usize) -> usize {
        row * self.tile_h
    }

    /// Pixel column of the center of tile column `col`.
    #[inline]
    pub fn center_x(&self, col: usize) -> usize {
        self.col_start(col) + self.col_width(col) / 2
    }

    /// Pixel row of the center of tile row `row`.
    #[inline]
    pub fn center_y(&self, row: usize) -> usize {
        self.row_start(row) + self.row_height(row) / 2
    }

    /// Pixels the tile collects per frame.
    pub fn tile_pixel_count(&self, index: usize) -> u32 {
        let col = index % self.cols;
        let row = index / self.cols;
        (self.col_width(col) * self.row_height(row)) as u32
    }
}

#[inline]
fn span_len(i: usize, nominal: usize, total: usize) -> usize {
    let start = i * nominal;
    nominal.min(total.saturating_sub(start))
}
