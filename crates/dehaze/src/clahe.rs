//! Contrast Limited Adaptive Histogram Equalization on an 8-bit plane

const BINS: usize = 256;

/// Tile-based CLAHE with a fixed grid and clip limit
#[derive(Debug, Clone, Copy)]
pub struct Clahe {
    clip_limit: f32,
    grid: u32,
}

impl Clahe {
    /// `clip_limit` is relative to a uniform histogram (tile area / 256);
    /// values <= 0 disable clipping.
    pub fn new(clip_limit: f32, grid: u32) -> Self {
        Self {
            clip_limit,
            grid: grid.max(1),
        }
    }

    /// Equalise `plane` (row-major, `width * height` bytes)
    pub fn apply(&self, plane: &[u8], width: u32, height: u32) -> Vec<u8> {
        if width == 0 || height == 0 {
            return plane.to_vec();
        }

        let grid_x = self.grid.min(width) as usize;
        let grid_y = self.grid.min(height) as usize;
        let width = width as usize;
        let height = height as usize;

        let x_bounds = tile_bounds(width, grid_x);
        let y_bounds = tile_bounds(height, grid_y);

        let mut luts = Vec::with_capacity(grid_x * grid_y);
        for &(y0, y1) in &y_bounds {
            for &(x0, x1) in &x_bounds {
                luts.push(self.tile_lut(plane, width, (x0, x1), (y0, y1)));
            }
        }

        // Column interpolation weights are shared by every row.
        let columns: Vec<(usize, usize, f32)> = (0..width)
            .map(|x| neighbours(x, width, grid_x))
            .collect();

        let mut out = vec![0u8; width * height];
        for y in 0..height {
            let (ty1, ty2, wy) = neighbours(y, height, grid_y);
            let row = y * width;
            for (x, &(tx1, tx2, wx)) in columns.iter().enumerate() {
                let v = plane[row + x] as usize;
                let top = luts[ty1 * grid_x + tx1][v] as f32 * (1.0 - wx)
                    + luts[ty1 * grid_x + tx2][v] as f32 * wx;
                let bottom = luts[ty2 * grid_x + tx1][v] as f32 * (1.0 - wx)
                    + luts[ty2 * grid_x + tx2][v] as f32 * wx;
                let value = top * (1.0 - wy) + bottom * wy;
                out[row + x] = value.round().clamp(0.0, 255.0) as u8;
            }
        }

        out
    }

    fn tile_lut(
        &self,
        plane: &[u8],
        stride: usize,
        (x0, x1): (usize, usize),
        (y0, y1): (usize, usize),
    ) -> [u8; BINS] {
        let mut hist = [0u32; BINS];
        for y in y0..y1 {
            for &v in &plane[y * stride + x0..y * stride + x1] {
                hist[v as usize] += 1;
            }
        }

        let area = ((x1 - x0) * (y1 - y0)) as u32;
        if self.clip_limit > 0.0 {
            let limit = ((self.clip_limit * area as f32 / BINS as f32) as u32).max(1);
            clip_histogram(&mut hist, limit);
        }

        let scale = 255.0 / area as f32;
        let mut lut = [0u8; BINS];
        let mut sum = 0u32;
        for (slot, count) in lut.iter_mut().zip(hist.iter()) {
            sum += count;
            *slot = (sum as f32 * scale).round().clamp(0.0, 255.0) as u8;
        }
        lut
    }
}

/// Clip bins at `limit` and spread the excess evenly across the histogram
fn clip_histogram(hist: &mut [u32; BINS], limit: u32) {
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }

    let batch = excess / BINS as u32;
    let residual = (excess % BINS as u32) as usize;
    for bin in hist.iter_mut() {
        *bin += batch;
    }

    if residual > 0 {
        let step = (BINS / residual).max(1);
        for bin in hist.iter_mut().step_by(step).take(residual) {
            *bin += 1;
        }
    }
}

/// Split `len` into `tiles` contiguous, non-empty ranges
fn tile_bounds(len: usize, tiles: usize) -> Vec<(usize, usize)> {
    (0..tiles)
        .map(|t| (t * len / tiles, (t + 1) * len / tiles))
        .collect()
}

/// The two tiles whose centres surround `pos`, and the weight of the second
fn neighbours(pos: usize, len: usize, tiles: usize) -> (usize, usize, f32) {
    let t = (pos as f32 + 0.5) * tiles as f32 / len as f32 - 0.5;
    let first = t.floor();
    let weight = t - first;
    let last = tiles as isize - 1;
    let t1 = (first as isize).clamp(0, last) as usize;
    let t2 = (first as isize + 1).clamp(0, last) as usize;
    (t1, t2, weight)
}
