//! Deterministic grid generators.

/// Bit-exact copy of the decoder's no-data sentinel (f32::MIN).
pub const NO_DATA_BITS: u32 = 0xff7f_ffff;

/// The no-data sentinel.
pub const NO_DATA: f32 = f32::MIN;

/// A grid with predictable, distinct values: `grid[row][col] == col * 1000
/// + row`. Distinct values keep LZW from compressing data tiles smaller
/// than uniform no-data tiles.
pub fn gradient_grid(width: usize, height: usize) -> Vec<f32> {
    let mut grid = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            grid.push((col * 1000 + row) as f32);
        }
    }
    grid
}

/// Overwrite a rectangular region of a row-major grid with the no-data
/// sentinel.
pub fn set_region_no_data(
    grid: &mut [f32],
    grid_width: usize,
    x0: usize,
    y0: usize,
    width: usize,
    height: usize,
) {
    for row in y0..y0 + height {
        for col in x0..x0 + width {
            grid[row * grid_width + col] = NO_DATA;
        }
    }
}

/// A small deterministic generator for test coordinates, so equivalence
/// tests are reproducible without a random-number dependency.
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_mul(2862933555777941757).wrapping_add(3037000493),
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state >> 16
    }

    /// A value in `0..bound`.
    pub fn next_in_range(&mut self, bound: u64) -> u64 {
        self.next_u64() % bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_data_matches_sentinel_bits() {
        assert_eq!(NO_DATA.to_bits(), NO_DATA_BITS);
    }

    #[test]
    fn gradient_grid_is_predictable() {
        let grid = gradient_grid(10, 5);
        assert_eq!(grid.len(), 50);
        assert_eq!(grid[0], 0.0);
        assert_eq!(grid[1], 1000.0);
        assert_eq!(grid[10], 1.0);
    }

    #[test]
    fn lcg_is_deterministic() {
        let mut a = Lcg::new(0);
        let mut b = Lcg::new(0);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }
}
