//! Test data generators for synthetic grids and packed legacy records.
//!
//! These generators create predictable, verifiable patterns that can be
//! checked value by value after a write/read cycle.

/// Creates a test grid with predictable values.
///
/// Each node value is calculated as: `row * 1000 + col`
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(5, 10);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[0], 0.0);     // row=0, col=0
/// assert_eq!(grid[1], 1.0);     // row=0, col=1
/// assert_eq!(grid[10], 1000.0); // row=1, col=0
/// ```
pub fn create_test_grid(rows: usize, cols: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            data.push((row * 1000 + col) as f32);
        }
    }
    data
}

/// Creates a sloping seabed: depths (negative, metres) increasing offshore
/// along the rows with a gentle cross-slope along the columns.
pub fn create_depth_grid(rows: usize, cols: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let depth = -5.0 - row as f32 * 0.5 - col as f32 * 0.05;
            data.push(depth);
        }
    }
    data
}

/// Creates total vertical uncertainty values matching [`create_depth_grid`]:
/// 0.3 m plus 1% of depth.
pub fn create_uncertainty_grid(rows: usize, cols: usize) -> Vec<f32> {
    create_depth_grid(rows, cols)
        .into_iter()
        .map(|d| 0.3 + d.abs() * 0.01)
        .collect()
}

/// Creates a count grid where each node holds `(row + col) % modulus`.
pub fn create_count_grid(rows: usize, cols: usize, modulus: u32) -> Vec<u32> {
    let mut data = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            data.push((row + col) as u32 % modulus.max(1));
        }
    }
    data
}

/// Native-endian bytes of a float slice.
pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

/// Native-endian bytes of an unsigned slice.
pub fn u32_bytes(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

/// Decode native-endian floats.
pub fn bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Decode native-endian unsigned integers.
pub fn bytes_to_u32(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Packs node-group records: `{ hyp_strength: f32, num_hypotheses: u32 }`.
pub fn pack_node_records(strength: &[f32], hypotheses: &[u32]) -> Vec<u8> {
    assert_eq!(strength.len(), hypotheses.len(), "field arrays differ in length");
    let mut out = Vec::with_capacity(strength.len() * 8);
    for (s, n) in strength.iter().zip(hypotheses) {
        out.extend_from_slice(&s.to_ne_bytes());
        out.extend_from_slice(&n.to_ne_bytes());
    }
    out
}

/// Packs elevation-solution records:
/// `{ shoal_elevation: f32, stddev: f32, num_soundings: u32 }`.
pub fn pack_elevation_solution_records(shoal: &[f32], std_dev: &[f32], soundings: &[u32]) -> Vec<u8> {
    assert!(
        shoal.len() == std_dev.len() && std_dev.len() == soundings.len(),
        "field arrays differ in length"
    );
    let mut out = Vec::with_capacity(shoal.len() * 12);
    for ((s, d), n) in shoal.iter().zip(std_dev).zip(soundings) {
        out.extend_from_slice(&s.to_ne_bytes());
        out.extend_from_slice(&d.to_ne_bytes());
        out.extend_from_slice(&n.to_ne_bytes());
    }
    out
}

/// Extract the `rows x cols` sub-grid starting at `(row0, col0)` from a
/// row-major grid that is `grid_cols` wide.
pub fn sub_grid<T: Copy>(
    grid: &[T],
    grid_cols: usize,
    row0: usize,
    col0: usize,
    rows: usize,
    cols: usize,
) -> Vec<T> {
    let mut out = Vec::with_capacity(rows * cols);
    for row in row0..row0 + rows {
        let start = row * grid_cols + col0;
        out.extend_from_slice(&grid[start..start + cols]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_grid() {
        let grid = create_test_grid(3, 4);
        assert_eq!(grid.len(), 12);
        assert_eq!(grid[5], 1001.0); // row 1, col 1
        assert_eq!(grid[11], 2003.0);
    }

    #[test]
    fn test_depth_and_uncertainty() {
        let depths = create_depth_grid(4, 4);
        let unc = create_uncertainty_grid(4, 4);
        assert!(depths.iter().all(|d| *d < 0.0));
        assert!(unc.iter().all(|u| *u > 0.3));
        assert!(depths[15] < depths[0]);
    }

    #[test]
    fn test_byte_helpers_round_trip() {
        let values = vec![1.5f32, -2.25, 1e6];
        assert_eq!(bytes_to_f32(&f32_bytes(&values)), values);
        let counts = vec![0u32, 7, u32::MAX];
        assert_eq!(bytes_to_u32(&u32_bytes(&counts)), counts);
    }

    #[test]
    fn test_pack_node_records_layout() {
        let bytes = pack_node_records(&[2.5], &[9]);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[0..4], &2.5f32.to_ne_bytes());
        assert_eq!(&bytes[4..8], &9u32.to_ne_bytes());
    }

    #[test]
    fn test_pack_elevation_solution_layout() {
        let bytes = pack_elevation_solution_records(&[-1.0, -2.0], &[0.1, 0.2], &[3, 4]);
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[16..20], &0.2f32.to_ne_bytes());
        assert_eq!(&bytes[20..24], &4u32.to_ne_bytes());
    }

    #[test]
    fn test_sub_grid() {
        let grid = create_test_grid(4, 5);
        assert_eq!(sub_grid(&grid, 5, 1, 2, 2, 2), vec![1002.0, 1003.0, 2002.0, 2003.0]);
    }
}
