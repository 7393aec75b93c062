//! Grid index to geographic coordinate transform.
//!
//! The mapping is affine: the lower-left corner plus a resolution per axis.
//! Rows advance along X and columns along Y, matching how corner and
//! resolution pairs are recorded in BAG metadata.

use serde::{Deserialize, Serialize};

use crate::error::{BagError, Result};

/// Relative tolerance applied at the corners when inverting the transform.
const CORNER_TOLERANCE: f64 = 1e-9;

/// Affine georeference of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Georeference {
    pub ll_x: f64,
    pub ll_y: f64,
    pub ur_x: f64,
    pub ur_y: f64,
    pub row_resolution: f64,
    pub col_resolution: f64,
}

impl Georeference {
    /// Build a georeference whose upper-right corner is the centre of node
    /// `(dims.0 - 1, dims.1 - 1)`.
    pub fn from_corner(
        ll_x: f64,
        ll_y: f64,
        row_resolution: f64,
        col_resolution: f64,
        dims: (u32, u32),
    ) -> Self {
        Self {
            ll_x,
            ll_y,
            ur_x: ll_x + dims.0.saturating_sub(1) as f64 * row_resolution,
            ur_y: ll_y + dims.1.saturating_sub(1) as f64 * col_resolution,
            row_resolution,
            col_resolution,
        }
    }

    /// Geographic position of a grid node.
    pub fn grid_to_geo(&self, row: u32, col: u32) -> (f64, f64) {
        (
            self.ll_x + row as f64 * self.row_resolution,
            self.ll_y + col as f64 * self.col_resolution,
        )
    }

    /// Nearest grid node to a geographic position.
    ///
    /// Points outside `[ll, ur]` fail with `OutOfBounds` rather than being
    /// clamped onto the edge.
    pub fn geo_to_grid(&self, x: f64, y: f64) -> Result<(u32, u32)> {
        if self.row_resolution <= 0.0 || self.col_resolution <= 0.0 {
            return Err(BagError::invalid_metadata(format!(
                "cannot invert resolution ({}, {})",
                self.row_resolution, self.col_resolution
            )));
        }

        let tol_x = CORNER_TOLERANCE * self.row_resolution;
        let tol_y = CORNER_TOLERANCE * self.col_resolution;
        if !(x >= self.ll_x - tol_x
            && x <= self.ur_x + tol_x
            && y >= self.ll_y - tol_y
            && y <= self.ur_y + tol_y)
        {
            return Err(BagError::out_of_bounds(
                format!("({}, {})", x, y),
                format!(
                    "[({}, {}), ({}, {})]",
                    self.ll_x, self.ll_y, self.ur_x, self.ur_y
                ),
            ));
        }

        let row = ((x - self.ll_x) / self.row_resolution).round().max(0.0);
        let col = ((y - self.ll_y) / self.col_resolution).round().max(0.0);

        Ok((row as u32, col as u32))
    }

    /// `(ll_x, ll_y, ur_x, ur_y)`.
    pub fn cover(&self) -> (f64, f64, f64, f64) {
        (self.ll_x, self.ll_y, self.ur_x, self.ur_y)
    }
}
