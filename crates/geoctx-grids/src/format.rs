//! The shift-grid container format.
//!
//! Grids are JSON documents holding arc-second longitude/latitude
//! offsets on a regular geographic lattice, row-major from the
//! south-west corner with nodes on the region edges. A `.json.gz`
//! variant is readable when the `compressed-grids` feature is enabled.

use std::path::Path;

use serde::{Deserialize, Serialize};

use geoctx_common::error::{GridError, GridResult};
use geoctx_common::Region;

/// A parsed datum-shift grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftGrid {
    pub name: String,
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
    pub ncols: usize,
    pub nrows: usize,
    /// Longitude offsets in arc-seconds, `nrows * ncols` values.
    pub lon_shift_arcsec: Vec<f64>,
    /// Latitude offsets in arc-seconds, `nrows * ncols` values.
    pub lat_shift_arcsec: Vec<f64>,
}

impl ShiftGrid {
    /// Read and validate a grid file. Gzip is detected by the `.gz`
    /// extension.
    pub fn load(path: &Path) -> GridResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            GridError::NotFound(format!("{} (read failed: {})", path.display(), e))
        })?;

        let bytes = maybe_decompress(path, bytes)?;

        let grid: ShiftGrid = serde_json::from_slice(&bytes).map_err(|e| {
            GridError::NotFound(format!("{} (invalid grid file: {})", path.display(), e))
        })?;

        grid.validate()
            .map_err(|msg| GridError::NotFound(format!("{} ({})", path.display(), msg)))?;

        Ok(grid)
    }

    fn validate(&self) -> Result<(), String> {
        if self.ncols < 2 || self.nrows < 2 {
            return Err("grid must be at least 2x2".to_string());
        }

        let expected = self.ncols * self.nrows;
        if self.lon_shift_arcsec.len() != expected || self.lat_shift_arcsec.len() != expected {
            return Err(format!(
                "offset arrays must hold {} values, got {}/{}",
                expected,
                self.lon_shift_arcsec.len(),
                self.lat_shift_arcsec.len()
            ));
        }

        if self.east <= self.west || self.north <= self.south {
            return Err("grid region is degenerate".to_string());
        }

        Ok(())
    }

    /// Coverage of the grid.
    pub fn region(&self) -> Region {
        Region::new(self.west, self.south, self.east, self.north)
    }

    /// Bilinear sample of the (lon, lat) offsets in arc-seconds.
    ///
    /// Returns `None` outside the grid domain; callers turn that into
    /// the undefined-coordinate sentinel.
    pub fn sample(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        if !self.region().contains_point(lon, lat) {
            return None;
        }

        let dlon = (self.east - self.west) / (self.ncols - 1) as f64;
        let dlat = (self.north - self.south) / (self.nrows - 1) as f64;

        let x = (lon - self.west) / dlon;
        let y = (lat - self.south) / dlat;

        let dx = bilinear(&self.lon_shift_arcsec, self.ncols, self.nrows, x, y)?;
        let dy = bilinear(&self.lat_shift_arcsec, self.ncols, self.nrows, x, y)?;

        Some((dx, dy))
    }
}

/// Bilinear interpolation on a row-major lattice. `None` when the
/// fractional index falls outside or hits a NaN node.
fn bilinear(data: &[f64], width: usize, height: usize, x: f64, y: f64) -> Option<f64> {
    if x < 0.0 || y < 0.0 {
        return None;
    }

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    if x0 >= width || y0 >= height {
        return None;
    }
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let xf = x - x0 as f64;
    let yf = y - y0 as f64;

    let v00 = data[y0 * width + x0];
    let v10 = data[y0 * width + x1];
    let v01 = data[y1 * width + x0];
    let v11 = data[y1 * width + x1];

    if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
        return None;
    }

    let bottom = v00 * (1.0 - xf) + v10 * xf;
    let top = v01 * (1.0 - xf) + v11 * xf;
    Some(bottom * (1.0 - yf) + top * yf)
}

#[cfg(feature = "compressed-grids")]
fn maybe_decompress(path: &Path, bytes: Vec<u8>) -> GridResult<Vec<u8>> {
    use std::io::Read;

    if path.extension().and_then(|e| e.to_str()) != Some("gz") {
        return Ok(bytes);
    }

    let mut decoder = flate2::read::GzDecoder::new(bytes.as_slice());
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|e| {
        GridError::NotFound(format!("{} (gzip decode failed: {})", path.display(), e))
    })?;
    Ok(out)
}

#[cfg(not(feature = "compressed-grids"))]
fn maybe_decompress(path: &Path, bytes: Vec<u8>) -> GridResult<Vec<u8>> {
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        return Err(GridError::NotFound(format!(
            "{} (compressed grid support not compiled in)",
            path.display()
        )));
    }
    Ok(bytes)
}
