//! Writers for throwaway shift-grid files.

use std::path::{Path, PathBuf};

use serde_json::json;

use geoctx_common::Region;

/// Write a shift grid with constant offsets to `dir/<name>.json`.
///
/// Offsets are in arc-seconds; grid nodes cover `region` inclusively,
/// row-major from the south-west corner.
pub fn write_shift_grid(
    dir: &Path,
    name: &str,
    region: Region,
    ncols: usize,
    nrows: usize,
    lon_shift_arcsec: f64,
    lat_shift_arcsec: f64,
) -> PathBuf {
    let n = ncols * nrows;
    let grid = json!({
        "name": name,
        "west": region.west,
        "south": region.south,
        "east": region.east,
        "north": region.north,
        "ncols": ncols,
        "nrows": nrows,
        "lon_shift_arcsec": vec![lon_shift_arcsec; n],
        "lat_shift_arcsec": vec![lat_shift_arcsec; n],
    });

    let path = dir.join(format!("{}.json", name));
    std::fs::write(&path, serde_json::to_vec(&grid).expect("grid serialize"))
        .expect("grid write failed");
    path
}
