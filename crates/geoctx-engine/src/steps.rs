//! Numeric application of pipeline step primitives.
//!
//! Every function here is per-point and infallible in the batch sense:
//! a point the math cannot handle (outside a grid's domain, at a
//! projection pole) yields `None` and the executor substitutes the
//! undefined-coordinate sentinel.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Arc;

use geoctx_common::{Coordinate, StepDef};
use geoctx_grids::ShiftGrid;

/// Rounds of fixed-point iteration for the grid-shift inverse.
const GRID_INVERSE_ROUNDS: usize = 4;

/// Apply one step to one point. `invert` selects the inverse sense;
/// callers have already established the step is reversible.
pub(crate) fn apply_step(
    def: &StepDef,
    invert: bool,
    coord: Coordinate,
    grids: &HashMap<String, Arc<ShiftGrid>>,
) -> Option<Coordinate> {
    let out = match def {
        StepDef::Affine { a, b, tx, c, d, ty } => {
            if invert {
                affine_inverse(*a, *b, *tx, *c, *d, *ty, coord)?
            } else {
                Coordinate::new(
                    a * coord.x + b * coord.y + tx,
                    c * coord.x + d * coord.y + ty,
                    coord.z,
                )
            }
        }

        StepDef::UnitConversion { factor, .. } => {
            if invert {
                Coordinate::new(coord.x / factor, coord.y / factor, coord.z)
            } else {
                Coordinate::new(coord.x * factor, coord.y * factor, coord.z)
            }
        }

        StepDef::GridShift { grid } => {
            let grid = grids.get(grid)?;
            if invert {
                grid_shift_inverse(grid, coord)?
            } else {
                grid_shift_forward(grid, coord)?
            }
        }

        StepDef::Mercator { lon0, radius } => {
            if invert {
                mercator_inverse(*lon0, *radius, coord)
            } else {
                mercator_forward(*lon0, *radius, coord)?
            }
        }

        StepDef::LambertConformal {
            lon0,
            lat0,
            latin1,
            latin2,
            radius,
        } => {
            let cone = LambertCone::new(*lat0, *latin1, *latin2, *radius);
            if invert {
                cone.inverse(*lon0, coord)?
            } else {
                cone.forward(*lon0, coord)?
            }
        }
    };

    out.is_defined().then_some(out)
}

fn affine_inverse(a: f64, b: f64, tx: f64, c: f64, d: f64, ty: f64, coord: Coordinate) -> Option<Coordinate> {
    let det = a * d - b * c;
    if det.abs() < 1e-12 {
        return None;
    }

    let x = coord.x - tx;
    let y = coord.y - ty;
    Some(Coordinate::new(
        (d * x - b * y) / det,
        (a * y - c * x) / det,
        coord.z,
    ))
}

/// Shift a geographic point (degrees) by the grid's arc-second offsets.
fn grid_shift_forward(grid: &ShiftGrid, coord: Coordinate) -> Option<Coordinate> {
    let (dlon, dlat) = grid.sample(coord.x, coord.y)?;
    Some(Coordinate::new(
        coord.x + dlon / 3600.0,
        coord.y + dlat / 3600.0,
        coord.z,
    ))
}

/// Invert the shift by fixed-point iteration: start at the target and
/// repeatedly subtract the shift sampled at the current guess. Shift
/// fields vary slowly relative to their magnitude, so a few rounds
/// converge well below grid accuracy.
fn grid_shift_inverse(grid: &ShiftGrid, coord: Coordinate) -> Option<Coordinate> {
    let mut lon = coord.x;
    let mut lat = coord.y;

    for _ in 0..GRID_INVERSE_ROUNDS {
        let (dlon, dlat) = grid.sample(lon, lat)?;
        lon = coord.x - dlon / 3600.0;
        lat = coord.y - dlat / 3600.0;
    }

    Some(Coordinate::new(lon, lat, coord.z))
}

/// Spherical Mercator, radians in, metres out. Poles have no image.
fn mercator_forward(lon0: f64, radius: f64, coord: Coordinate) -> Option<Coordinate> {
    let lat = coord.y;
    if lat.abs() >= PI / 2.0 {
        return None;
    }

    let x = radius * normalize_lon(coord.x - lon0);
    let y = radius * (PI / 4.0 + lat / 2.0).tan().ln();
    Some(Coordinate::new(x, y, coord.z))
}

fn mercator_inverse(lon0: f64, radius: f64, coord: Coordinate) -> Coordinate {
    let lon = normalize_lon(coord.x / radius + lon0);
    let lat = 2.0 * (coord.y / radius).exp().atan() - PI / 2.0;
    Coordinate::new(lon, lat, coord.z)
}

/// Precomputed constants of a spherical Lambert Conformal cone, tangent
/// when the standard parallels coincide.
struct LambertCone {
    n: f64,
    f: f64,
    rho0: f64,
    radius: f64,
}

impl LambertCone {
    fn new(lat0: f64, latin1: f64, latin2: f64, radius: f64) -> Self {
        let n = if (latin1 - latin2).abs() < 1e-10 {
            latin1.sin()
        } else {
            let ln_ratio = (latin1.cos() / latin2.cos()).ln();
            let tan_ratio =
                ((PI / 4.0 + latin2 / 2.0).tan() / (PI / 4.0 + latin1 / 2.0).tan()).ln();
            ln_ratio / tan_ratio
        };

        let f = (latin1.cos() * (PI / 4.0 + latin1 / 2.0).tan().powf(n)) / n;
        let rho0 = radius * f / (PI / 4.0 + lat0 / 2.0).tan().powf(n);

        Self { n, f, rho0, radius }
    }

    fn forward(&self, lon0: f64, coord: Coordinate) -> Option<Coordinate> {
        let lat = coord.y;
        if lat.abs() >= PI / 2.0 {
            return None;
        }

        let rho = self.radius * self.f / (PI / 4.0 + lat / 2.0).tan().powf(self.n);
        let theta = self.n * normalize_lon(coord.x - lon0);

        Some(Coordinate::new(
            rho * theta.sin(),
            self.rho0 - rho * theta.cos(),
            coord.z,
        ))
    }

    fn inverse(&self, lon0: f64, coord: Coordinate) -> Option<Coordinate> {
        let rho = (coord.x * coord.x + (self.rho0 - coord.y) * (self.rho0 - coord.y)).sqrt();
        let rho = if self.n < 0.0 { -rho } else { rho };
        if rho == 0.0 {
            return None;
        }

        let theta = (coord.x / (self.rho0 - coord.y)).atan();
        let lat = 2.0 * ((self.radius * self.f / rho).powf(1.0 / self.n)).atan() - PI / 2.0;
        let lon = normalize_lon(lon0 + theta / self.n);

        Some(Coordinate::new(lon, lat, coord.z))
    }
}

/// Wrap a longitude difference into [-pi, pi].
fn normalize_lon(mut lon: f64) -> f64 {
    while lon > PI {
        lon -= 2.0 * PI;
    }
    while lon < -PI {
        lon += 2.0 * PI;
    }
    lon
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoctx_common::{CoordSpace, Region};

    const EARTH_RADIUS: f64 = 6_378_137.0;

    fn no_grids() -> HashMap<String, Arc<ShiftGrid>> {
        HashMap::new()
    }

    fn constant_grid(lon_arcsec: f64, lat_arcsec: f64) -> HashMap<String, Arc<ShiftGrid>> {
        let region = Region::new(-125.0, 24.0, -66.0, 50.0);
        let n = 16;
        let grid = ShiftGrid {
            name: "shift".to_string(),
            west: region.west,
            south: region.south,
            east: region.east,
            north: region.north,
            ncols: 4,
            nrows: 4,
            lon_shift_arcsec: vec![lon_arcsec; n],
            lat_shift_arcsec: vec![lat_arcsec; n],
        };

        let mut grids = HashMap::new();
        grids.insert("shift".to_string(), Arc::new(grid));
        grids
    }

    #[test]
    fn test_affine_round_trip() {
        let step = StepDef::Affine {
            a: 2.0,
            b: 0.5,
            tx: 100.0,
            c: -0.5,
            d: 2.0,
            ty: -50.0,
        };

        let p = Coordinate::new(10.0, 20.0, 5.0);
        let fwd = apply_step(&step, false, p, &no_grids()).unwrap();
        let back = apply_step(&step, true, fwd, &no_grids()).unwrap();

        assert!((back.x - p.x).abs() < 1e-9);
        assert!((back.y - p.y).abs() < 1e-9);
        assert_eq!(back.z, 5.0);
    }

    #[test]
    fn test_singular_affine_inverse_fails() {
        let step = StepDef::Affine {
            a: 1.0,
            b: 2.0,
            tx: 0.0,
            c: 2.0,
            d: 4.0,
            ty: 0.0,
        };
        assert!(apply_step(&step, true, Coordinate::xy(1.0, 1.0), &no_grids()).is_none());
    }

    #[test]
    fn test_unit_conversion() {
        let step = StepDef::UnitConversion {
            factor: PI / 180.0,
            from: CoordSpace::GeographicDegrees,
            to: CoordSpace::GeographicRadians,
        };

        let fwd = apply_step(&step, false, Coordinate::xy(180.0, 90.0), &no_grids()).unwrap();
        assert!((fwd.x - PI).abs() < 1e-12);
        assert!((fwd.y - PI / 2.0).abs() < 1e-12);

        let back = apply_step(&step, true, fwd, &no_grids()).unwrap();
        assert!((back.x - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_mercator_known_point() {
        let step = StepDef::Mercator {
            lon0: 0.0,
            radius: EARTH_RADIUS,
        };

        // Equator at the central meridian maps to the origin.
        let origin = apply_step(&step, false, Coordinate::xy(0.0, 0.0), &no_grids()).unwrap();
        assert!(origin.x.abs() < 1e-9);
        assert!(origin.y.abs() < 1e-9);

        // 180 degrees east maps to pi * R.
        let edge =
            apply_step(&step, false, Coordinate::xy(PI, 0.0), &no_grids()).unwrap();
        assert!((edge.x - PI * EARTH_RADIUS).abs() < 1e-3);
    }

    #[test]
    fn test_mercator_pole_undefined() {
        let step = StepDef::Mercator {
            lon0: 0.0,
            radius: EARTH_RADIUS,
        };
        assert!(apply_step(&step, false, Coordinate::xy(0.0, PI / 2.0), &no_grids()).is_none());
    }

    #[test]
    fn test_mercator_round_trip() {
        let step = StepDef::Mercator {
            lon0: 0.0,
            radius: EARTH_RADIUS,
        };

        let p = Coordinate::xy(-97.5_f64.to_radians(), 38.5_f64.to_radians());
        let fwd = apply_step(&step, false, p, &no_grids()).unwrap();
        let back = apply_step(&step, true, fwd, &no_grids()).unwrap();

        assert!((back.x - p.x).abs() < 1e-12);
        assert!((back.y - p.y).abs() < 1e-12);
    }

    #[test]
    fn test_lambert_round_trip_secant() {
        let step = StepDef::LambertConformal {
            lon0: -97.5_f64.to_radians(),
            lat0: 38.5_f64.to_radians(),
            latin1: 33.0_f64.to_radians(),
            latin2: 45.0_f64.to_radians(),
            radius: 6_371_229.0,
        };

        let p = Coordinate::xy(-94.5_f64.to_radians(), 39.0_f64.to_radians());
        let fwd = apply_step(&step, false, p, &no_grids()).unwrap();
        let back = apply_step(&step, true, fwd, &no_grids()).unwrap();

        assert!((back.x - p.x).abs() < 1e-10);
        assert!((back.y - p.y).abs() < 1e-10);
    }

    #[test]
    fn test_lambert_tangent_cone_origin() {
        let lat0 = 38.5_f64.to_radians();
        let step = StepDef::LambertConformal {
            lon0: -97.5_f64.to_radians(),
            lat0,
            latin1: lat0,
            latin2: lat0,
            radius: 6_371_229.0,
        };

        // The projection origin maps to (0, 0).
        let origin = apply_step(
            &step,
            false,
            Coordinate::xy(-97.5_f64.to_radians(), lat0),
            &no_grids(),
        )
        .unwrap();
        assert!(origin.x.abs() < 1e-6);
        assert!(origin.y.abs() < 1e-6);
    }

    #[test]
    fn test_grid_shift_constant_offsets() {
        let grids = constant_grid(3600.0, -1800.0);
        let step = StepDef::GridShift {
            grid: "shift".to_string(),
        };

        let fwd = apply_step(&step, false, Coordinate::xy(-100.0, 40.0), &grids).unwrap();
        assert!((fwd.x - -99.0).abs() < 1e-9);
        assert!((fwd.y - 39.5).abs() < 1e-9);
    }

    #[test]
    fn test_grid_shift_inverse_converges() {
        let grids = constant_grid(10.0, 5.0);
        let step = StepDef::GridShift {
            grid: "shift".to_string(),
        };

        let p = Coordinate::xy(-100.0, 40.0);
        let fwd = apply_step(&step, false, p, &grids).unwrap();
        let back = apply_step(&step, true, fwd, &grids).unwrap();

        assert!((back.x - p.x).abs() < 1e-9);
        assert!((back.y - p.y).abs() < 1e-9);
    }

    #[test]
    fn test_grid_shift_out_of_domain() {
        let grids = constant_grid(1.0, 1.0);
        let step = StepDef::GridShift {
            grid: "shift".to_string(),
        };
        assert!(apply_step(&step, false, Coordinate::xy(10.0, 50.0), &grids).is_none());
    }

    #[test]
    fn test_missing_grid_is_none() {
        let step = StepDef::GridShift {
            grid: "absent".to_string(),
        };
        assert!(apply_step(&step, false, Coordinate::xy(0.0, 0.0), &no_grids()).is_none());
    }
}
