//! End-to-end pipeline tests: bind, prepare, apply.

use std::f64::consts::PI;

use tempfile::TempDir;

use geoctx_common::error::PipelineError;
use geoctx_common::{
    CandidateOperation, Coordinate, Direction, PipelineStep, Region, StepDef,
};
use geoctx_engine::BoundPipeline;
use geoctx_grids::{GridResolver, GridSources};
use geoctx_testkit::{grid_shift_steps, web_mercator_steps, write_shift_grid};

fn operation(steps: Vec<StepDef>, reversible: bool) -> CandidateOperation {
    CandidateOperation {
        code: "GEOCTX:TEST".to_string(),
        name: "test operation".to_string(),
        steps: steps.into_iter().map(PipelineStep::forward).collect(),
        accuracy_m: Some(1.0),
        area_of_use: Region::GLOBAL,
        reversible,
        grid_status: Vec::new(),
    }
}

fn offline_sources(dir: &std::path::Path) -> GridSources {
    GridSources {
        search_paths: vec![dir.to_path_buf()],
        user_writable_dir: None,
        network_enabled: false,
        endpoint: "https://grids.invalid".to_string(),
        ca_bundle: None,
    }
}

fn conus() -> Region {
    Region::new(-125.0, 24.0, -66.0, 50.0)
}

#[tokio::test]
async fn web_mercator_round_trip() {
    let resolver = GridResolver::new();
    let dir = TempDir::new().unwrap();
    let sources = offline_sources(dir.path());

    let bound = BoundPipeline::bind(operation(web_mercator_steps(), true)).unwrap();
    let ready = bound.prepare(&resolver, &sources).await.unwrap();

    let input = vec![Coordinate::xy(-97.5, 38.5)];
    let projected = ready.apply(&input, Direction::Forward).unwrap();

    // Spherical Mercator closed forms for (-97.5, 38.5).
    let radius = 6_378_137.0;
    let expected_x = radius * (-97.5_f64).to_radians();
    let expected_y = radius * (PI / 4.0 + 38.5_f64.to_radians() / 2.0).tan().ln();
    assert!((projected[0].x - expected_x).abs() < 1e-3);
    assert!((projected[0].y - expected_y).abs() < 1e-3);

    let back = ready.apply(&projected, Direction::Inverse).unwrap();
    assert!((back[0].x - input[0].x).abs() < 1e-7);
    assert!((back[0].y - input[0].y).abs() < 1e-7);
}

#[tokio::test]
async fn batch_keeps_going_past_failed_points() {
    let dir = TempDir::new().unwrap();
    write_shift_grid(dir.path(), "conus_shift", conus(), 8, 8, 1.0, 1.0);

    let resolver = GridResolver::new();
    let sources = offline_sources(dir.path());

    let bound = BoundPipeline::bind(operation(grid_shift_steps("conus_shift"), true)).unwrap();
    let ready = bound.prepare(&resolver, &sources).await.unwrap();

    let mut input: Vec<Coordinate> = (0..100)
        .map(|i| Coordinate::xy(-120.0 + i as f64 * 0.5, 40.0))
        .collect();
    // Paris is well outside the grid.
    input[37] = Coordinate::xy(2.35, 48.85);

    let output = ready.apply(&input, Direction::Forward).unwrap();
    assert_eq!(output.len(), 100);
    assert!(!output[37].is_defined());

    let defined = output.iter().filter(|c| c.is_defined()).count();
    assert_eq!(defined, 99);
}

#[tokio::test]
async fn prepare_reports_first_missing_grid() {
    let dir = TempDir::new().unwrap();
    let resolver = GridResolver::new();
    let sources = offline_sources(dir.path());

    let bound = BoundPipeline::bind(operation(grid_shift_steps("nowhere"), true)).unwrap();
    let err = bound.prepare(&resolver, &sources).await.unwrap_err();

    assert!(matches!(err, PipelineError::MissingGrid(name) if name == "nowhere"));
}

#[tokio::test]
async fn prepare_hits_cache_on_repeat() {
    let dir = TempDir::new().unwrap();
    let path = write_shift_grid(dir.path(), "cached_shift", conus(), 8, 8, 1.0, 1.0);

    let resolver = GridResolver::new();
    let sources = offline_sources(dir.path());

    let first = BoundPipeline::bind(operation(grid_shift_steps("cached_shift"), true)).unwrap();
    first.prepare(&resolver, &sources).await.unwrap();

    // Even with the file gone the second prepare succeeds from cache.
    std::fs::remove_file(&path).unwrap();

    let second = BoundPipeline::bind(operation(grid_shift_steps("cached_shift"), true)).unwrap();
    assert!(second.prepare(&resolver, &sources).await.is_ok());
}

#[tokio::test]
async fn inverse_of_irreversible_operation_is_rejected() {
    let resolver = GridResolver::new();
    let dir = TempDir::new().unwrap();
    let sources = offline_sources(dir.path());

    let bound = BoundPipeline::bind(operation(web_mercator_steps(), false)).unwrap();
    let ready = bound.prepare(&resolver, &sources).await.unwrap();

    // Forward still works.
    assert!(ready
        .apply(&[Coordinate::xy(0.0, 0.0)], Direction::Forward)
        .is_ok());

    let err = ready
        .apply(&[Coordinate::xy(0.0, 0.0)], Direction::Inverse)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Incompatible(_)));
}

#[tokio::test]
async fn mercator_pole_produces_sentinel() {
    let resolver = GridResolver::new();
    let dir = TempDir::new().unwrap();
    let sources = offline_sources(dir.path());

    let bound = BoundPipeline::bind(operation(web_mercator_steps(), true)).unwrap();
    let ready = bound.prepare(&resolver, &sources).await.unwrap();

    let output = ready
        .apply(&[Coordinate::xy(0.0, 90.0)], Direction::Forward)
        .unwrap();
    assert!(!output[0].is_defined());
}

#[tokio::test]
async fn grid_shift_round_trips_through_inverse() {
    let dir = TempDir::new().unwrap();
    write_shift_grid(dir.path(), "rt_shift", conus(), 8, 8, 12.0, -6.0);

    let resolver = GridResolver::new();
    let sources = offline_sources(dir.path());

    let bound = BoundPipeline::bind(operation(grid_shift_steps("rt_shift"), true)).unwrap();
    let ready = bound.prepare(&resolver, &sources).await.unwrap();

    let input = vec![Coordinate::xy(-100.0, 40.0)];
    let shifted = ready.apply(&input, Direction::Forward).unwrap();
    assert!((shifted[0].x - (-100.0 + 12.0 / 3600.0)).abs() < 1e-9);

    let back = ready.apply(&shifted, Direction::Inverse).unwrap();
    assert!((back[0].x - input[0].x).abs() < 1e-9);
    assert!((back[0].y - input[0].y).abs() < 1e-9);
}

#[test]
fn mercator_projects_equator_linearly() {
    // Sanity check on the step composition: a quarter turn east at the
    // equator is a quarter of the full map width.
    let steps = web_mercator_steps();
    assert_eq!(steps.len(), 2);

    match &steps[1] {
        StepDef::Mercator { radius, .. } => {
            let quarter = radius * PI / 2.0;
            assert!(quarter > 10_000_000.0 && quarter < 10_100_000.0);
        }
        other => panic!("unexpected step {:?}", other),
    }
}
