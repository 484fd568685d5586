//! Tile-set router tests over a directory of synthetic GeoTIFF files.
//!
//! The fixture is a 3x2 grid of 16x16-pixel files at scale 25, so each
//! file covers 400 by 400 native units. File (col, row) is named
//! `E{col}N{row}.tif` and holds the constant value `(col * 10 + row) * 100`.
//! Two grid cells deliberately have no file.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use dem_common::{Coord, DemError, DemResult, DirFs, ReadAtFile, TileCoord, TileFs};
use tile_set::{interpolate_bilinear, ElevationService, TileSetBuilder};

use test_utils::GeoTiffBuilder;

const FILE_SPAN: i64 = 400;

/// A `TileFs` that counts open attempts and live file handles.
struct CountingFs {
    inner: DirFs,
    open_attempts: AtomicU64,
    live_handles: Arc<AtomicI64>,
}

impl CountingFs {
    fn new(root: &Path) -> Self {
        Self {
            inner: DirFs::new(root),
            open_attempts: AtomicU64::new(0),
            live_handles: Arc::new(AtomicI64::new(0)),
        }
    }

    fn open_attempts(&self) -> u64 {
        self.open_attempts.load(Ordering::SeqCst)
    }

    fn live_handles(&self) -> i64 {
        self.live_handles.load(Ordering::SeqCst)
    }
}

impl TileFs for CountingFs {
    fn open(&self, filename: &str) -> io::Result<Arc<dyn ReadAtFile>> {
        self.open_attempts.fetch_add(1, Ordering::SeqCst);
        let file = self.inner.open(filename)?;
        self.live_handles.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(TrackedFile {
            inner: file,
            live_handles: Arc::clone(&self.live_handles),
        }))
    }
}

struct TrackedFile {
    inner: Arc<dyn ReadAtFile>,
    live_handles: Arc<AtomicI64>,
}

impl ReadAtFile for TrackedFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.inner.read_at(buf, offset)
    }
}

impl Drop for TrackedFile {
    fn drop(&mut self) {
        self.live_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

fn file_value(col: i64, row: i64) -> f32 {
    ((col * 10 + row) * 100) as f32
}

/// Write the fixture files into `dir`. Cells (0, 1) and (2, 1) stay empty.
fn write_fixture(dir: &Path) {
    for (col, row) in [(0, 0), (1, 0), (2, 0), (1, 1)] {
        GeoTiffBuilder::new(16, 16, 16, 16)
            .with_samples(vec![file_value(col, row); 16 * 16])
            .with_origin(FILE_SPAN * col, FILE_SPAN * row + FILE_SPAN)
            .write_to(&dir.join(format!("E{col}N{row}.tif")))
            .unwrap();
    }
}

fn fixture_builder(fs: Arc<CountingFs>) -> TileSetBuilder {
    TileSetBuilder::new(
        fs,
        3035,
        (25, 25),
        |coord: Coord| {
            if (0..3 * FILE_SPAN).contains(&coord.x) && (0..2 * FILE_SPAN).contains(&coord.y) {
                Some(TileCoord {
                    col: coord.x / FILE_SPAN,
                    row: coord.y / FILE_SPAN,
                })
            } else {
                None
            }
        },
        |tile_coord: TileCoord| format!("E{}N{}.tif", tile_coord.col, tile_coord.row),
    )
}

fn center_of(col: i64, row: i64) -> Coord {
    Coord {
        x: FILE_SPAN * col + FILE_SPAN / 2,
        y: FILE_SPAN * row + FILE_SPAN / 2,
    }
}

#[tokio::test]
async fn routes_queries_to_the_covering_file() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let fs = Arc::new(CountingFs::new(dir.path()));
    let tile_set = fixture_builder(Arc::clone(&fs)).build().unwrap();

    for (col, row) in [(0, 0), (1, 0), (2, 0), (1, 1)] {
        let sample = tile_set.sample(center_of(col, row)).await.unwrap();
        assert_eq!(sample, f64::from(file_value(col, row)), "file ({col}, {row})");
    }
    assert_eq!(fs.open_attempts(), 4);
    assert_eq!(tile_set.open_decoders().await, 4);
}

#[tokio::test]
async fn missing_files_are_nan_and_probed_once() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let fs = Arc::new(CountingFs::new(dir.path()));
    let tile_set = fixture_builder(Arc::clone(&fs)).build().unwrap();

    for _ in 0..3 {
        let sample = tile_set.sample(center_of(0, 1)).await.unwrap();
        assert!(sample.is_nan());
    }

    assert_eq!(fs.open_attempts(), 1);
    assert_eq!(fs.live_handles(), 0);
    assert_eq!(tile_set.cache_stats().absent_recorded(), 1);
}

#[tokio::test]
async fn out_of_coverage_coordinates_cause_no_io() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let fs = Arc::new(CountingFs::new(dir.path()));
    let tile_set = fixture_builder(Arc::clone(&fs)).build().unwrap();

    for coord in [
        Coord { x: -1, y: 100 },
        Coord { x: 100, y: -1 },
        Coord { x: 3 * FILE_SPAN, y: 100 },
        Coord { x: 100, y: 2 * FILE_SPAN },
    ] {
        assert!(tile_set.sample(coord).await.unwrap().is_nan());
    }
    assert_eq!(fs.open_attempts(), 0);
}

#[tokio::test]
async fn evicted_decoders_release_their_file_handles() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let fs = Arc::new(CountingFs::new(dir.path()));
    let tile_set = fixture_builder(Arc::clone(&fs))
        .with_cache_size(1)
        .build()
        .unwrap();

    for (col, row) in [(0, 0), (1, 0), (2, 0)] {
        tile_set.sample(center_of(col, row)).await.unwrap();
    }

    assert_eq!(fs.open_attempts(), 3);
    assert_eq!(tile_set.open_decoders().await, 1);
    assert_eq!(fs.live_handles(), 1);
    assert_eq!(tile_set.cache_stats().evictions(), 2);

    // An evicted file reopens on the next query.
    tile_set.sample(center_of(0, 0)).await.unwrap();
    assert_eq!(fs.open_attempts(), 4);
    assert_eq!(fs.live_handles(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_queries_for_a_missing_file_probe_once() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let fs = Arc::new(CountingFs::new(dir.path()));
    let tile_set = Arc::new(fixture_builder(Arc::clone(&fs)).build().unwrap());
    let barrier = Arc::new(tokio::sync::Barrier::new(16));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let tile_set = Arc::clone(&tile_set);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            assert!(tile_set.sample(center_of(0, 1)).await.unwrap().is_nan());
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(fs.open_attempts(), 1);
}

#[tokio::test]
async fn batch_matches_single_samples() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let fs = Arc::new(CountingFs::new(dir.path()));
    let tile_set = fixture_builder(fs).build().unwrap();

    let coords = vec![
        center_of(0, 0),
        center_of(1, 1),
        center_of(0, 1),          // missing file
        Coord { x: -50, y: 100 }, // out of coverage
        center_of(2, 0),
        center_of(0, 0),
    ];

    let batch = tile_set.samples(&coords).await.unwrap();
    assert_eq!(batch.len(), coords.len());
    for (coord, &from_batch) in coords.iter().zip(&batch) {
        let single = tile_set.sample(*coord).await.unwrap();
        assert!(
            single == from_batch || (single.is_nan() && from_batch.is_nan()),
            "coordinate {coord:?}: {single} vs {from_batch}"
        );
    }
}

#[tokio::test]
async fn an_unreadable_file_fails_the_whole_batch() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    std::fs::write(dir.path().join("E1N0.tif"), b"not a tiff at all").unwrap();
    let fs = Arc::new(CountingFs::new(dir.path()));
    let tile_set = fixture_builder(fs).build().unwrap();

    let err = tile_set
        .samples(&[center_of(0, 0), center_of(1, 0)])
        .await
        .unwrap_err();
    assert!(matches!(err, DemError::MalformedFile(_)), "{err}");
}

#[tokio::test]
async fn canary_file_is_validated_at_build_time() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());

    let fs = Arc::new(CountingFs::new(dir.path()));
    fixture_builder(Arc::clone(&fs))
        .with_canary("E0N0.tif")
        .build()
        .unwrap();

    let err = fixture_builder(fs)
        .with_canary("E9N9.tif")
        .build()
        .unwrap_err();
    assert!(matches!(err, DemError::Config(_)), "{err}");
}

#[tokio::test]
async fn interpolation_blends_across_file_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let fs = Arc::new(CountingFs::new(dir.path()));
    let tile_set = fixture_builder(fs).build().unwrap();

    // The cell starting at x = 375 straddles files (0, 0) and (1, 0), which
    // hold the constants 0 and 1000.
    let values = interpolate_bilinear(&tile_set, &[(390.0, 200.0)])
        .await
        .unwrap();
    assert!((values[0] - 600.0).abs() < 1e-9, "value {}", values[0]);
}

fn projected_service(dir: &Path) -> ElevationService {
    let fs: Arc<dyn TileFs> = Arc::new(DirFs::new(dir));
    let tile_set = TileSetBuilder::new(
        fs,
        3035,
        (25, 25),
        |coord: Coord| {
            if coord.x < 0 || coord.y < 0 {
                None
            } else {
                Some(TileCoord { col: 0, row: 0 })
            }
        },
        |_| "flat.tif".to_string(),
    )
    .build()
    .unwrap();
    tile_set::eu_dem_elevation_service(tile_set)
}

#[tokio::test]
async fn wgs84_queries_project_into_the_native_grid() {
    // One flat 100-meter file covering the projected location of 50N 5E,
    // which maps to roughly (3962799, 2999719) in EPSG:3035.
    let dir = tempfile::tempdir().unwrap();
    GeoTiffBuilder::new(16, 16, 16, 16)
        .with_samples(vec![100.0; 16 * 16])
        .with_origin(3_962_600, 2_999_900)
        .write_to(&dir.path().join("flat.tif"))
        .unwrap();

    let service = projected_service(dir.path());
    let elevation = service.elevation_wgs84(5.0, 50.0).await.unwrap();
    assert!((elevation - 100.0).abs() < 1e-9, "elevation {elevation}");

    // Far away, the raster has no coverage.
    assert!(service.elevation_wgs84(5.0, 51.0).await.unwrap().is_nan());

    // An unprojectable coordinate is an error, not NaN.
    let err = service.elevations_wgs84(&[(5.0, 95.0)]).await.unwrap_err();
    assert!(matches!(err, DemError::Projection(_)), "{err}");
}

#[tokio::test]
async fn tile_set_is_a_raster() {
    let dir = tempfile::tempdir().unwrap();
    write_fixture(dir.path());
    let fs = Arc::new(CountingFs::new(dir.path()));
    let tile_set = fixture_builder(fs).build().unwrap();

    let raster: &dyn dem_common::Raster = &tile_set;
    assert_eq!(raster.scale(), (25, 25));
    let samples: DemResult<Vec<f64>> = raster.samples(&[center_of(1, 0)]).await;
    assert_eq!(samples.unwrap(), vec![1000.0]);
}
