mod common;

use anyhow::Result;
use common::{write_granule, SyntheticBeam, GRANULE_NAME};
use gedisub::core::FootprintLocator;
use gedisub::io::GranuleReader;
use gedisub::types::{Product, Roi};
use gedisub::VariableCatalog;

/// ROI covering roughly 42..44 N, 122..120 W
fn roi() -> Roi {
    Roi::new(44.0, -122.0, 42.0, -120.0).unwrap()
}

/// Ten shots: the first four inside the ROI, the rest far north of it
fn split_track() -> Vec<(f64, f64)> {
    let mut coords = Vec::new();
    for i in 0..4 {
        coords.push((43.0 + i as f64 * 0.05, -121.0 + i as f64 * 0.05));
    }
    for i in 0..6 {
        coords.push((50.0 + i as f64 * 0.05, -121.0));
    }
    coords
}

/// Ten shots entirely outside the ROI
fn distant_track() -> Vec<(f64, f64)> {
    (0..10).map(|i| (10.0 + i as f64 * 0.05, 30.0)).collect()
}

#[test]
fn test_locator_window_covers_leading_matches() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(GRANULE_NAME);
    write_granule(
        &path,
        &[
            SyntheticBeam::new("BEAM0000", 1000, &split_track()),
            SyntheticBeam::new("BEAM0001", 2000, &distant_track()),
        ],
    )?;

    let catalog = VariableCatalog::new();
    let defaults = catalog.defaults(Product::L2A);
    let reader = GranuleReader::open(&path)?;
    let roi = roi();
    let locator = FootprintLocator::new(&roi);

    let located = locator
        .locate_beam(&reader, defaults, "BEAM0000")?
        .expect("beam 0 intersects the ROI");
    assert_eq!(located.window, 0..4);
    assert_eq!(located.rows.len(), 4);
    assert_eq!(located.rows[0].shot_number, 1000);
    assert_eq!(located.rows[3].shot_number, 1003);

    // a beam with no matching shot is dropped entirely
    let empty = locator.locate_beam(&reader, defaults, "BEAM0001")?;
    assert!(empty.is_none());
    Ok(())
}

#[test]
fn test_locator_window_widens_over_interleaved_track() -> Result<()> {
    // shots 1, 3, 5 inside the ROI, 0, 2, 4 outside: the window spans the
    // full [1, 6) range even though only three shots match
    let coords = vec![
        (50.0, -121.0),
        (43.0, -121.0),
        (50.0, -121.0),
        (43.1, -121.0),
        (50.0, -121.0),
        (43.2, -121.0),
    ];
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(GRANULE_NAME);
    write_granule(&path, &[SyntheticBeam::new("BEAM0000", 1, &coords)])?;

    let catalog = VariableCatalog::new();
    let reader = GranuleReader::open(&path)?;
    let roi = roi();

    let located = FootprintLocator::new(&roi)
        .locate_beam(&reader, catalog.defaults(Product::L2A), "BEAM0000")?
        .expect("three shots intersect the ROI");
    assert_eq!(located.window, 1..6);
    assert_eq!(located.rows.len(), 3);
    let indices: Vec<usize> = located.rows.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![1, 3, 5]);
    Ok(())
}

#[test]
fn test_locator_roi_outside_all_beams() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(GRANULE_NAME);
    write_granule(&path, &[SyntheticBeam::new("BEAM0000", 1, &distant_track())])?;

    let catalog = VariableCatalog::new();
    let reader = GranuleReader::open(&path)?;
    let roi = roi();

    let located =
        FootprintLocator::new(&roi).locate_beam(&reader, catalog.defaults(Product::L2A), "BEAM0000")?;
    assert!(located.is_none());
    Ok(())
}

#[test]
fn test_reader_lists_only_requested_beams() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(GRANULE_NAME);
    write_granule(
        &path,
        &[
            SyntheticBeam::new("BEAM0000", 1, &split_track()),
            SyntheticBeam::new("BEAM0001", 100, &split_track()),
        ],
    )?;

    let reader = GranuleReader::open(&path)?;
    let beams = reader.beams(&["BEAM0001".to_string(), "BEAM1011".to_string()])?;
    assert_eq!(beams, vec!["BEAM0001".to_string()]);
    Ok(())
}
