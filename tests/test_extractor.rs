mod common;

use common::{waveform_count, waveform_start, write_granule, SyntheticBeam, GRANULE_NAME};
use gedisub::core::{FootprintLocator, VariableExtractor, SURFACE_CLASSES};
use gedisub::io::GranuleReader;
use gedisub::types::{CellValue, ColumnValues, FilterMode, Product, Roi};
use gedisub::VariableCatalog;

fn roi() -> Roi {
    Roi::new(44.0, -122.0, 42.0, -120.0).unwrap()
}

/// Ten shots, all inside the ROI
fn inside_track() -> Vec<(f64, f64)> {
    (0..10)
        .map(|i| (43.0 + i as f64 * 0.01, -121.0 + i as f64 * 0.01))
        .collect()
}

struct Extracted {
    columns: gedisub::types::BeamColumns,
}

impl Extracted {
    fn column(&self, name: &str) -> &ColumnValues {
        &self
            .columns
            .columns
            .iter()
            .find(|c| c.name == name)
            .unwrap_or_else(|| panic!("missing column {}", name))
            .values
    }

    fn has_column(&self, name: &str) -> bool {
        self.columns.columns.iter().any(|c| c.name == name)
    }
}

fn extract(extra_sds: Option<&str>, mode: FilterMode, coords: &[(f64, f64)]) -> Extracted {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(GRANULE_NAME);
    write_granule(&path, &[SyntheticBeam::new("BEAM0000", 5000, coords)]).unwrap();

    let catalog = VariableCatalog::new();
    let defaults = catalog.defaults(Product::L2A);
    let sds_paths = catalog.resolve_sds(Product::L2A, extra_sds);
    let reader = GranuleReader::open(&path).unwrap();
    let roi = roi();

    let located = FootprintLocator::new(&roi)
        .locate_beam(&reader, defaults, "BEAM0000")
        .unwrap()
        .expect("track intersects the ROI");
    let extractor = VariableExtractor::new(&reader, defaults, &sds_paths);
    Extracted {
        columns: extractor.extract_beam(&located, mode).unwrap(),
    }
}

#[test]
fn test_per_shot_vector_slices_directly() {
    let extracted = extract(None, FilterMode::RangeWindow, &inside_track());
    assert_eq!(extracted.columns.shot_number, (5000..5010).collect::<Vec<u64>>());

    let ColumnValues::Float(sensitivity) = extracted.column("sensitivity") else {
        panic!("sensitivity should be a float column");
    };
    assert_eq!(sensitivity.len(), 10);
    for (i, v) in sensitivity.iter().enumerate() {
        approx::assert_relative_eq!(*v, 0.9 + i as f64 * 0.01);
    }

    // integer flags keep their unsigned family
    let ColumnValues::UInt(quality) = extracted.column("quality_flag") else {
        panic!("quality_flag should be an unsigned column");
    };
    assert_eq!(quality[0], 0);
    assert_eq!(quality[1], 1);
}

#[test]
fn test_matrix_fans_out_into_suffixed_columns() {
    let extracted = extract(None, FilterMode::RangeWindow, &inside_track());

    for k in 0..3 {
        let name = format!("rh_{}", k);
        let ColumnValues::Float(values) = extracted.column(&name) else {
            panic!("{} should be a float column", name);
        };
        assert_eq!(values.len(), 10);
        for (i, v) in values.iter().enumerate() {
            approx::assert_relative_eq!(*v, (i * 10 + k) as f64);
        }
    }
    assert!(!extracted.has_column("rh_3"));
}

#[test]
fn test_scalar_broadcasts_to_every_row() {
    let extracted = extract(Some("ancillary_mean"), FilterMode::RangeWindow, &inside_track());
    let ColumnValues::Float(values) = extracted.column("ancillary_mean") else {
        panic!("ancillary_mean should be a float column");
    };
    assert_eq!(values, &vec![42.5; 10]);
}

#[test]
fn test_waveform_round_trip() {
    let extracted = extract(Some("rxwaveform"), FilterMode::RangeWindow, &inside_track());
    let ColumnValues::Text(sequences) = extracted.column("rxwaveform") else {
        panic!("rxwaveform should be a text column");
    };
    assert_eq!(sequences.len(), 10);

    // shot k covers buffer positions [start[k]-1, start[k]-1+count[k])
    // where the buffer holds 1, 2, 3, ... in order
    for (k, seq) in sequences.iter().enumerate() {
        let start = waveform_start(k);
        let count = waveform_count(k);
        let expected: Vec<String> = (start..start + count).map(|v| v.to_string()).collect();
        assert_eq!(seq, &expected.join(","), "waveform of shot {}", k);
    }
}

#[test]
fn test_surface_type_yields_one_hot_indicator_columns() {
    let extracted = extract(Some("surface_type"), FilterMode::RangeWindow, &inside_track());

    let categories: Vec<&ColumnValues> = SURFACE_CLASSES
        .iter()
        .map(|name| extracted.column(name))
        .collect();

    for row in 0..10 {
        let set: usize = categories
            .iter()
            .map(|col| match col.get(row) {
                Some(CellValue::UInt(v)) => (v != 0) as usize,
                Some(CellValue::Int(v)) => (v != 0) as usize,
                other => panic!("unexpected surface indicator {:?}", other),
            })
            .sum();
        // zero or multiple set categories would be a data anomaly
        assert_eq!(set, 1, "row {} should have exactly one surface category", row);
    }
}

#[test]
fn test_missing_variable_is_skipped_not_fatal() {
    // the L2A defaults request datasets the synthetic granule does not
    // carry, and an explicit bogus extra path on top
    let extracted = extract(Some("no_such_variable"), FilterMode::RangeWindow, &inside_track());
    assert!(!extracted.has_column("no_such_variable"));
    assert!(!extracted.has_column("delta_time"));
    // the available defaults still extracted fine
    assert!(extracted.has_column("sensitivity"));
}

#[test]
fn test_exact_mode_masks_interleaved_rows() {
    // shots 1, 3, 5 inside the ROI, the rest outside
    let coords = vec![
        (50.0, -121.0),
        (43.0, -121.0),
        (50.0, -121.0),
        (43.1, -121.0),
        (50.0, -121.0),
        (43.2, -121.0),
    ];

    let ranged = extract(None, FilterMode::RangeWindow, &coords);
    assert_eq!(ranged.columns.shot_number.len(), 5); // window [1, 6)

    let exact = extract(None, FilterMode::ExactShots, &coords);
    assert_eq!(exact.columns.shot_number, vec![5001, 5003, 5005]);
    let ColumnValues::Float(sensitivity) = exact.column("sensitivity") else {
        panic!("sensitivity should be a float column");
    };
    approx::assert_relative_eq!(sensitivity[0], 0.91);
    approx::assert_relative_eq!(sensitivity[1], 0.93);
    approx::assert_relative_eq!(sensitivity[2], 0.95);
}
