//! Shared helpers: synthetic GEDI granules written with the hdf5 crate.
#![allow(dead_code)]

use ndarray::Array2;
use std::path::Path;

/// Granule filename carrying a valid acquisition code (2019, day 108)
pub const GRANULE_NAME: &str = "GEDI02_A_2019108002011_O01959_03_T03909_02_003_01_V002.h5";

/// One synthetic beam: shot coordinates plus a base shot number
pub struct SyntheticBeam {
    pub name: &'static str,
    pub first_shot: u64,
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
}

impl SyntheticBeam {
    pub fn new(name: &'static str, first_shot: u64, coords: &[(f64, f64)]) -> Self {
        Self {
            name,
            first_shot,
            lats: coords.iter().map(|c| c.0).collect(),
            lons: coords.iter().map(|c| c.1).collect(),
        }
    }
}

/// Waveform sample count for shot `i`: between 2 and 4 samples
pub fn waveform_count(i: usize) -> i64 {
    2 + (i % 3) as i64
}

/// One-based waveform start index for shot `i`
pub fn waveform_start(i: usize) -> i64 {
    (0..i).map(waveform_count).sum::<i64>() + 1
}

/// Write an L2A-shaped granule with the given beams.
///
/// Each beam carries per-shot sensitivity and quality_flag arrays, an
/// `rh` matrix with three columns, a length-one `ancillary_mean` scalar,
/// an `rxwaveform` buffer with its start and count index arrays, and a
/// one-hot `surface_type` indicator of five categories.
pub fn write_granule(path: &Path, beams: &[SyntheticBeam]) -> hdf5::Result<()> {
    let file = hdf5::File::create(path)?;
    for beam in beams {
        let n = beam.lats.len();
        let group = file.create_group(beam.name)?;

        let shots: Vec<u64> = (0..n as u64).map(|i| beam.first_shot + i).collect();
        group
            .new_dataset_builder()
            .with_data(&shots[..])
            .create("shot_number")?;
        group
            .new_dataset_builder()
            .with_data(&beam.lats[..])
            .create("lat_lowestmode")?;
        group
            .new_dataset_builder()
            .with_data(&beam.lons[..])
            .create("lon_lowestmode")?;

        let sensitivity: Vec<f64> = (0..n).map(|i| 0.9 + i as f64 * 0.01).collect();
        group
            .new_dataset_builder()
            .with_data(&sensitivity[..])
            .create("sensitivity")?;

        let quality: Vec<u8> = (0..n).map(|i| (i % 2) as u8).collect();
        group
            .new_dataset_builder()
            .with_data(&quality[..])
            .create("quality_flag")?;

        let rh = Array2::from_shape_fn((n, 3), |(i, j)| (i * 10 + j) as f64);
        group.new_dataset_builder().with_data(&rh).create("rh")?;

        let scalar = vec![42.5f64];
        group
            .new_dataset_builder()
            .with_data(&scalar[..])
            .create("ancillary_mean")?;

        let starts: Vec<i64> = (0..n).map(waveform_start).collect();
        let counts: Vec<i64> = (0..n).map(waveform_count).collect();
        let total: i64 = (0..n).map(waveform_count).sum();
        let wave: Vec<f64> = (1..=total).map(|v| v as f64).collect();
        group
            .new_dataset_builder()
            .with_data(&starts[..])
            .create("rx_sample_start_index")?;
        group
            .new_dataset_builder()
            .with_data(&counts[..])
            .create("rx_sample_count")?;
        group
            .new_dataset_builder()
            .with_data(&wave[..])
            .create("rxwaveform")?;

        let surface = Array2::from_shape_fn((5, n), |(c, i)| u8::from(c == i % 5));
        group
            .new_dataset_builder()
            .with_data(&surface)
            .create("surface_type")?;
    }
    Ok(())
}
