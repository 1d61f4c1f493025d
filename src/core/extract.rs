//! Variable extraction aligned to a beam's coarse-pass window.
//!
//! Science datasets come in a handful of storage shapes. Each requested
//! path is classified once against its on-disk shape into a closed
//! `ShapeClass`, and extraction dispatches on that tag:
//!
//! - per-shot vectors slice directly to the window;
//! - length-one scalars broadcast their single value to every row;
//! - 2-D matrices fan their second dimension out into suffixed columns;
//! - waveforms reconstruct each shot's sample run from start-index and
//!   count arrays into a shared flat buffer (start indices are 1-based on
//!   disk) and store it as one delimited sequence per shot;
//! - the surface-type indicator stores one row per surface category and
//!   becomes one column per category;
//! - anything else is logged and skipped without aborting the beam.

use crate::catalog::ProductDefaults;
use crate::io::GranuleReader;
use crate::types::{
    BeamColumns, BeamFootprints, Column, ColumnValues, FilterMode, GediError, GediResult,
};
use std::collections::HashSet;
use std::ops::Range;

/// Surface categories of the surface-type indicator, in on-disk row order
pub const SURFACE_CLASSES: [&str; 5] = ["land", "ocean", "sea_ice", "land_ice", "inland_water"];

/// Which sampling channel a waveform's index arrays belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformChannel {
    Rx,
    Tx,
}

impl WaveformChannel {
    fn prefix(&self) -> &'static str {
        match self {
            WaveformChannel::Rx => "rx",
            WaveformChannel::Tx => "tx",
        }
    }
}

/// Storage shape of a science dataset, resolved once per path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeClass {
    /// One value per shot
    PerShot,
    /// A single value broadcast to every shot
    Scalar,
    /// Two-dimensional, fanned out into `width` columns
    Matrix { width: usize },
    /// Run-length encoded sample sequence in a shared flat buffer
    Waveform { channel: WaveformChannel },
    /// Fixed multi-class surface indicator, one row per category
    SurfaceType,
    /// Nothing this extractor can handle
    Unknown,
}

/// A variable path with its resolved output column name and storage shape
#[derive(Debug, Clone)]
pub struct VariableSpec {
    pub path: String,
    pub column: String,
    pub shape: ShapeClass,
}

/// Output column name for a beam-relative dataset path
pub fn column_name(path: &str) -> String {
    path.replace('/', "_")
}

/// Classify a dataset by path and on-disk shape.
///
/// Waveforms, the theta-gap profile, and the surface-type indicator are
/// keyed by path, since their array lengths are unrelated to the shot
/// count. Everything else is classified structurally against the beam's
/// shot count.
pub fn classify(path: &str, shape: &[usize], shot_count: usize) -> ShapeClass {
    let leaf = path.rsplit('/').next().unwrap_or(path);
    if leaf.ends_with("waveform") {
        let channel = if leaf.starts_with("tx") {
            WaveformChannel::Tx
        } else {
            WaveformChannel::Rx
        };
        return ShapeClass::Waveform { channel };
    }
    if leaf == "pgap_theta_z" {
        // the theta-gap profile shares the rx sample index arrays
        return ShapeClass::Waveform {
            channel: WaveformChannel::Rx,
        };
    }
    if leaf == "surface_type" {
        return ShapeClass::SurfaceType;
    }
    match shape {
        [n] if *n == shot_count => ShapeClass::PerShot,
        [1] => ShapeClass::Scalar,
        [_, k] => ShapeClass::Matrix { width: *k },
        _ => ShapeClass::Unknown,
    }
}

/// Extracts the selected science datasets for located beams
pub struct VariableExtractor<'a> {
    reader: &'a GranuleReader,
    defaults: &'a ProductDefaults,
    sds_paths: &'a [String],
}

impl<'a> VariableExtractor<'a> {
    pub fn new(
        reader: &'a GranuleReader,
        defaults: &'a ProductDefaults,
        sds_paths: &'a [String],
    ) -> Self {
        Self {
            reader,
            defaults,
            sds_paths,
        }
    }

    /// Extract every requested variable for one located beam, row-aligned
    /// with the beam's extraction window.
    pub fn extract_beam(
        &self,
        footprints: &BeamFootprints,
        mode: FilterMode,
    ) -> GediResult<BeamColumns> {
        let beam = footprints.beam.as_str();
        let window = footprints.window.clone();

        let shot_count = self.reader.shot_count(beam, self.defaults.shot_number)?;
        let shots =
            self.reader
                .read_shot_numbers(beam, self.defaults.shot_number, Some(window.clone()))?;
        if shots.len() != window.len() {
            return Err(GediError::Processing(format!(
                "shot number window mismatch in {}: expected {} rows, read {}",
                beam,
                window.len(),
                shots.len()
            )));
        }

        let mut columns: Vec<Column> = Vec::new();
        for path in self.sds_paths {
            // Geometry and key columns are carried by the locator rows
            if path == self.defaults.latitude
                || path == self.defaults.longitude
                || path == self.defaults.shot_number
            {
                continue;
            }

            let Ok(ds) = self.reader.dataset(beam, path) else {
                log::warn!("SDS {}/{} not found, skipping", beam, path);
                continue;
            };
            let spec = VariableSpec {
                column: column_name(path),
                shape: classify(path, &ds.shape(), shot_count),
                path: path.clone(),
            };

            match spec.shape {
                ShapeClass::PerShot => match self.reader.read_column(&ds, Some(window.clone()))? {
                    Some(values) => columns.push(Column {
                        name: spec.column,
                        values,
                    }),
                    None => log::warn!(
                        "SDS {}/{} has an unsupported element type, skipping",
                        beam,
                        spec.path
                    ),
                },
                ShapeClass::Scalar => match self.reader.read_column(&ds, None)? {
                    Some(single) => match broadcast(&single, window.len()) {
                        Some(values) => columns.push(Column {
                            name: spec.column,
                            values,
                        }),
                        None => log::warn!("SDS {}/{} is empty, skipping", beam, spec.path),
                    },
                    None => log::warn!(
                        "SDS {}/{} has an unsupported element type, skipping",
                        beam,
                        spec.path
                    ),
                },
                ShapeClass::Matrix { width } => {
                    match self.reader.read_matrix_columns(&ds, &window)? {
                        Some(lanes) => {
                            log::debug!("{}/{} fans out into {} columns", beam, spec.path, width);
                            for (k, lane) in lanes.into_iter().enumerate() {
                                columns.push(Column {
                                    name: format!("{}_{}", spec.column, k),
                                    values: lane,
                                });
                            }
                        }
                        None => log::warn!(
                            "SDS {}/{} has an unsupported element type, skipping",
                            beam,
                            spec.path
                        ),
                    }
                }
                ShapeClass::Waveform { channel } => {
                    if let Some(column) = self.extract_waveform(beam, &ds, &spec, channel, &window)?
                    {
                        columns.push(column);
                    }
                }
                ShapeClass::SurfaceType => match self.reader.read_category_rows(&ds, &window)? {
                    Some(rows) => {
                        if rows.len() != SURFACE_CLASSES.len() {
                            log::warn!(
                                "{}/{} has {} surface categories, expected {}",
                                beam,
                                spec.path,
                                rows.len(),
                                SURFACE_CLASSES.len()
                            );
                        }
                        for (i, lane) in rows.into_iter().enumerate().take(SURFACE_CLASSES.len()) {
                            columns.push(Column {
                                name: SURFACE_CLASSES[i].to_string(),
                                values: lane,
                            });
                        }
                    }
                    None => log::warn!(
                        "SDS {}/{} has an unsupported element type, skipping",
                        beam,
                        spec.path
                    ),
                },
                ShapeClass::Unknown => {
                    log::warn!(
                        "SDS {}/{} does not match any known storage shape, skipping",
                        beam,
                        spec.path
                    );
                }
            }
        }

        // A misaligned column would corrupt rows at the join; abort instead
        for column in &columns {
            if column.values.len() != shots.len() {
                return Err(GediError::Processing(format!(
                    "column {} in {} has {} rows, expected {}",
                    column.name,
                    beam,
                    column.values.len(),
                    shots.len()
                )));
            }
        }

        let mut out = BeamColumns {
            beam: beam.to_string(),
            shot_number: shots,
            columns,
        };
        if mode == FilterMode::ExactShots {
            apply_exact_mask(&mut out, footprints);
        }
        Ok(out)
    }

    /// Reconstruct per-shot waveform runs from the channel's start-index
    /// and sample-count arrays into the shared flat buffer
    fn extract_waveform(
        &self,
        beam: &str,
        ds: &hdf5::Dataset,
        spec: &VariableSpec,
        channel: WaveformChannel,
        window: &Range<usize>,
    ) -> GediResult<Option<Column>> {
        let prefix = channel.prefix();
        let start_path = format!("{}_sample_start_index", prefix);
        let count_path = format!("{}_sample_count", prefix);

        if !self.reader.has_dataset(beam, &start_path) || !self.reader.has_dataset(beam, &count_path)
        {
            log::warn!(
                "SDS {}/{} is missing its {} or {} index arrays, skipping",
                beam,
                spec.path,
                start_path,
                count_path
            );
            return Ok(None);
        }

        let starts = self.reader.read_i64(beam, &start_path, Some(window.clone()))?;
        let counts = self.reader.read_i64(beam, &count_path, Some(window.clone()))?;

        let Some(buffer) = self.reader.read_column(ds, None)? else {
            log::warn!(
                "SDS {}/{} has an unsupported element type, skipping",
                beam,
                spec.path
            );
            return Ok(None);
        };
        let total = buffer.len();

        let mut sequences = Vec::with_capacity(starts.len());
        for (&start, &count) in starts.iter().zip(counts.iter()) {
            // Start indices are 1-based on disk
            let begin = ((start - 1).max(0) as usize).min(total);
            let end = begin.saturating_add(count.max(0) as usize).min(total);
            sequences.push(buffer.format_run(begin, end));
        }

        Ok(Some(Column {
            name: spec.column.clone(),
            values: ColumnValues::Text(sequences),
        }))
    }
}

/// Broadcast a single-element column to `len` rows, by value
fn broadcast(single: &ColumnValues, len: usize) -> Option<ColumnValues> {
    Some(match single {
        ColumnValues::Float(v) => ColumnValues::Float(vec![*v.first()?; len]),
        ColumnValues::Int(v) => ColumnValues::Int(vec![*v.first()?; len]),
        ColumnValues::UInt(v) => ColumnValues::UInt(vec![*v.first()?; len]),
        ColumnValues::Text(v) => ColumnValues::Text(vec![v.first()?.clone(); len]),
    })
}

/// Narrow an extracted beam down to exactly the coarse-pass survivors
fn apply_exact_mask(columns: &mut BeamColumns, footprints: &BeamFootprints) {
    let keep: HashSet<usize> = footprints.rows.iter().map(|r| r.index).collect();
    let mask: Vec<bool> = footprints
        .window
        .clone()
        .map(|i| keep.contains(&i))
        .collect();
    if mask.iter().all(|&k| k) {
        return;
    }
    columns.shot_number = columns
        .shot_number
        .iter()
        .zip(mask.iter())
        .filter(|(_, &k)| k)
        .map(|(&s, _)| s)
        .collect();
    for column in &mut columns.columns {
        column.values = column.values.filter_mask(&mask);
    }
}
