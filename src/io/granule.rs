//! Read access to GEDI granules.
//!
//! A granule is one HDF5 file partitioned into beam groups, each group
//! holding one array per science dataset. All reads are typed against the
//! on-disk element type and widened into the crate's column model, so no
//! HDF5-side value conversion is required.

use crate::types::{ColumnValues, GediError, GediResult};
use chrono::NaiveDate;
use hdf5::types::{FloatSize, IntSize, TypeDescriptor};
use hdf5::{Dataset, File, H5Type};
use ndarray::{s, Array1, Array2};
use num_traits::ToPrimitive;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Read-only handle on one GEDI granule
pub struct GranuleReader {
    path: PathBuf,
    file: File,
}

impl GranuleReader {
    /// Open a granule file read-only
    pub fn open<P: AsRef<Path>>(path: P) -> GediResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(GediError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("granule not found: {}", path.display()),
            )));
        }
        log::debug!("Opening granule: {}", path.display());
        let file = File::open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Final path component of the granule file
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Beam groups present in both the file and the allowlist, in
    /// allowlist order
    pub fn beams(&self, allowlist: &[String]) -> GediResult<Vec<String>> {
        let members = self.file.member_names()?;
        Ok(allowlist
            .iter()
            .filter(|beam| members.iter().any(|m| m == *beam))
            .cloned()
            .collect())
    }

    /// Look up a dataset by beam group and beam-relative path
    pub fn dataset(&self, beam: &str, sds_path: &str) -> GediResult<Dataset> {
        Ok(self.file.dataset(&format!("{}/{}", beam, sds_path))?)
    }

    pub fn has_dataset(&self, beam: &str, sds_path: &str) -> bool {
        self.file.dataset(&format!("{}/{}", beam, sds_path)).is_ok()
    }

    /// Number of shots along a beam, taken from its shot-number array
    pub fn shot_count(&self, beam: &str, shot_path: &str) -> GediResult<usize> {
        let ds = self.dataset(beam, shot_path)?;
        ds.shape().first().copied().ok_or_else(|| {
            GediError::Processing(format!("{}/{} has no extent", beam, shot_path))
        })
    }

    /// Read shot numbers for one beam, optionally restricted to a window
    pub fn read_shot_numbers(
        &self,
        beam: &str,
        shot_path: &str,
        window: Option<Range<usize>>,
    ) -> GediResult<Vec<u64>> {
        let ds = self.dataset(beam, shot_path)?;
        self.read_column(&ds, window)?
            .and_then(coerce_u64)
            .ok_or_else(|| {
                GediError::Processing(format!(
                    "{}/{} has an unsupported shot number type",
                    beam, shot_path
                ))
            })
    }

    /// Read a numeric dataset as f64 values
    pub fn read_f64(
        &self,
        beam: &str,
        sds_path: &str,
        window: Option<Range<usize>>,
    ) -> GediResult<Vec<f64>> {
        let ds = self.dataset(beam, sds_path)?;
        self.read_column(&ds, window)?
            .and_then(coerce_f64)
            .ok_or_else(|| {
                GediError::Processing(format!("{}/{} is not a numeric dataset", beam, sds_path))
            })
    }

    /// Read a numeric dataset as i64 index values (waveform start and
    /// count arrays)
    pub fn read_i64(
        &self,
        beam: &str,
        sds_path: &str,
        window: Option<Range<usize>>,
    ) -> GediResult<Vec<i64>> {
        let ds = self.dataset(beam, sds_path)?;
        self.read_column(&ds, window)?
            .and_then(coerce_i64)
            .ok_or_else(|| {
                GediError::Processing(format!("{}/{} is not a numeric dataset", beam, sds_path))
            })
    }

    /// Read a 1-D dataset into the column model, preserving its numeric
    /// family. Returns `None` for element types the model cannot carry.
    pub fn read_column(
        &self,
        ds: &Dataset,
        window: Option<Range<usize>>,
    ) -> GediResult<Option<ColumnValues>> {
        let w = window.as_ref();
        let values = match ds.dtype()?.to_descriptor()? {
            TypeDescriptor::Float(FloatSize::U4) => {
                ColumnValues::Float(widen_f64(read_1d_vec::<f32>(ds, w)?))
            }
            TypeDescriptor::Float(FloatSize::U8) => {
                ColumnValues::Float(read_1d_vec::<f64>(ds, w)?)
            }
            TypeDescriptor::Integer(IntSize::U1) => {
                ColumnValues::Int(widen_i64(read_1d_vec::<i8>(ds, w)?))
            }
            TypeDescriptor::Integer(IntSize::U2) => {
                ColumnValues::Int(widen_i64(read_1d_vec::<i16>(ds, w)?))
            }
            TypeDescriptor::Integer(IntSize::U4) => {
                ColumnValues::Int(widen_i64(read_1d_vec::<i32>(ds, w)?))
            }
            TypeDescriptor::Integer(IntSize::U8) => {
                ColumnValues::Int(read_1d_vec::<i64>(ds, w)?)
            }
            TypeDescriptor::Unsigned(IntSize::U1) => {
                ColumnValues::UInt(widen_u64(read_1d_vec::<u8>(ds, w)?))
            }
            TypeDescriptor::Unsigned(IntSize::U2) => {
                ColumnValues::UInt(widen_u64(read_1d_vec::<u16>(ds, w)?))
            }
            TypeDescriptor::Unsigned(IntSize::U4) => {
                ColumnValues::UInt(widen_u64(read_1d_vec::<u32>(ds, w)?))
            }
            TypeDescriptor::Unsigned(IntSize::U8) => {
                ColumnValues::UInt(read_1d_vec::<u64>(ds, w)?)
            }
            _ => return Ok(None),
        };
        Ok(Some(values))
    }

    /// Read a 2-D matrix dataset with shots along the first axis, sliced to
    /// the shot window, fanned out into one column per second-axis element
    pub fn read_matrix_columns(
        &self,
        ds: &Dataset,
        window: &Range<usize>,
    ) -> GediResult<Option<Vec<ColumnValues>>> {
        read_2d_native(ds, window, true)
    }

    /// Read a 2-D categorical dataset with one row per category and shots
    /// along the second axis, sliced to the shot window, one column per
    /// category row
    pub fn read_category_rows(
        &self,
        ds: &Dataset,
        window: &Range<usize>,
    ) -> GediResult<Option<Vec<ColumnValues>>> {
        read_2d_native(ds, window, false)
    }

    /// Acquisition date embedded in the granule filename.
    ///
    /// GEDI filenames carry a 13-digit timestamp whose first seven digits
    /// are the year and day of year, e.g.
    /// `GEDI02_A_2019108002011_O01959_..._V002.h5` acquired on day 108 of
    /// 2019.
    pub fn acquisition_date(&self) -> GediResult<NaiveDate> {
        date_from_granule_name(&self.file_name())
    }
}

/// Parse the day-of-year acquisition code out of a granule filename
pub fn date_from_granule_name(name: &str) -> GediResult<NaiveDate> {
    let re = regex::Regex::new(r"(\d{7})\d{6}")
        .map_err(|e| GediError::Processing(format!("date pattern failed to compile: {}", e)))?;
    let code = re
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            GediError::Processing(format!(
                "no acquisition code found in granule name '{}'",
                name
            ))
        })?;
    NaiveDate::parse_from_str(&code, "%Y%j").map_err(|e| {
        GediError::Processing(format!(
            "invalid acquisition code '{}' in granule name: {}",
            code, e
        ))
    })
}

fn read_1d_vec<T: H5Type + Clone>(
    ds: &Dataset,
    window: Option<&Range<usize>>,
) -> GediResult<Vec<T>> {
    let arr: Array1<T> = match window {
        Some(w) => ds.read_slice_1d(s![w.start..w.end])?,
        None => ds.read_1d()?,
    };
    Ok(arr.to_vec())
}

fn read_2d_lanes<T: H5Type + Clone>(
    ds: &Dataset,
    window: &Range<usize>,
    shots_first: bool,
) -> GediResult<Vec<Vec<T>>> {
    let arr: Array2<T> = if shots_first {
        ds.read_slice_2d(s![window.start..window.end, ..])?
    } else {
        ds.read_slice_2d(s![.., window.start..window.end])?
    };
    let lanes = if shots_first {
        (0..arr.ncols()).map(|k| arr.column(k).to_vec()).collect()
    } else {
        (0..arr.nrows()).map(|r| arr.row(r).to_vec()).collect()
    };
    Ok(lanes)
}

fn read_2d_native(
    ds: &Dataset,
    window: &Range<usize>,
    shots_first: bool,
) -> GediResult<Option<Vec<ColumnValues>>> {
    let lanes = match ds.dtype()?.to_descriptor()? {
        TypeDescriptor::Float(FloatSize::U4) => read_2d_lanes::<f32>(ds, window, shots_first)?
            .into_iter()
            .map(|l| ColumnValues::Float(widen_f64(l)))
            .collect(),
        TypeDescriptor::Float(FloatSize::U8) => read_2d_lanes::<f64>(ds, window, shots_first)?
            .into_iter()
            .map(ColumnValues::Float)
            .collect(),
        TypeDescriptor::Integer(IntSize::U1) => read_2d_lanes::<i8>(ds, window, shots_first)?
            .into_iter()
            .map(|l| ColumnValues::Int(widen_i64(l)))
            .collect(),
        TypeDescriptor::Integer(IntSize::U2) => read_2d_lanes::<i16>(ds, window, shots_first)?
            .into_iter()
            .map(|l| ColumnValues::Int(widen_i64(l)))
            .collect(),
        TypeDescriptor::Integer(IntSize::U4) => read_2d_lanes::<i32>(ds, window, shots_first)?
            .into_iter()
            .map(|l| ColumnValues::Int(widen_i64(l)))
            .collect(),
        TypeDescriptor::Integer(IntSize::U8) => read_2d_lanes::<i64>(ds, window, shots_first)?
            .into_iter()
            .map(ColumnValues::Int)
            .collect(),
        TypeDescriptor::Unsigned(IntSize::U1) => read_2d_lanes::<u8>(ds, window, shots_first)?
            .into_iter()
            .map(|l| ColumnValues::UInt(widen_u64(l)))
            .collect(),
        TypeDescriptor::Unsigned(IntSize::U2) => read_2d_lanes::<u16>(ds, window, shots_first)?
            .into_iter()
            .map(|l| ColumnValues::UInt(widen_u64(l)))
            .collect(),
        TypeDescriptor::Unsigned(IntSize::U4) => read_2d_lanes::<u32>(ds, window, shots_first)?
            .into_iter()
            .map(|l| ColumnValues::UInt(widen_u64(l)))
            .collect(),
        TypeDescriptor::Unsigned(IntSize::U8) => read_2d_lanes::<u64>(ds, window, shots_first)?
            .into_iter()
            .map(ColumnValues::UInt)
            .collect(),
        _ => return Ok(None),
    };
    Ok(Some(lanes))
}

fn widen_f64<T: ToPrimitive>(v: Vec<T>) -> Vec<f64> {
    v.into_iter()
        .map(|x| x.to_f64().unwrap_or(f64::NAN))
        .collect()
}

fn widen_i64<T: ToPrimitive>(v: Vec<T>) -> Vec<i64> {
    v.into_iter().map(|x| x.to_i64().unwrap_or(0)).collect()
}

fn widen_u64<T: ToPrimitive>(v: Vec<T>) -> Vec<u64> {
    v.into_iter().map(|x| x.to_u64().unwrap_or(0)).collect()
}

fn coerce_f64(values: ColumnValues) -> Option<Vec<f64>> {
    match values {
        ColumnValues::Float(v) => Some(v),
        ColumnValues::Int(v) => Some(v.into_iter().map(|x| x as f64).collect()),
        ColumnValues::UInt(v) => Some(v.into_iter().map(|x| x as f64).collect()),
        ColumnValues::Text(_) => None,
    }
}

fn coerce_i64(values: ColumnValues) -> Option<Vec<i64>> {
    match values {
        ColumnValues::Float(v) => Some(v.into_iter().map(|x| x as i64).collect()),
        ColumnValues::Int(v) => Some(v),
        ColumnValues::UInt(v) => Some(v.into_iter().map(|x| x as i64).collect()),
        ColumnValues::Text(_) => None,
    }
}

fn coerce_u64(values: ColumnValues) -> Option<Vec<u64>> {
    match values {
        ColumnValues::Float(v) => Some(v.into_iter().map(|x| x as u64).collect()),
        ColumnValues::Int(v) => Some(v.into_iter().map(|x| x as u64).collect()),
        ColumnValues::UInt(v) => Some(v),
        ColumnValues::Text(_) => None,
    }
}
