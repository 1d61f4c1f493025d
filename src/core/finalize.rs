//! Merging and the exact polygon clip.
//!
//! The finalizer joins the locator's geometry rows to the extractor's
//! variable rows on shot number. The join is inner and narrowing: a
//! geometry row without variable data, or variable data without a
//! geometry row, is dropped rather than treated as an error. Surviving
//! rows are then tested against the exact ROI polygon, which for a
//! rectangular ROI coincides with the envelope but stays a separate pass.

use crate::types::{
    BeamColumns, BeamFootprints, FieldKind, GediResult, OutputRow, OutputTable, Roi,
};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Builds the final output table from located footprints and extracted
/// variables
pub struct GeometryFinalizer<'a> {
    roi: &'a Roi,
}

impl<'a> GeometryFinalizer<'a> {
    pub fn new(roi: &'a Roi) -> Self {
        Self { roi }
    }

    /// Join geometry and variable rows, clip to the exact ROI polygon,
    /// and attach the acquisition date.
    ///
    /// An empty row set is a valid result; the caller decides whether to
    /// treat it as a no-intersection outcome.
    pub fn finalize(
        &self,
        footprints: &[BeamFootprints],
        variables: &[BeamColumns],
        date: NaiveDate,
    ) -> GediResult<OutputTable> {
        // Stable first-appearance schema across beams
        let mut schema: Vec<(String, FieldKind)> = Vec::new();
        let mut schema_index: HashMap<String, usize> = HashMap::new();
        for beam in variables {
            for column in &beam.columns {
                if !schema_index.contains_key(&column.name) {
                    schema_index.insert(column.name.clone(), schema.len());
                    schema.push((column.name.clone(), column.values.field_kind()));
                }
            }
        }

        let by_beam: HashMap<&str, &BeamColumns> =
            variables.iter().map(|b| (b.beam.as_str(), b)).collect();

        let mut rows = Vec::new();
        let mut coarse = 0usize;
        for fp in footprints {
            let Some(beam_columns) = by_beam.get(fp.beam.as_str()) else {
                continue;
            };
            // Shot number to row position within the beam's extraction rows
            let positions: HashMap<u64, usize> = beam_columns
                .shot_number
                .iter()
                .enumerate()
                .map(|(i, &s)| (s, i))
                .collect();

            for row in &fp.rows {
                coarse += 1;
                let Some(&pos) = positions.get(&row.shot_number) else {
                    continue;
                };
                // Non-finite coordinates cannot form a valid geometry
                if !row.latitude.is_finite() || !row.longitude.is_finite() {
                    continue;
                }
                if !self.roi.polygon_contains(row.longitude, row.latitude) {
                    continue;
                }

                let mut values = vec![None; schema.len()];
                for column in &beam_columns.columns {
                    if let Some(&slot) = schema_index.get(&column.name) {
                        values[slot] = column.values.get(pos);
                    }
                }
                rows.push(OutputRow {
                    beam: fp.beam.clone(),
                    shot_number: row.shot_number,
                    longitude: row.longitude,
                    latitude: row.latitude,
                    values,
                });
            }
        }

        log::debug!("Exact clip kept {} of {} coarse-pass rows", rows.len(), coarse);
        Ok(OutputTable { schema, rows, date })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CellValue, Column, ColumnValues, FootprintRow};

    fn roi() -> Roi {
        Roi::new(44.0, -122.0, 42.0, -120.0).unwrap()
    }

    fn footprints(beam: &str, rows: Vec<(u64, f64, f64, usize)>) -> BeamFootprints {
        let window = rows.first().map(|r| r.3).unwrap_or(0)
            ..rows.last().map(|r| r.3 + 1).unwrap_or(0);
        BeamFootprints {
            beam: beam.to_string(),
            window,
            rows: rows
                .into_iter()
                .map(|(shot_number, latitude, longitude, index)| FootprintRow {
                    shot_number,
                    latitude,
                    longitude,
                    index,
                })
                .collect(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 4, 18).unwrap()
    }

    #[test]
    fn test_join_and_clip() {
        let roi = roi();
        let fp = footprints(
            "BEAM0000",
            vec![(10, 43.0, -121.0, 0), (11, 43.1, -121.1, 1)],
        );
        let vars = vec![BeamColumns {
            beam: "BEAM0000".to_string(),
            shot_number: vec![10, 11],
            columns: vec![Column {
                name: "sensitivity".to_string(),
                values: ColumnValues::Float(vec![0.9, 0.95]),
            }],
        }];

        let finalizer = GeometryFinalizer::new(&roi);
        let table = finalizer.finalize(&[fp], &vars, date()).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.schema, vec![("sensitivity".to_string(), FieldKind::Real)]);
        assert_eq!(table.rows[0].values[0], Some(CellValue::Float(0.9)));
    }

    #[test]
    fn test_join_narrows_on_missing_variable_row() {
        let roi = roi();
        let fp = footprints(
            "BEAM0000",
            vec![(10, 43.0, -121.0, 0), (11, 43.1, -121.1, 1)],
        );
        // variable rows only cover shot 11
        let vars = vec![BeamColumns {
            beam: "BEAM0000".to_string(),
            shot_number: vec![11],
            columns: vec![],
        }];

        let table = GeometryFinalizer::new(&roi)
            .finalize(&[fp], &vars, date())
            .unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].shot_number, 11);
    }

    #[test]
    fn test_exact_clip_drops_outside_rows() {
        let roi = roi();
        // shot 11 passed a hypothetical coarse pass but lies outside the
        // exact polygon
        let fp = footprints(
            "BEAM0000",
            vec![(10, 43.0, -121.0, 0), (11, 45.0, -121.0, 1)],
        );
        let vars = vec![BeamColumns {
            beam: "BEAM0000".to_string(),
            shot_number: vec![10, 11],
            columns: vec![],
        }];

        let table = GeometryFinalizer::new(&roi)
            .finalize(&[fp], &vars, date())
            .unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].shot_number, 10);
    }

    #[test]
    fn test_invalid_coordinates_are_dropped() {
        let roi = roi();
        let fp = footprints(
            "BEAM0000",
            vec![(10, f64::NAN, -121.0, 0), (11, 43.1, -121.1, 1)],
        );
        let vars = vec![BeamColumns {
            beam: "BEAM0000".to_string(),
            shot_number: vec![10, 11],
            columns: vec![],
        }];

        let table = GeometryFinalizer::new(&roi)
            .finalize(&[fp], &vars, date())
            .unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].shot_number, 11);
    }

    #[test]
    fn test_schema_union_across_beams() {
        let roi = roi();
        let fps = vec![
            footprints("BEAM0000", vec![(10, 43.0, -121.0, 0)]),
            footprints("BEAM0001", vec![(20, 43.2, -121.2, 0)]),
        ];
        let vars = vec![
            BeamColumns {
                beam: "BEAM0000".to_string(),
                shot_number: vec![10],
                columns: vec![Column {
                    name: "sensitivity".to_string(),
                    values: ColumnValues::Float(vec![0.9]),
                }],
            },
            BeamColumns {
                beam: "BEAM0001".to_string(),
                shot_number: vec![20],
                columns: vec![Column {
                    name: "quality_flag".to_string(),
                    values: ColumnValues::Int(vec![1]),
                }],
            },
        ];

        let table = GeometryFinalizer::new(&roi)
            .finalize(&fps, &vars, date())
            .unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.schema.len(), 2);
        // the beam without a column leaves that slot unset
        assert_eq!(table.rows[0].values[1], None);
        assert_eq!(table.rows[1].values[0], None);
    }
}
