//! Coarse footprint location.
//!
//! The locator reads the full shot-number and geolocation arrays for each
//! beam and keeps the shots whose point falls inside the ROI's bounding
//! envelope. From the surviving local indices it derives one contiguous
//! extraction window per beam. The window assumes ground-track ordering:
//! matching shots are expected to cluster along the index axis, so the
//! min..max span stays close to the match count. Shots inside the window
//! that did not match the envelope are discarded later at the shot-number
//! join, so the window only widens reads, never the output.

use crate::catalog::ProductDefaults;
use crate::io::GranuleReader;
use crate::types::{BeamFootprints, FootprintRow, GediError, GediResult, Roi};

/// Runs the coarse bounding-envelope pass per beam
pub struct FootprintLocator<'a> {
    roi: &'a Roi,
}

impl<'a> FootprintLocator<'a> {
    pub fn new(roi: &'a Roi) -> Self {
        Self { roi }
    }

    /// Locate the footprints of one beam inside the ROI envelope.
    ///
    /// Returns `None` when no shot matches; such a beam contributes no
    /// rows and is dropped from further processing.
    pub fn locate_beam(
        &self,
        reader: &GranuleReader,
        defaults: &ProductDefaults,
        beam: &str,
    ) -> GediResult<Option<BeamFootprints>> {
        let shots = reader.read_shot_numbers(beam, defaults.shot_number, None)?;
        let lats = reader.read_f64(beam, defaults.latitude, None)?;
        let lons = reader.read_f64(beam, defaults.longitude, None)?;

        if lats.len() != shots.len() || lons.len() != shots.len() {
            return Err(GediError::Processing(format!(
                "geolocation arrays are misaligned in {}: {} shots, {} latitudes, {} longitudes",
                beam,
                shots.len(),
                lats.len(),
                lons.len()
            )));
        }

        let mut rows = Vec::new();
        for (i, (&shot, (&lat, &lon))) in shots.iter().zip(lats.iter().zip(lons.iter())).enumerate()
        {
            if self.roi.envelope_contains(lon, lat) {
                rows.push(FootprintRow {
                    shot_number: shot,
                    latitude: lat,
                    longitude: lon,
                    index: i,
                });
            }
        }

        if rows.is_empty() {
            log::debug!("No intersecting shots found for {}", beam);
            return Ok(None);
        }

        // Indices are ascending by construction
        let start = rows[0].index;
        let end = rows[rows.len() - 1].index + 1;
        log::debug!(
            "{}: {} of {} shots inside the ROI envelope, window [{}, {})",
            beam,
            rows.len(),
            shots.len(),
            start,
            end
        );

        Ok(Some(BeamFootprints {
            beam: beam.to_string(),
            window: start..end,
            rows,
        }))
    }
}
