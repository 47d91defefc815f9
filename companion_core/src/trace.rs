//! Recorded sensor traces in CSV form.
//!
//! Red-channel traces have a `red` column, one row per frame. Motion traces
//! have `x`, `y` and `z` columns in m/s². Extra columns are ignored.

use crate::motion::Acceleration;
use crate::Result;
use csv::ReaderBuilder;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RedRow {
    red: f64,
}

/// Load a red-channel trace
pub fn load_red_trace(path: &Path) -> Result<Vec<f64>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut samples = Vec::new();
    for row in reader.deserialize() {
        let row: RedRow = row?;
        samples.push(row.red);
    }

    tracing::info!("Loaded {} red samples from {:?}", samples.len(), path);
    Ok(samples)
}

/// Load an accelerometer trace
pub fn load_motion_trace(path: &Path) -> Result<Vec<Acceleration>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut samples = Vec::new();
    for row in reader.deserialize() {
        let sample: Acceleration = row?;
        samples.push(sample);
    }

    tracing::info!("Loaded {} motion samples from {:?}", samples.len(), path);
    Ok(samples)
}
