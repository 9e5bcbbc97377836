use anyhow::Context;
use serde::Deserialize;

use crate::model::seatird::TravelEdge;

#[derive(Debug, Deserialize)]
struct TravelRow {
    sink: u32,
    source: u32,
    fraction: f64,
}

/// Load the travel-fraction edge list from a CSV file with columns:
/// `sink,source,fraction`. Self-edges and zero fractions are dropped.
pub fn load_travel_csv(path: &str) -> anyhow::Result<Vec<TravelEdge>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open travel CSV: {}", path))?;

    let mut edges = Vec::new();
    for result in rdr.deserialize::<TravelRow>() {
        let row = result?;
        anyhow::ensure!(
            (0.0..=1.0).contains(&row.fraction),
            "travel fraction {} -> {} must be in [0, 1]",
            row.source,
            row.sink
        );
        if row.sink != row.source && row.fraction > 0.0 {
            edges.push(TravelEdge {
                sink: row.sink,
                source: row.source,
                fraction: row.fraction,
            });
        }
    }
    Ok(edges)
}
