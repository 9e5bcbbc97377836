use anyhow::Context;
use serde::Deserialize;

use crate::model::seatird::NodeSeed;
use crate::model::{NUM_AGE_GROUPS, NUM_RISK_GROUPS};

#[derive(Debug, Deserialize)]
struct PopulationRow {
    node_id: u32,
    age_group: usize,
    risk_group: usize,
    pop: f64,
}

/// Load stratified node populations from a CSV file with columns:
/// `node_id,age_group,risk_group,pop`. Rows for the same node accumulate;
/// nodes appear in first-row order.
pub fn load_population_csv(path: &str) -> anyhow::Result<Vec<NodeSeed>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open population CSV: {}", path))?;

    let mut nodes: Vec<NodeSeed> = Vec::new();
    for result in rdr.deserialize::<PopulationRow>() {
        let row = result?;
        anyhow::ensure!(
            row.age_group < NUM_AGE_GROUPS && row.risk_group < NUM_RISK_GROUPS,
            "population row for node {} has stratum ({}, {}) out of range",
            row.node_id,
            row.age_group,
            row.risk_group
        );

        let idx = match nodes.iter().position(|n| n.id == row.node_id) {
            Some(idx) => idx,
            None => {
                nodes.push(NodeSeed {
                    id: row.node_id,
                    population: vec![vec![0.0; NUM_RISK_GROUPS]; NUM_AGE_GROUPS],
                });
                nodes.len() - 1
            }
        };
        nodes[idx].population[row.age_group][row.risk_group] += row.pop.max(0.0);
    }

    anyhow::ensure!(!nodes.is_empty(), "population CSV empty or unparsable");
    Ok(nodes)
}
