use flurust::io::debug_log::write_run_log;
use flurust::model::npi::Npi;
use flurust::model::params::{Parameters, PriorityGroup};
use flurust::model::seatird::{
    NodeSeed, SeatirdScenario, StockpileSeed, StochasticSeatird, TravelEdge,
};
use flurust::model::store::Variable;

fn city(id: u32, scale: f64) -> NodeSeed {
    let by_age = [60_000.0, 250_000.0, 330_000.0, 190_000.0, 110_000.0];
    let mut population = vec![vec![0.0; 2]; 5];
    for (a, &count) in by_age.iter().enumerate() {
        population[a][0] = count * scale * 0.85;
        population[a][1] = count * scale * 0.15;
    }
    NodeSeed { id, population }
}

fn main() -> anyhow::Result<()> {
    // Two connected cities. Antivirals prioritize the high-risk groups,
    // schools close in the first city for a month.
    let parameters = Parameters {
        antiviral_priority_groups: vec![PriorityGroup {
            name: "high risk".into(),
            ages: Vec::new(),
            risk_groups: vec![1],
            vaccinated: Vec::new(),
        }],
        npis: vec![Npi {
            name: "school closure".into(),
            node_ids: vec![1],
            start_day: 20,
            end_day: 50,
            from_age_groups: vec![0, 1],
            to_age_groups: vec![0, 1],
            effectiveness: 0.6,
        }],
        ..Parameters::default()
    };

    let scenario = SeatirdScenario {
        nodes: vec![city(1, 1.0), city(2, 0.6)],
        travel: vec![
            TravelEdge { sink: 2, source: 1, fraction: 0.02 },
            TravelEdge { sink: 1, source: 2, fraction: 0.03 },
        ],
        stockpiles: vec![
            StockpileSeed { node_id: 1, antivirals: 40_000, vaccines: 100_000 },
            StockpileSeed { node_id: 2, antivirals: 25_000, vaccines: 60_000 },
        ],
        parameters,
        seed: 7,
        ..Default::default()
    };

    let mut sim = StochasticSeatird::new(scenario)?;
    sim.expose(50, 1, [2, 0, 0])?;

    for _ in 0..120 {
        sim.simulate();
    }

    let mut susceptible = Vec::new();
    let mut exposed = Vec::new();
    let mut infected = Vec::new();
    let mut deceased = Vec::new();
    let mut ili = Vec::new();
    for day in 0..sim.num_times() {
        let mut totals = [0.0; 5];
        for &id in &[1, 2] {
            totals[0] += sim.value(Variable::Susceptible, day, id, &[])?;
            totals[1] += sim.value(Variable::Exposed, day, id, &[])?;
            totals[2] += sim.infected(day, id, &[])?;
            totals[3] += sim.value(Variable::Deceased, day, id, &[])?;
            totals[4] += sim.ili(day, id)?;
        }
        susceptible.push(totals[0]);
        exposed.push(totals[1]);
        infected.push(totals[2]);
        deceased.push(totals[3]);
        ili.push(totals[4]);
    }

    let path = write_run_log(
        "logs",
        "two-cities",
        7,
        &susceptible,
        &exposed,
        &infected,
        &deceased,
        &ili,
    )?;
    println!("run log written to {:?}", path);

    println!("day,infected_city1,infected_city2");
    for day in (0..sim.num_times()).step_by(5) {
        println!(
            "{},{:.0},{:.0}",
            day,
            sim.infected(day, 1, &[])?,
            sim.infected(day, 2, &[])?,
        );
    }

    Ok(())
}
