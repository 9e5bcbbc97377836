use flurust::model::seatird::{NodeSeed, SeatirdScenario, StochasticSeatird};
use flurust::model::store::Variable;

fn main() -> anyhow::Result<()> {
    // One city, ~1.2M people, age pyramid split 90/10 across risk groups.
    let by_age = [80_000.0, 320_000.0, 420_000.0, 240_000.0, 140_000.0];
    let mut population = vec![vec![0.0; 2]; 5];
    for (a, &count) in by_age.iter().enumerate() {
        population[a][0] = count * 0.9;
        population[a][1] = count * 0.1;
    }

    let scenario = SeatirdScenario {
        nodes: vec![NodeSeed { id: 1, population }],
        seed: 42,
        ..Default::default()
    };

    let mut sim = StochasticSeatird::new(scenario)?;

    // Seed 20 infections among low-risk 25-49 year olds.
    sim.expose(20, 1, [2, 0, 0])?;

    println!("day,susceptible,exposed,infected,recovered,deceased");
    for _ in 0..180 {
        sim.simulate();
    }
    for day in 0..sim.num_times() {
        if day % 5 != 0 {
            continue;
        }
        println!(
            "{},{:.0},{:.0},{:.0},{:.0},{:.0}",
            day,
            sim.value(Variable::Susceptible, day, 1, &[])?,
            sim.value(Variable::Exposed, day, 1, &[])?,
            sim.infected(day, 1, &[])?,
            sim.value(Variable::Recovered, day, 1, &[])?,
            sim.value(Variable::Deceased, day, 1, &[])?,
        );
    }

    Ok(())
}
