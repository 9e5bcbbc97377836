use std::io::Write;

use flurust::io::population::load_population_csv;
use flurust::io::travel::load_travel_csv;
use flurust::model::seatird::{SeatirdScenario, StochasticSeatird};

#[test]
fn population_and_travel_csv_build_a_scenario() {
    let dir = tempfile::tempdir().expect("tempdir");

    let population_path = dir.path().join("population.csv");
    let mut f = std::fs::File::create(&population_path).unwrap();
    writeln!(f, "node_id,age_group,risk_group,pop").unwrap();
    writeln!(f, "1,0,0,4000").unwrap();
    writeln!(f, "1,2,0,5000").unwrap();
    writeln!(f, "1,2,1,1000").unwrap();
    writeln!(f, "2,2,0,8000").unwrap();
    drop(f);

    let travel_path = dir.path().join("travel.csv");
    let mut f = std::fs::File::create(&travel_path).unwrap();
    writeln!(f, "sink,source,fraction").unwrap();
    writeln!(f, "2,1,0.05").unwrap();
    writeln!(f, "1,1,0.5").unwrap();
    writeln!(f, "1,2,0.0").unwrap();
    drop(f);

    let nodes = load_population_csv(population_path.to_str().unwrap()).expect("population csv");
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].id, 1);
    assert_eq!(nodes[0].population[0][0], 4000.0);
    assert_eq!(nodes[0].population[2][0], 5000.0);
    assert_eq!(nodes[0].population[2][1], 1000.0);
    assert_eq!(nodes[1].population[2][0], 8000.0);

    // self-edges and zero fractions are dropped
    let travel = load_travel_csv(travel_path.to_str().unwrap()).expect("travel csv");
    assert_eq!(travel.len(), 1);
    assert_eq!((travel[0].sink, travel[0].source), (2, 1));

    let scenario = SeatirdScenario {
        nodes,
        travel,
        seed: 2,
        ..Default::default()
    };
    let sim = StochasticSeatird::new(scenario).expect("scenario invalid");
    assert_eq!(sim.node_ids(), &[1, 2]);
    assert_eq!(sim.population(1).unwrap(), 10_000.0);
    assert_eq!(sim.population(2).unwrap(), 8_000.0);

    let [ages, risks, vaccs] = sim.stratifications();
    assert_eq!(ages.len(), 5);
    assert_eq!(risks.len(), 2);
    assert_eq!(vaccs.len(), 2);
}

#[test]
fn out_of_range_population_rows_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.csv");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "node_id,age_group,risk_group,pop").unwrap();
    writeln!(f, "1,7,0,100").unwrap();
    drop(f);

    assert!(load_population_csv(path.to_str().unwrap()).is_err());
}
