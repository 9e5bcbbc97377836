use flurust::io::debug_log::write_run_log;
use flurust::model::seatird::{NodeSeed, SeatirdScenario, StochasticSeatird};
use flurust::model::store::Variable;
use flurust::model::{NUM_AGE_GROUPS, NUM_RISK_GROUPS};

#[test]
fn run_log_round_trip() {
    let mut population = vec![vec![0.0; NUM_RISK_GROUPS]; NUM_AGE_GROUPS];
    population[2][0] = 5_000.0;
    let scenario = SeatirdScenario {
        nodes: vec![NodeSeed { id: 1, population }],
        seed: 9,
        ..Default::default()
    };

    let mut sim = StochasticSeatird::new(scenario).expect("scenario invalid");
    sim.expose(10, 1, [2, 0, 0]).expect("expose failed");
    for _ in 0..5 {
        sim.simulate();
    }

    let mut susceptible = Vec::new();
    let mut exposed = Vec::new();
    let mut infected = Vec::new();
    let mut deceased = Vec::new();
    let mut ili = Vec::new();
    for day in 0..sim.num_times() {
        susceptible.push(sim.value(Variable::Susceptible, day, 1, &[]).unwrap());
        exposed.push(sim.value(Variable::Exposed, day, 1, &[]).unwrap());
        infected.push(sim.infected(day, 1, &[]).unwrap());
        deceased.push(sim.value(Variable::Deceased, day, 1, &[]).unwrap());
        ili.push(sim.ili(day, 1).unwrap());
    }

    let tmp = tempfile::tempdir().expect("tempdir");
    let path = write_run_log(
        tmp.path(),
        "TEST-SMALL",
        9,
        &susceptible,
        &exposed,
        &infected,
        &deceased,
        &ili,
    )
    .expect("write run log");

    let contents = std::fs::read_to_string(path).expect("read run log");
    assert!(contents.starts_with("run_id=TEST-SMALL\n"));
    assert!(contents.contains("seed=9\n"));
    assert!(contents.contains("days=5\n"));
    assert!(contents.contains("day,susceptible,exposed,infected,deceased,ili\n"));

    // header (3 lines) + blank + column header + one row per day slab
    let rows: Vec<&str> = contents.lines().collect();
    assert_eq!(rows.len(), 5 + sim.num_times());
    assert!(rows.last().unwrap().starts_with("5,"));
}

#[test]
fn mismatched_timelines_are_rejected() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let result = write_run_log(
        tmp.path(),
        "BAD",
        0,
        &[1.0, 2.0],
        &[1.0],
        &[1.0, 2.0],
        &[1.0, 2.0],
        &[1.0, 2.0],
    );
    assert!(result.is_err());
}
