use std::net::SocketAddr;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use flurust::model::seatird::{SeatirdScenario, StochasticSeatird};
use flurust::model::store::Variable;

#[derive(Debug, Deserialize)]
struct InitialCase {
    node_id: u32,
    count: usize,
    stratification: [usize; 3],
}

#[derive(Debug, Deserialize)]
struct RunRequest {
    scenario: SeatirdScenario,
    #[serde(default)]
    initial_cases: Vec<InitialCase>,
    days: Option<usize>,
}

#[derive(Debug, Serialize)]
struct RunResponse {
    return_code: i32,
    days: usize,
    node_ids: Vec<u32>,
    // [day][node] series
    susceptible: Vec<Vec<f64>>,
    exposed: Vec<Vec<f64>>,
    infected: Vec<Vec<f64>>,
    recovered: Vec<Vec<f64>>,
    deceased: Vec<Vec<f64>>,
    ili: Vec<Vec<f64>>,
}

#[tokio::main]
async fn main() {
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/run_simulation", post(run_simulation));

    let addr: SocketAddr = format!("{}:{}", host, port).parse().expect("invalid HOST/PORT");
    println!("[flurust-api] listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.expect("bind failed");
    axum::serve(listener, app).await.expect("server failed");
}

async fn healthz() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

async fn run_simulation(Json(req): Json<RunRequest>) -> impl IntoResponse {
    // the simulation is CPU-bound; run it on the blocking pool
    let join = tokio::task::spawn_blocking(move || run_simulation_sync(req));

    match join.await {
        Ok(Ok(resp)) => (StatusCode::OK, Json(resp)).into_response(),
        Ok(Err((code, body))) => (code, Json(body)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"return_code": 2, "error": format!("join error: {e}")})),
        )
            .into_response(),
    }
}

fn run_simulation_sync(req: RunRequest) -> Result<RunResponse, (StatusCode, serde_json::Value)> {
    let days = req.days.unwrap_or(30).max(1);

    let mut sim = StochasticSeatird::new(req.scenario).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            json!({"return_code": 1, "error": format!("invalid scenario: {e:#}")}),
        )
    })?;

    for case in &req.initial_cases {
        sim.expose(case.count, case.node_id, case.stratification)
            .map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    json!({"return_code": 1, "error": format!("invalid initial case: {e:#}")}),
                )
            })?;
    }

    for _ in 0..days {
        sim.simulate();
    }

    let node_ids = sim.node_ids().to_vec();
    let mut susceptible = Vec::with_capacity(sim.num_times());
    let mut exposed = Vec::with_capacity(sim.num_times());
    let mut infected = Vec::with_capacity(sim.num_times());
    let mut recovered = Vec::with_capacity(sim.num_times());
    let mut deceased = Vec::with_capacity(sim.num_times());
    let mut ili = Vec::with_capacity(sim.num_times());

    for t in 0..sim.num_times() {
        susceptible.push(values_at(&sim, t, Variable::Susceptible));
        exposed.push(values_at(&sim, t, Variable::Exposed));
        recovered.push(values_at(&sim, t, Variable::Recovered));
        deceased.push(values_at(&sim, t, Variable::Deceased));
        infected.push(
            node_ids
                .iter()
                .map(|&id| sim.infected(t, id, &[]).unwrap_or(0.0))
                .collect(),
        );
        ili.push(
            node_ids
                .iter()
                .map(|&id| sim.ili(t, id).unwrap_or(0.0))
                .collect(),
        );
    }

    Ok(RunResponse {
        return_code: 0,
        days,
        node_ids,
        susceptible,
        exposed,
        infected,
        recovered,
        deceased,
        ili,
    })
}

fn values_at(sim: &StochasticSeatird, time: usize, variable: Variable) -> Vec<f64> {
    sim.node_ids()
        .iter()
        .map(|&id| sim.value(variable, time, id, &[]).unwrap_or(0.0))
        .collect()
}
