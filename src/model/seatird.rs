use std::collections::HashMap;

use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};

use crate::math::rng::SimRng;

use super::ili::ili_view;
use super::npi::Npi;
use super::params::{Parameters, PriorityGroup};
use super::schedule::{Event, EventKind, Schedule, ScheduleQueue, ScheduleState};
use super::stockpile::{Delivery, StockpileNetwork};
use super::store::{strat_index, CompartmentStore, Variable, STRATA_PER_NODE};
use super::{
    AGE_GROUP_LABELS, ALL, NUM_AGE_GROUPS, NUM_RISK_GROUPS, NUM_VACCINATED_GROUPS,
    RISK_GROUP_LABELS, VACCINATED_LABELS,
};

/// Age-mixing matrix: daily contact rates between age groups.
pub const CONTACT: [[f64; NUM_AGE_GROUPS]; NUM_AGE_GROUPS] = [
    [45.1228487783, 8.7808312353, 11.7757947836, 6.10114751268, 4.02227175596],
    [8.7808312353, 41.2889143668, 13.3332813497, 7.847051289, 4.22656343551],
    [11.7757947836, 13.3332813497, 21.4270155984, 13.7392636644, 6.92483172729],
    [6.10114751268, 7.847051289, 13.7392636644, 18.0482119252, 9.45371062356],
    [4.02227175596, 4.22656343551, 6.92483172729, 9.45371062356, 14.0529294262],
];

/// Relative susceptibility by age group.
pub const SIGMA: [f64; NUM_AGE_GROUPS] = [1.00, 0.98, 0.94, 0.91, 0.66];

/// Fraction of contacts retained while travelling.
const RHO: f64 = 0.39;

/// Age-based reduction of travel flow (young children and the elderly
/// travel less).
const AGE_FLOW_REDUCTION: [f64; NUM_AGE_GROUPS] = [10.0, 2.0, 1.0, 1.0, 2.0];

/// Initial population of one node, by (age, risk). Everyone starts
/// susceptible and unvaccinated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSeed {
    pub id: u32,
    pub population: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelEdge {
    pub sink: u32,
    pub source: u32,
    pub fraction: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockpileSeed {
    pub node_id: u32,
    #[serde(default)]
    pub antivirals: i64,
    #[serde(default)]
    pub vaccines: i64,
}

/// Everything needed to construct a simulation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeatirdScenario {
    pub nodes: Vec<NodeSeed>,
    pub travel: Vec<TravelEdge>,
    pub stockpiles: Vec<StockpileSeed>,
    pub deliveries: Vec<Delivery>,
    /// per-node ILI provider weights; empty means 1.0 everywhere
    pub ili_provider_weights: Vec<f64>,
    pub parameters: Parameters,
    pub seed: u64,
    /// re-verify the schedule-population invariant after every day step
    /// (expensive)
    pub verify_schedules: bool,
}

impl SeatirdScenario {
    pub fn check(&self) -> anyhow::Result<()> {
        ensure!(!self.nodes.is_empty(), "scenario has no nodes");
        let mut seen = std::collections::HashSet::new();
        for node in &self.nodes {
            ensure!(seen.insert(node.id), "duplicate node id {}", node.id);
            ensure!(
                node.population.len() == NUM_AGE_GROUPS
                    && node.population.iter().all(|row| row.len() == NUM_RISK_GROUPS),
                "node {}: population must be {} age groups x {} risk groups",
                node.id,
                NUM_AGE_GROUPS,
                NUM_RISK_GROUPS
            );
            ensure!(
                node.population.iter().flatten().all(|&p| p >= 0.0),
                "node {}: population counts must be non-negative",
                node.id
            );
        }
        for edge in &self.travel {
            ensure!(
                seen.contains(&edge.sink) && seen.contains(&edge.source),
                "travel edge references unknown node ({} -> {})",
                edge.source,
                edge.sink
            );
            ensure!(
                (0.0..=1.0).contains(&edge.fraction),
                "travel fraction must be in [0, 1]"
            );
        }
        for stockpile in &self.stockpiles {
            ensure!(
                seen.contains(&stockpile.node_id),
                "stockpile references unknown node {}",
                stockpile.node_id
            );
        }
        for delivery in &self.deliveries {
            ensure!(
                seen.contains(&delivery.node_id),
                "delivery references unknown node {}",
                delivery.node_id
            );
        }
        ensure!(
            self.ili_provider_weights.is_empty()
                || self.ili_provider_weights.len() == self.nodes.len(),
            "ili_provider_weights must be empty or one per node"
        );
        self.parameters.check()
    }
}

/// The stochastic SEATIRD engine: a discrete-event Monte Carlo simulation
/// of a stratified population over a network of geographic nodes.
///
/// `simulate()` advances one day at a time; `expose()` seeds infections.
/// Aggregate compartment counts and per-individual event schedules are
/// kept consistent throughout (the schedule-population invariant).
pub struct StochasticSeatird {
    pub(super) params: Parameters,
    pub(super) node_ids: Vec<u32>,
    node_index: HashMap<u32, usize>,
    pub(super) store: CompartmentStore,
    pub(super) queues: Vec<ScheduleQueue>,
    travel_fractions: Vec<f64>,
    pub(super) stockpiles: StockpileNetwork,
    ili_provider_weights: Vec<f64>,
    ili_values: Vec<Vec<f64>>,
    pub(super) rng: SimRng,
    verify_schedules: bool,
    time: usize,
    now: f64,
    cached_time: Option<usize>,
    node_population_cache: Vec<f64>,
    population_cache: Vec<f64>,
}

impl StochasticSeatird {
    pub fn new(scenario: SeatirdScenario) -> anyhow::Result<Self> {
        scenario.check().context("invalid scenario")?;

        let node_ids: Vec<u32> = scenario.nodes.iter().map(|n| n.id).collect();
        let node_index: HashMap<u32, usize> =
            node_ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let num_nodes = node_ids.len();

        let mut store = CompartmentStore::new(num_nodes);
        for (i, node) in scenario.nodes.iter().enumerate() {
            for a in 0..NUM_AGE_GROUPS {
                for r in 0..NUM_RISK_GROUPS {
                    let count = node.population[a][r];
                    store.set(Variable::Susceptible, 0, i, [a, r, 0], count);
                    store.set(Variable::Population, 0, i, [a, r, 0], count);
                }
            }
        }

        let mut travel_fractions = vec![0.0; num_nodes * num_nodes];
        for edge in &scenario.travel {
            let sink = node_index[&edge.sink];
            let source = node_index[&edge.source];
            if sink != source {
                travel_fractions[sink * num_nodes + source] = edge.fraction;
            }
        }

        let mut stockpiles = StockpileNetwork::new();
        for seed in &scenario.stockpiles {
            stockpiles.add_stockpile(seed.node_id, seed.antivirals, seed.vaccines);
        }
        for delivery in &scenario.deliveries {
            stockpiles.add_delivery(delivery.clone());
        }

        let ili_provider_weights = if scenario.ili_provider_weights.is_empty() {
            vec![1.0; num_nodes]
        } else {
            scenario.ili_provider_weights.clone()
        };

        Ok(Self {
            params: scenario.parameters,
            node_ids,
            node_index,
            store,
            queues: (0..num_nodes).map(|_| ScheduleQueue::new()).collect(),
            travel_fractions,
            stockpiles,
            ili_provider_weights,
            ili_values: vec![vec![0.0; num_nodes]],
            rng: SimRng::seed_from(scenario.seed),
            verify_schedules: scenario.verify_schedules,
            time: 0,
            now: 0.0,
            cached_time: None,
            node_population_cache: vec![0.0; num_nodes],
            population_cache: vec![0.0; num_nodes * STRATA_PER_NODE],
        })
    }

    pub fn node_ids(&self) -> &[u32] {
        &self.node_ids
    }

    /// Current day of the clock.
    pub fn day(&self) -> usize {
        self.time
    }

    pub fn num_times(&self) -> usize {
        self.store.num_times()
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    /// Label lists for the three stratification axes.
    pub fn stratifications(&self) -> [Vec<String>; 3] {
        [
            AGE_GROUP_LABELS.iter().map(|s| s.to_string()).collect(),
            RISK_GROUP_LABELS.iter().map(|s| s.to_string()).collect(),
            VACCINATED_LABELS.iter().map(|s| s.to_string()).collect(),
        ]
    }

    fn index_of(&self, node_id: u32) -> anyhow::Result<usize> {
        self.node_index
            .get(&node_id)
            .copied()
            .with_context(|| format!("unknown node id {}", node_id))
    }

    /// Living population of a node at the newest day.
    pub fn population(&self, node_id: u32) -> anyhow::Result<f64> {
        let node = self.index_of(node_id)?;
        Ok(self.store.value(Variable::Population, self.store.newest(), node, &[]))
    }

    /// Aggregating query over the compartment store. `stratification` may
    /// be shorter than 3 and may contain `ALL` wildcards.
    pub fn value(
        &self,
        variable: Variable,
        time: usize,
        node_id: u32,
        stratification: &[usize],
    ) -> anyhow::Result<f64> {
        let node = self.index_of(node_id)?;
        ensure!(time < self.store.num_times(), "time {} out of range", time);
        Ok(self.store.value(variable, time, node, stratification))
    }

    /// Dataset-style mutation of a single concrete stratum.
    pub fn set_value(
        &mut self,
        variable: Variable,
        time: usize,
        node_id: u32,
        stratification: [usize; 3],
        value: f64,
    ) -> anyhow::Result<()> {
        let node = self.index_of(node_id)?;
        ensure!(time < self.store.num_times(), "time {} out of range", time);
        ensure_concrete(stratification)?;
        self.store.set(variable, time, node, stratification, value);
        Ok(())
    }

    /// All infected: asymptomatic + treatable + infectious.
    pub fn infected(
        &self,
        time: usize,
        node_id: u32,
        stratification: &[usize],
    ) -> anyhow::Result<f64> {
        Ok(self.value(Variable::Asymptomatic, time, node_id, stratification)?
            + self.value(Variable::Treatable, time, node_id, stratification)?
            + self.value(Variable::Infectious, time, node_id, stratification)?)
    }

    /// Vaccinated population still inside the latency window at `time`.
    pub fn vaccinated_in_latency(
        &self,
        time: usize,
        node_id: u32,
        stratification: &[usize],
    ) -> anyhow::Result<f64> {
        let node = self.index_of(node_id)?;
        ensure!(time < self.store.num_times(), "time {} out of range", time);
        let latency = self.params.vaccine_latency_period;

        // a 0 day latency period always sums to zero
        let mut total = 0.0;
        let mut t = time as i64;
        while t >= 0 && t > time as i64 - latency as i64 {
            total += self
                .store
                .value(Variable::VaccinatedDaily, t as usize, node, stratification);
            t -= 1;
        }
        Ok(total)
    }

    /// Vaccinated population whose vaccine has taken effect.
    pub fn effective_vaccinated(
        &self,
        time: usize,
        node_id: u32,
        stratification: &[usize],
    ) -> anyhow::Result<f64> {
        // explicitly unvaccinated strata have no effective vaccinations
        if stratification.len() >= 3 && stratification[2] != 1 && stratification[2] != ALL {
            return Ok(0.0);
        }
        let mut full = [ALL; 3];
        for (i, &s) in stratification.iter().take(3).enumerate() {
            full[i] = s;
        }
        full[2] = 1;
        Ok(self.value(Variable::Population, time, node_id, &full)?
            - self.vaccinated_in_latency(time, node_id, &full)?)
    }

    /// ILI signal for a node at a day.
    pub fn ili(&self, time: usize, node_id: u32) -> anyhow::Result<f64> {
        let node = self.index_of(node_id)?;
        ensure!(time < self.ili_values.len(), "time {} out of range", time);
        Ok(self.ili_values[time][node])
    }

    /// ILI reports: the signal scaled back up to a case count.
    pub fn ili_reports(&self, time: usize, node_id: u32) -> anyhow::Result<f64> {
        let node = self.index_of(node_id)?;
        ensure!(time < self.ili_values.len(), "time {} out of range", time);
        let population = self.store.value(Variable::Population, time, node, &[]);
        Ok(self.ili_values[time][node] * population)
    }

    /// Expose `num` susceptible individuals at a node, clamped by the
    /// susceptibles actually available. Returns the number exposed; a
    /// schedule is drawn and enqueued for each.
    pub fn expose(
        &mut self,
        num: usize,
        node_id: u32,
        stratification: [usize; 3],
    ) -> anyhow::Result<usize> {
        let node = self.index_of(node_id)?;
        ensure_concrete(stratification)?;

        // expose() can be called before any day has been simulated
        if self.time == 0 && self.cached_time.is_none() {
            log::debug!("precomputing at the beginning of the simulation");
            self.precompute(0);
        } else if self.time != 0 && self.cached_time != Some(self.time + 1) {
            log::warn!("precomputing during simulation, should not be necessary");
            self.precompute(self.time + 1);
        }

        let t = self.store.newest();
        let available = self
            .store
            .value(Variable::Susceptible, t, node, &stratification)
            .floor();
        let exposed = num.min(available.max(0.0) as usize);

        if exposed > 0 {
            let moved = exposed as f64;
            self.store.add(Variable::Susceptible, t, node, stratification, -moved);
            self.store.add(Variable::Exposed, t, node, stratification, moved);
        }

        for _ in 0..exposed {
            let mut schedule = Schedule::draw(self.now, stratification, &self.params, &mut self.rng);
            self.init_contact_events(node, &mut schedule);
            self.queues[node].push(schedule);
        }

        Ok(exposed)
    }

    /// Advance the simulation one day.
    pub fn simulate(&mut self) {
        self.now = self.time as f64;

        // copy every variable into the new day and evolve the stockpiles
        self.store.advance_day();
        let t1 = self.store.newest();
        self.stockpiles.evolve(t1);

        // reset here: there may be multiple treatments in one day
        self.store.zero_day(Variable::TreatedDaily, t1);
        self.store.zero_day(Variable::TreatedIneffectiveDaily, t1);
        self.store.zero_day(Variable::VaccinatedDaily, t1);

        // priority-group selections first, then the rest of the
        // population pro-rata
        let universal = [PriorityGroup::universal()];
        let antiviral_groups = self.params.antiviral_priority_groups.clone();
        self.apply_antivirals(&antiviral_groups);
        self.apply_antivirals(&universal);

        let vaccine_groups = self.params.vaccine_priority_groups.clone();
        self.apply_vaccines(&vaccine_groups);
        self.apply_vaccines(&universal);

        // vaccination moves individuals across the vaccinated axis, so the
        // population cache is rebuilt on the new day before events drain
        self.precompute(t1);

        let day_end = (self.time + 1) as f64;
        for node in 0..self.node_ids.len() {
            while let Some(next_time) = self.queues[node].next_event_time() {
                if next_time >= day_end {
                    break;
                }
                let Some(mut schedule) = self.queues[node].pop() else {
                    break;
                };
                // cancelled schedules die here (treatments cancel them)
                if schedule.is_empty() || schedule.is_cancelled() {
                    continue;
                }
                let Some(event) = schedule.pop_next() else {
                    continue;
                };
                self.now = event.time;
                self.process_event(node, &event);
                if !schedule.is_empty() {
                    self.queues[node].push(schedule);
                }
            }
        }

        self.now = day_end;
        self.travel();

        // surveillance overlay for the day just completed
        let mut infectious = Vec::with_capacity(self.node_ids.len());
        let mut population = Vec::with_capacity(self.node_ids.len());
        for node in 0..self.node_ids.len() {
            infectious.push(
                self.store.value(Variable::Asymptomatic, self.time, node, &[])
                    + self.store.value(Variable::Treatable, self.time, node, &[])
                    + self.store.value(Variable::Infectious, self.time, node, &[]),
            );
            population.push(self.store.value(Variable::Population, self.time, node, &[]));
        }
        self.ili_values
            .push(ili_view(&infectious, &population, &self.ili_provider_weights));

        self.time += 1;

        if self.verify_schedules && !self.verify_schedule_counts() {
            log::error!("failed verification of schedule counts on day {}", self.time);
        }
    }

    fn process_event(&mut self, node: usize, event: &Event) {
        match event.kind {
            EventKind::EtoA => {
                self.transition(1.0, Variable::Exposed, Variable::Asymptomatic, node, event.from);
            }
            EventKind::AtoT => {
                self.transition(1.0, Variable::Asymptomatic, Variable::Treatable, node, event.from);
            }
            EventKind::AtoR => {
                self.transition(1.0, Variable::Asymptomatic, Variable::Recovered, node, event.from);
            }
            EventKind::AtoD => {
                self.transition(1.0, Variable::Asymptomatic, Variable::Deceased, node, event.from);
            }
            EventKind::TtoI => {
                self.transition(1.0, Variable::Treatable, Variable::Infectious, node, event.from);
            }
            EventKind::TtoR => {
                self.transition(1.0, Variable::Treatable, Variable::Recovered, node, event.from);
            }
            EventKind::TtoD => {
                self.transition(1.0, Variable::Treatable, Variable::Deceased, node, event.from);
            }
            EventKind::ItoR => {
                self.transition(1.0, Variable::Infectious, Variable::Recovered, node, event.from);
            }
            EventKind::ItoD => {
                self.transition(1.0, Variable::Infectious, Variable::Deceased, node, event.from);
            }
            EventKind::Contact { to_age, to_risk } => {
                self.process_contact(node, event, to_age, to_risk);
            }
        }
    }

    /// Atomic compartment move at the newest day, clamped by the source
    /// count. A move into `Deceased` leaves the living population.
    pub(super) fn transition(
        &mut self,
        count: f64,
        from: Variable,
        to: Variable,
        node: usize,
        stratification: [usize; 3],
    ) -> f64 {
        let t = self.store.newest();
        let available = self.store.value(from, t, node, &stratification).floor();
        let moved = count.min(available).max(0.0);
        if moved > 0.0 {
            self.store.add(from, t, node, stratification, -moved);
            self.store.add(to, t, node, stratification, moved);
            if to == Variable::Deceased {
                self.store.add(Variable::Population, t, node, stratification, -moved);
            }
        }
        moved
    }

    fn process_contact(&mut self, node: usize, event: &Event, to_age: usize, to_risk: usize) {
        let node_id = self.node_ids[node];
        let day = self.now as usize;

        if Npi::is_effective(&self.params.npis, node_id, day, event.from[0], to_age, &mut self.rng)
        {
            return;
        }

        // resolve the contactee's vaccination status now, not at exposure
        let base = node * STRATA_PER_NODE;
        let age_risk_population = (self.population_cache[base + strat_index(to_age, to_risk, 0)]
            + self.population_cache[base + strat_index(to_age, to_risk, 1)])
            as i64;
        if age_risk_population <= 0 {
            return;
        }
        let vaccinated_population =
            self.population_cache[base + strat_index(to_age, to_risk, 1)] as i64;

        let contact = self.rng.uniform_int(age_risk_population as u64) as i64;

        let mut v = 0;
        if vaccinated_population >= contact {
            v = 1;
            let latency_population = self.population_in_latency(node, to_age, to_risk);
            if latency_population < contact {
                // outside the latency window: the vaccine may protect
                if self.rng.uniform() <= self.params.vaccine_effectiveness {
                    return;
                }
            }
        }

        let target = [to_age, to_risk, v];
        let mut target_population = self.population_cache[base + strat_index(to_age, to_risk, v)] as i64;
        if event.from == target {
            // no self-contact
            target_population -= 1;
        }

        if target_population > 0 {
            let contact = self.rng.uniform_int(target_population as u64) as f64;
            let t = self.store.newest();
            if self.store.value(Variable::Susceptible, t, node, &target).floor() >= contact {
                if let Err(err) = self.expose(1, node_id, target) {
                    log::error!("contact exposure failed: {:#}", err);
                }
            }
        }
    }

    fn init_contact_events(&mut self, node: usize, schedule: &mut Schedule) {
        let beta = self.params.beta();
        let stratification = schedule.stratification();
        let node_population = self.node_population_cache[node];
        if node_population <= 0.0 {
            return;
        }

        // contacts target (age, risk) only; vaccination status is resolved
        // when the event fires
        for a in 0..NUM_AGE_GROUPS {
            for r in 0..NUM_RISK_GROUPS {
                let base = node * STRATA_PER_NODE;
                let group_population = self.population_cache[base + strat_index(a, r, 0)]
                    + self.population_cache[base + strat_index(a, r, 1)];
                let group_fraction = group_population / node_population;

                let rate = beta * CONTACT[stratification[0]][a] * SIGMA[a] * group_fraction;

                let mut prev = schedule.infected_t_min();
                let mut t = prev + self.rng.exponential(rate);
                while t < schedule.infected_t_max() {
                    schedule.insert_event(Event {
                        init_time: prev,
                        time: t,
                        kind: EventKind::Contact { to_age: a, to_risk: r },
                        from: stratification,
                    });
                    prev = t;
                    t = prev + self.rng.exponential(rate);
                }
            }
        }
    }

    fn travel(&mut self) {
        let beta = self.params.beta();
        let vaccine_effectiveness = self.params.vaccine_effectiveness;
        let t1 = self.store.newest();
        let day = self.now as usize;
        let num_nodes = self.node_ids.len();

        for sink in 0..num_nodes {
            let sink_id = self.node_ids[sink];
            let population_sink = self.node_population_cache[sink];
            let mut unvaccinated_probabilities = [0.0; NUM_AGE_GROUPS];

            for source in 0..num_nodes {
                if source == sink {
                    continue;
                }
                let source_id = self.node_ids[source];
                let population_source = self.node_population_cache[source];

                let fraction_ij = self.travel_fractions[sink * num_nodes + source];
                let fraction_ji = self.travel_fractions[source * num_nodes + sink];
                if fraction_ij <= 0.0 && fraction_ji <= 0.0 {
                    continue;
                }

                let mut asymptomatics = [0.0; NUM_AGE_GROUPS];
                let mut transmittings = [0.0; NUM_AGE_GROUPS];
                for age in 0..NUM_AGE_GROUPS {
                    let asymptomatic = self.store.value(Variable::Asymptomatic, t1, source, &[age]);
                    asymptomatics[age] = asymptomatic;
                    transmittings[age] = asymptomatic
                        + self.store.value(Variable::Treatable, t1, source, &[age])
                        + self.store.value(Variable::Infectious, t1, source, &[age]);
                }

                for a in 0..NUM_AGE_GROUPS {
                    let mut contacts_ij = 0.0;
                    let mut contacts_ji = 0.0;

                    for b in 0..NUM_AGE_GROUPS {
                        let npi_at_sink =
                            Npi::effectiveness(&self.params.npis, sink_id, day, a, b);
                        let npi_at_source =
                            Npi::effectiveness(&self.params.npis, source_id, day, a, b);

                        contacts_ij += (1.0 - npi_at_source) * transmittings[b] * beta * RHO
                            * CONTACT[a][b] * SIGMA[a]
                            / AGE_FLOW_REDUCTION[a];
                        contacts_ji += (1.0 - npi_at_sink) * asymptomatics[b] * beta * RHO
                            * CONTACT[a][b] * SIGMA[a]
                            / AGE_FLOW_REDUCTION[b];
                    }

                    if population_source > 0.0 {
                        unvaccinated_probabilities[a] += fraction_ij * contacts_ij / population_source;
                    }
                    if population_sink > 0.0 {
                        unvaccinated_probabilities[a] += fraction_ji * contacts_ji / population_sink;
                    }
                }
            }

            for a in 0..NUM_AGE_GROUPS {
                for r in 0..NUM_RISK_GROUPS {
                    for v in 0..NUM_VACCINATED_GROUPS {
                        let mut probability = unvaccinated_probabilities[a];

                        if v == 1 {
                            let vaccinated_population =
                                self.population_cache[sink * STRATA_PER_NODE + strat_index(a, r, 1)];
                            if vaccinated_population > 0.0 {
                                let latency_population =
                                    self.population_in_latency(sink, a, r) as f64;
                                let effective_population =
                                    vaccinated_population - latency_population;
                                // weighted by the fraction whose vaccine has taken effect
                                let effective = vaccine_effectiveness * effective_population
                                    / vaccinated_population;
                                probability *= 1.0 - effective;
                            }
                        }

                        let stratification = [a, r, v];
                        let susceptible = (self
                            .store
                            .value(Variable::Susceptible, t1, sink, &stratification)
                            + 0.5) // continuity correction
                            .floor() as i64;

                        if susceptible > 0 && probability > 0.0 {
                            let exposures =
                                self.rng.binomial(susceptible as u64, probability) as usize;
                            if exposures > 0 {
                                if let Err(err) = self.expose(exposures, sink_id, stratification) {
                                    log::error!("travel exposure failed: {:#}", err);
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Rebuild the population caches from a day slab of the store.
    fn precompute(&mut self, time: usize) {
        self.cached_time = Some(time);
        for node in 0..self.node_ids.len() {
            self.node_population_cache[node] =
                self.store.value(Variable::Population, time, node, &[]);
            for a in 0..NUM_AGE_GROUPS {
                for r in 0..NUM_RISK_GROUPS {
                    for v in 0..NUM_VACCINATED_GROUPS {
                        self.population_cache[node * STRATA_PER_NODE + strat_index(a, r, v)] =
                            self.store.at(Variable::Population, time, node, a, r, v);
                    }
                }
            }
        }
    }

    /// Vaccinated individuals of an (age, risk) group still inside the
    /// latency window, counted back from the newest day. People are
    /// vaccinated in the "morning", so the newest slab is included.
    pub(super) fn population_in_latency(&self, node: usize, age: usize, risk: usize) -> i64 {
        let latency = self.params.vaccine_latency_period;
        let newest = self.store.newest() as i64;
        let mut total = 0.0;
        let mut t = newest;
        while t >= 0 && t > newest - latency as i64 {
            total += self.store.at(Variable::VaccinatedDaily, t as usize, node, age, risk, 1);
            t -= 1;
        }
        total as i64
    }

    /// Number of live (non-cancelled) schedules at a node in a given state
    /// and stratum.
    pub fn schedule_count(
        &self,
        node_id: u32,
        state: ScheduleState,
        stratification: [usize; 3],
    ) -> anyhow::Result<usize> {
        let node = self.index_of(node_id)?;
        Ok(self.queues[node]
            .iter()
            .filter(|s| {
                !s.is_cancelled() && s.state() == state && s.stratification() == stratification
            })
            .count())
    }

    pub fn num_schedules(&self, node_id: u32) -> anyhow::Result<usize> {
        let node = self.index_of(node_id)?;
        Ok(self.queues[node].len())
    }

    /// Re-walk every queue and compare live schedule counts against the
    /// {exposed, asymptomatic, treatable, infectious} compartments on the
    /// newest day. Mismatches are logged; the simulation continues.
    pub fn verify_schedule_counts(&self) -> bool {
        let t = self.store.newest();
        let mut verified = true;

        let pairs = [
            (Variable::Exposed, ScheduleState::Exposed),
            (Variable::Asymptomatic, ScheduleState::Asymptomatic),
            (Variable::Treatable, ScheduleState::Treatable),
            (Variable::Infectious, ScheduleState::Infectious),
        ];

        for node in 0..self.node_ids.len() {
            for a in 0..NUM_AGE_GROUPS {
                for r in 0..NUM_RISK_GROUPS {
                    for v in 0..NUM_VACCINATED_GROUPS {
                        for (variable, state) in pairs {
                            let count = self.store.at(variable, t, node, a, r, v) as i64;
                            let scheduled = self.queues[node]
                                .iter()
                                .filter(|s| {
                                    !s.is_cancelled()
                                        && s.state() == state
                                        && s.stratification() == [a, r, v]
                                })
                                .count() as i64;
                            if count != scheduled {
                                log::warn!(
                                    "node {}: {} ({},{},{}) != scheduled ({} != {})",
                                    self.node_ids[node],
                                    variable.name(),
                                    a,
                                    r,
                                    v,
                                    count,
                                    scheduled
                                );
                                verified = false;
                            }
                        }
                    }
                }
            }
        }

        verified
    }
}

fn ensure_concrete(stratification: [usize; 3]) -> anyhow::Result<()> {
    ensure!(
        stratification[0] < NUM_AGE_GROUPS
            && stratification[1] < NUM_RISK_GROUPS
            && stratification[2] < NUM_VACCINATED_GROUPS,
        "stratification {:?} is not a concrete (age, risk, vaccinated) triple",
        stratification
    );
    Ok(())
}
