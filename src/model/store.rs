use super::{ALL, NUM_AGE_GROUPS, NUM_RISK_GROUPS, NUM_VACCINATED_GROUPS};

/// Number of concrete (age, risk, vaccinated) strata per node.
pub const STRATA_PER_NODE: usize = NUM_AGE_GROUPS * NUM_RISK_GROUPS * NUM_VACCINATED_GROUPS;

/// Every tracked compartment and counter.
///
/// `Population` is the sum of the living compartments. The three daily
/// counters are zeroed at the start of each day step; `Treated` is
/// cumulative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variable {
    Susceptible,
    Exposed,
    Asymptomatic,
    Treatable,
    Infectious,
    Recovered,
    Deceased,
    Population,
    Treated,
    TreatedDaily,
    TreatedIneffectiveDaily,
    VaccinatedDaily,
}

impl Variable {
    pub const COUNT: usize = 12;

    pub const ALL_VARIABLES: [Variable; Variable::COUNT] = [
        Variable::Susceptible,
        Variable::Exposed,
        Variable::Asymptomatic,
        Variable::Treatable,
        Variable::Infectious,
        Variable::Recovered,
        Variable::Deceased,
        Variable::Population,
        Variable::Treated,
        Variable::TreatedDaily,
        Variable::TreatedIneffectiveDaily,
        Variable::VaccinatedDaily,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Variable::Susceptible => "susceptible",
            Variable::Exposed => "exposed",
            Variable::Asymptomatic => "asymptomatic",
            Variable::Treatable => "treatable",
            Variable::Infectious => "infectious",
            Variable::Recovered => "recovered",
            Variable::Deceased => "deceased",
            Variable::Population => "population",
            Variable::Treated => "treated",
            Variable::TreatedDaily => "treated (daily)",
            Variable::TreatedIneffectiveDaily => "treated (ineffective daily)",
            Variable::VaccinatedDaily => "vaccinated (daily)",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Flat index of a concrete stratum within a node slab.
pub fn strat_index(age: usize, risk: usize, vaccinated: usize) -> usize {
    (age * NUM_RISK_GROUPS + risk) * NUM_VACCINATED_GROUPS + vaccinated
}

/// Dense store of every variable over `time x node x (age, risk, vaccinated)`.
///
/// One flat array per variable, day-major. Days are only ever appended
/// (`advance_day` copies the newest slab forward), so a query for any past
/// day stays valid for the lifetime of the run.
pub struct CompartmentStore {
    num_nodes: usize,
    num_times: usize,
    data: Vec<Vec<f64>>,
}

impl CompartmentStore {
    pub fn new(num_nodes: usize) -> Self {
        let slab = num_nodes * STRATA_PER_NODE;
        Self {
            num_nodes,
            num_times: 1,
            data: vec![vec![0.0; slab]; Variable::COUNT],
        }
    }

    pub fn num_times(&self) -> usize {
        self.num_times
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// The newest day slab: the one all mutating operations act on.
    pub fn newest(&self) -> usize {
        self.num_times - 1
    }

    /// Copy every variable's newest slab into a new day.
    pub fn advance_day(&mut self) {
        let slab = self.num_nodes * STRATA_PER_NODE;
        let start = (self.num_times - 1) * slab;
        for values in &mut self.data {
            values.extend_from_within(start..start + slab);
        }
        self.num_times += 1;
    }

    /// Zero a whole day slab of one variable.
    pub fn zero_day(&mut self, variable: Variable, time: usize) {
        let slab = self.num_nodes * STRATA_PER_NODE;
        let start = time * slab;
        self.data[variable.index()][start..start + slab].fill(0.0);
    }

    fn offset(&self, time: usize, node: usize, age: usize, risk: usize, vaccinated: usize) -> usize {
        (time * self.num_nodes + node) * STRATA_PER_NODE + strat_index(age, risk, vaccinated)
    }

    /// Value at a fully concrete stratum.
    pub fn at(
        &self,
        variable: Variable,
        time: usize,
        node: usize,
        age: usize,
        risk: usize,
        vaccinated: usize,
    ) -> f64 {
        self.data[variable.index()][self.offset(time, node, age, risk, vaccinated)]
    }

    pub fn add(
        &mut self,
        variable: Variable,
        time: usize,
        node: usize,
        strat: [usize; 3],
        delta: f64,
    ) {
        let i = self.offset(time, node, strat[0], strat[1], strat[2]);
        self.data[variable.index()][i] += delta;
    }

    pub fn set(
        &mut self,
        variable: Variable,
        time: usize,
        node: usize,
        strat: [usize; 3],
        value: f64,
    ) {
        let i = self.offset(time, node, strat[0], strat[1], strat[2]);
        self.data[variable.index()][i] = value;
    }

    /// Aggregating query. `strat` may be shorter than 3 (missing trailing
    /// axes aggregate) and any entry may be `ALL`.
    pub fn value(&self, variable: Variable, time: usize, node: usize, strat: &[usize]) -> f64 {
        let ages = axis_range(strat.first(), NUM_AGE_GROUPS);
        let risks = axis_range(strat.get(1), NUM_RISK_GROUPS);
        let vaccs = axis_range(strat.get(2), NUM_VACCINATED_GROUPS);

        let values = &self.data[variable.index()];
        let mut total = 0.0;
        for a in ages.clone() {
            for r in risks.clone() {
                for v in vaccs.clone() {
                    total += values[self.offset(time, node, a, r, v)];
                }
            }
        }
        total
    }

    /// Sum of a query over a set of stratification vectors.
    pub fn value_over(
        &self,
        variable: Variable,
        time: usize,
        node: usize,
        strata: &[[usize; 3]],
    ) -> f64 {
        strata
            .iter()
            .map(|s| self.value(variable, time, node, s))
            .sum()
    }
}

fn axis_range(selected: Option<&usize>, cardinality: usize) -> std::ops::Range<usize> {
    match selected {
        Some(&value) if value != ALL => value..value + 1,
        _ => 0..cardinality,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_queries_aggregate() {
        let mut store = CompartmentStore::new(2);
        store.set(Variable::Susceptible, 0, 1, [2, 0, 0], 100.0);
        store.set(Variable::Susceptible, 0, 1, [2, 1, 0], 50.0);
        store.set(Variable::Susceptible, 0, 1, [3, 0, 1], 25.0);

        assert_eq!(store.value(Variable::Susceptible, 0, 1, &[2, 0, 0]), 100.0);
        assert_eq!(store.value(Variable::Susceptible, 0, 1, &[2]), 150.0);
        assert_eq!(store.value(Variable::Susceptible, 0, 1, &[ALL, ALL, 0]), 150.0);
        assert_eq!(store.value(Variable::Susceptible, 0, 1, &[]), 175.0);
        assert_eq!(store.value(Variable::Susceptible, 0, 0, &[]), 0.0);
    }

    #[test]
    fn advance_day_copies_newest_slab() {
        let mut store = CompartmentStore::new(1);
        store.set(Variable::Exposed, 0, 0, [1, 1, 0], 7.0);
        store.advance_day();
        assert_eq!(store.num_times(), 2);
        assert_eq!(store.value(Variable::Exposed, 1, 0, &[1, 1, 0]), 7.0);

        store.add(Variable::Exposed, 1, 0, [1, 1, 0], 3.0);
        assert_eq!(store.value(Variable::Exposed, 0, 0, &[]), 7.0);
        assert_eq!(store.value(Variable::Exposed, 1, 0, &[]), 10.0);
    }

    #[test]
    fn zero_day_leaves_other_days_alone() {
        let mut store = CompartmentStore::new(1);
        store.set(Variable::TreatedDaily, 0, 0, [0, 0, 0], 4.0);
        store.advance_day();
        store.zero_day(Variable::TreatedDaily, 1);
        assert_eq!(store.value(Variable::TreatedDaily, 0, 0, &[]), 4.0);
        assert_eq!(store.value(Variable::TreatedDaily, 1, 0, &[]), 0.0);
    }
}
