//! Antiviral and vaccine application.
//!
//! Both interventions decide how many individuals in each stratum are
//! treated, mutate the compartment counts, then re-walk the node's
//! schedule queue so that the surviving schedules remain a faithful
//! sample of the surviving population: antivirals cancel schedules,
//! vaccines restratify them.

use super::params::{expand_age_risk, expand_strata, PriorityGroup};
use super::schedule::ScheduleState;
use super::seatird::StochasticSeatird;
use super::stockpile::StockpileKind;
use super::store::{strat_index, Variable, STRATA_PER_NODE};
use super::{ALL, NUM_AGE_GROUPS, NUM_RISK_GROUPS};

/// Living compartments vaccines apply to, in bucket order. The schedule
/// rewrite's state-to-bucket mapping must stay aligned with this list.
const VACCINE_COMPARTMENTS: [Variable; 6] = [
    Variable::Susceptible,
    Variable::Exposed,
    Variable::Asymptomatic,
    Variable::Treatable,
    Variable::Infectious,
    Variable::Recovered,
];

fn vaccine_bucket(state: ScheduleState) -> Option<usize> {
    // in practice only E, A, T, I occur: R schedules have no events left
    match state {
        ScheduleState::Exposed => Some(1),
        ScheduleState::Asymptomatic => Some(2),
        ScheduleState::Treatable => Some(3),
        ScheduleState::Infectious => Some(4),
        ScheduleState::Recovered => Some(5),
        ScheduleState::Deceased => None,
    }
}

impl StochasticSeatird {
    /// Treat the treatable population of a priority-group selection with
    /// antivirals: pro-rata across strata, capped by stockpile and daily
    /// capacity. Effectively treated individuals recover immediately and
    /// their schedules are cancelled.
    pub fn apply_antivirals(&mut self, groups: &[PriorityGroup]) {
        if groups.is_empty() {
            log::debug!("no priority groups in selection");
            return;
        }
        let strata = expand_strata(groups);

        let effectiveness = self.params.antiviral_effectiveness;
        let adherence = self.params.antiviral_adherence;
        let capacity = self.params.antiviral_capacity;
        let t1 = self.store.newest();

        for node in 0..self.node_ids.len() {
            let node_id = self.node_ids[node];
            let Some(stockpile) = self.stockpiles.node_stockpile(node_id) else {
                continue;
            };
            let stockpile_amount = stockpile.num(t1, StockpileKind::Antivirals);
            if stockpile_amount == 0 {
                continue;
            }

            // adherent treatable population over the whole selection
            let total_treatable = self.store.value_over(Variable::Treatable, t1, node, &strata)
                - self
                    .store
                    .value_over(Variable::TreatedIneffectiveDaily, t1, node, &strata);
            if total_treatable <= 0.0 {
                continue;
            }

            // the treatable period is one day, which keeps adherence simple
            let total_adherent = adherence * total_treatable;

            let mut used = stockpile_amount;
            if used > total_adherent as i64 {
                used = total_adherent as i64;
            }

            // capacity covers the whole node population, not just the
            // selection, and counts earlier treatments today
            let capacity_population = self.store.value(Variable::Population, t1, node, &[]);
            let today_used = self.store.value(Variable::TreatedDaily, t1, node, &[]);
            let capacity_left = (capacity * capacity_population - today_used) as i64;
            if used > capacity_left {
                used = capacity_left;
            }
            if used <= 0 {
                continue;
            }

            if let Some(stockpile) = self.stockpiles.node_stockpile_mut(node_id) {
                stockpile.set_num(t1, StockpileKind::Antivirals, stockpile_amount - used);
            }

            let mut number_treated = [0i64; STRATA_PER_NODE];
            let mut number_effective = [0i64; STRATA_PER_NODE];
            let mut number_treatable = [0.0f64; STRATA_PER_NODE];

            for &stratification in &strata {
                let s = strat_index(stratification[0], stratification[1], stratification[2]);

                let treatable = self.store.value(Variable::Treatable, t1, node, &stratification)
                    - self
                        .store
                        .value(Variable::TreatedIneffectiveDaily, t1, node, &stratification);
                if treatable <= 0.0 {
                    continue;
                }

                let adherent_treatable = adherence * treatable;
                number_treated[s] = (adherent_treatable / total_adherent * used as f64) as i64;
                number_effective[s] = (effectiveness * number_treated[s] as f64) as i64;
                number_treatable[s] = treatable;

                if number_treated[s] <= 0 {
                    continue;
                }

                self.transition(
                    number_effective[s] as f64,
                    Variable::Treatable,
                    Variable::Recovered,
                    node,
                    stratification,
                );
                self.store.add(
                    Variable::TreatedDaily,
                    t1,
                    node,
                    stratification,
                    number_treated[s] as f64,
                );
                self.store.add(
                    Variable::TreatedIneffectiveDaily,
                    t1,
                    node,
                    stratification,
                    (number_treated[s] - number_effective[s]) as f64,
                );
                self.store.add(
                    Variable::Treated,
                    t1,
                    node,
                    stratification,
                    number_treated[s] as f64,
                );
            }

            // pro-rata flooring can leave a residue
            let total_treated: i64 = number_treated.iter().sum();
            if total_treated != used {
                log::warn!(
                    "number treated != stockpile used ({} != {})",
                    total_treated,
                    used
                );
            }

            // walk the queue and cancel an unbiased sample of the matching
            // treatable schedules
            let mut remaining: i64 = number_effective.iter().sum();
            let Self { queues, rng, .. } = self;
            for schedule in queues[node].iter_mut() {
                if remaining <= 0 {
                    break;
                }
                if schedule.state() != ScheduleState::Treatable {
                    continue;
                }
                let stratification = schedule.stratification();
                let s = strat_index(stratification[0], stratification[1], stratification[2]);
                if number_effective[s] > 0 {
                    if !schedule.is_cancelled()
                        && rng.uniform() <= number_effective[s] as f64 / number_treatable[s]
                    {
                        schedule.cancel();
                        number_effective[s] -= 1;
                        remaining -= 1;
                    }
                    number_treatable[s] -= 1.0;
                }
            }
            if remaining != 0 {
                log::warn!("effectively treated not fully unscheduled ({})", remaining);
            }
        }
    }

    /// Vaccinate the adherent unvaccinated population of a priority-group
    /// selection, across all living compartments, pro-rata by each
    /// (compartment, age, risk) bucket's share. Individuals move to the
    /// vaccinated stratum; their schedules are restratified to match.
    pub fn apply_vaccines(&mut self, groups: &[PriorityGroup]) {
        if groups.is_empty() {
            log::debug!("no priority groups in selection");
            return;
        }
        let pairs = expand_age_risk(groups);

        let adherence = self.params.vaccine_adherence;
        let capacity = self.params.vaccine_capacity;
        let t1 = self.store.newest();

        let buckets = VACCINE_COMPARTMENTS.len() * NUM_AGE_GROUPS * NUM_RISK_GROUPS;
        let bucket = |c: usize, a: usize, r: usize| (c * NUM_AGE_GROUPS + a) * NUM_RISK_GROUPS + r;

        for node in 0..self.node_ids.len() {
            let node_id = self.node_ids[node];
            let Some(stockpile) = self.stockpiles.node_stockpile(node_id) else {
                continue;
            };
            let stockpile_amount = stockpile.num(t1, StockpileKind::Vaccines);
            if stockpile_amount == 0 {
                continue;
            }

            // population totals over the selection, by vaccination status
            let mut total_population = 0.0;
            let mut total_vaccinated = 0.0;
            let mut total_unvaccinated = 0.0;
            for &[a, r] in &pairs {
                total_population += self.store.value(Variable::Population, t1, node, &[a, r]);
                total_vaccinated += self.store.value(Variable::Population, t1, node, &[a, r, 1]);
                total_unvaccinated += self.store.value(Variable::Population, t1, node, &[a, r, 0]);
            }
            if total_unvaccinated <= 0.0 {
                continue;
            }

            let total_adherent_unvaccinated = adherence * total_population - total_vaccinated;

            // all compartments are treated, not just susceptible
            let mut used = stockpile_amount;
            if used > total_adherent_unvaccinated as i64 {
                used = total_adherent_unvaccinated as i64;
            }

            let capacity_population = self.store.value(Variable::Population, t1, node, &[]);
            let today_used = self
                .store
                .value(Variable::VaccinatedDaily, t1, node, &[ALL, ALL, 1]);
            let capacity_left = (capacity * capacity_population - today_used) as i64;
            if used > capacity_left {
                used = capacity_left;
            }
            if used <= 0 {
                continue;
            }

            if let Some(stockpile) = self.stockpiles.node_stockpile_mut(node_id) {
                stockpile.set_num(t1, StockpileKind::Vaccines, stockpile_amount - used);
            }

            let mut number_vaccinated = vec![0i64; buckets];
            // for probabilistically choosing which schedules change stratum
            let mut number_vaccinatable = vec![0i64; buckets];

            for (c, &compartment) in VACCINE_COMPARTMENTS.iter().enumerate() {
                for &[a, r] in &pairs {
                    let population = self.store.value(Variable::Population, t1, node, &[a, r]);
                    let vaccinated_population =
                        self.store.value(Variable::Population, t1, node, &[a, r, 1]);
                    let unvaccinated_population =
                        self.store.value(Variable::Population, t1, node, &[a, r, 0]);
                    let compartment_unvaccinated =
                        self.store.value(compartment, t1, node, &[a, r, 0]);

                    let i = bucket(c, a, r);
                    number_vaccinatable[i] = compartment_unvaccinated as i64;

                    if unvaccinated_population <= 0.0 {
                        continue;
                    }

                    // adherent unvaccinated, apportioned by this
                    // compartment's share of the unvaccinated population
                    let adherent = (adherence * population - vaccinated_population)
                        * compartment_unvaccinated
                        / unvaccinated_population;

                    number_vaccinated[i] =
                        (adherent / total_adherent_unvaccinated * used as f64) as i64;
                    if number_vaccinated[i] <= 0 {
                        continue;
                    }

                    let moved = number_vaccinated[i] as f64;
                    self.store.add(compartment, t1, node, [a, r, 0], -moved);
                    self.store.add(compartment, t1, node, [a, r, 1], moved);

                    // individuals change stratification as well as state
                    self.store.add(Variable::Population, t1, node, [a, r, 0], -moved);
                    self.store.add(Variable::Population, t1, node, [a, r, 1], moved);

                    self.store.add(Variable::VaccinatedDaily, t1, node, [a, r, 1], moved);
                }
            }

            let total_moved: i64 = number_vaccinated.iter().sum();
            if total_moved != used {
                log::warn!(
                    "number vaccinated != stockpile used ({} != {})",
                    total_moved,
                    used
                );
            }

            // susceptible individuals have no schedules and vaccination
            // does not change the course of the already exposed, but the
            // schedules of everyone moved must follow them to the
            // vaccinated stratum
            let mut remaining = total_moved;
            let Self { queues, rng, .. } = self;
            for schedule in queues[node].iter_mut() {
                if remaining <= 0 {
                    break;
                }
                let Some(c) = vaccine_bucket(schedule.state()) else {
                    continue;
                };
                let stratification = schedule.stratification();
                if stratification[2] == 1 {
                    continue;
                }
                let i = bucket(c, stratification[0], stratification[1]);
                if number_vaccinated[i] > 0 {
                    if !schedule.is_cancelled()
                        && rng.uniform()
                            <= number_vaccinated[i] as f64 / number_vaccinatable[i] as f64
                    {
                        schedule.restratify([stratification[0], stratification[1], 1]);
                        number_vaccinated[i] -= 1;
                        remaining -= 1;
                    }
                    number_vaccinatable[i] -= 1;
                }
            }
            // remaining is allowed to stay positive: not every vaccinated
            // individual has a schedule
        }
    }
}
