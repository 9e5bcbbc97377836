use anyhow::ensure;
use serde::{Deserialize, Serialize};

use super::npi::Npi;
use super::{NUM_AGE_GROUPS, NUM_RISK_GROUPS, NUM_VACCINATED_GROUPS};

/// Disease and intervention parameters.
///
/// Rates are per day. `beta = r0 / beta_scale` is the transmission rate
/// given contact. Capacities are fractions of the total node population
/// distributable per day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// basic reproduction number
    pub r0: f64,
    pub beta_scale: f64,
    /// exposed -> asymptomatic rate
    pub tau: f64,
    /// asymptomatic -> treatable rate
    pub kappa: f64,
    /// treatable -> infectious rate
    pub chi: f64,
    /// recovery rate out of asymptomatic, treatable, infectious
    pub gamma: f64,
    /// death rate out of asymptomatic, treatable, infectious
    pub nu: f64,

    pub antiviral_effectiveness: f64,
    pub antiviral_adherence: f64,
    pub antiviral_capacity: f64,

    pub vaccine_effectiveness: f64,
    pub vaccine_adherence: f64,
    pub vaccine_capacity: f64,
    /// days between vaccination and vaccine-mediated immunity
    pub vaccine_latency_period: usize,

    pub npis: Vec<Npi>,
    pub antiviral_priority_groups: Vec<PriorityGroup>,
    pub vaccine_priority_groups: Vec<PriorityGroup>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            r0: 1.2,
            beta_scale: 65.0,
            tau: 1.2,
            kappa: 1.9,
            chi: 1.0,
            gamma: 0.24,
            nu: 0.0001,
            antiviral_effectiveness: 0.15,
            antiviral_adherence: 0.8,
            antiviral_capacity: 0.001,
            vaccine_effectiveness: 0.8,
            vaccine_adherence: 0.8,
            vaccine_capacity: 0.001,
            vaccine_latency_period: 14,
            npis: Vec::new(),
            antiviral_priority_groups: Vec::new(),
            vaccine_priority_groups: Vec::new(),
        }
    }
}

impl Parameters {
    pub fn beta(&self) -> f64 {
        self.r0 / self.beta_scale
    }

    pub fn check(&self) -> anyhow::Result<()> {
        ensure!(self.r0 >= 0.0, "r0 must be non-negative");
        ensure!(self.beta_scale > 0.0, "beta_scale must be positive");
        ensure!(self.tau > 0.0, "tau must be positive");
        ensure!(
            self.kappa >= 0.0 && self.chi >= 0.0 && self.gamma >= 0.0 && self.nu >= 0.0,
            "transition rates must be non-negative"
        );
        ensure!(
            self.gamma > 0.0 || self.nu > 0.0,
            "gamma and nu cannot both be zero: schedules must terminate"
        );
        for (name, value) in [
            ("antiviral_effectiveness", self.antiviral_effectiveness),
            ("antiviral_adherence", self.antiviral_adherence),
            ("vaccine_effectiveness", self.vaccine_effectiveness),
            ("vaccine_adherence", self.vaccine_adherence),
        ] {
            ensure!((0.0..=1.0).contains(&value), "{} must be in [0, 1]", name);
        }
        ensure!(self.antiviral_capacity >= 0.0, "antiviral_capacity must be non-negative");
        ensure!(self.vaccine_capacity >= 0.0, "vaccine_capacity must be non-negative");
        for npi in &self.npis {
            npi.check()?;
        }
        for group in self
            .antiviral_priority_groups
            .iter()
            .chain(&self.vaccine_priority_groups)
        {
            group.check()?;
        }
        Ok(())
    }
}

/// A named selection of strata eligible for an intervention. An empty
/// axis list selects every value on that axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityGroup {
    pub name: String,
    #[serde(default)]
    pub ages: Vec<usize>,
    #[serde(default)]
    pub risk_groups: Vec<usize>,
    #[serde(default)]
    pub vaccinated: Vec<usize>,
}

impl PriorityGroup {
    /// The whole population, for pure pro-rata treatment.
    pub fn universal() -> Self {
        Self {
            name: "_ALL_".to_string(),
            ages: Vec::new(),
            risk_groups: Vec::new(),
            vaccinated: Vec::new(),
        }
    }

    pub fn check(&self) -> anyhow::Result<()> {
        ensure!(
            self.ages.iter().all(|&a| a < NUM_AGE_GROUPS),
            "priority group {:?}: age group out of range",
            self.name
        );
        ensure!(
            self.risk_groups.iter().all(|&r| r < NUM_RISK_GROUPS),
            "priority group {:?}: risk group out of range",
            self.name
        );
        ensure!(
            self.vaccinated.iter().all(|&v| v < NUM_VACCINATED_GROUPS),
            "priority group {:?}: vaccinated group out of range",
            self.name
        );
        Ok(())
    }

    fn ages(&self) -> Vec<usize> {
        axis_values(&self.ages, NUM_AGE_GROUPS)
    }

    fn risk_groups(&self) -> Vec<usize> {
        axis_values(&self.risk_groups, NUM_RISK_GROUPS)
    }

    fn vaccinated(&self) -> Vec<usize> {
        axis_values(&self.vaccinated, NUM_VACCINATED_GROUPS)
    }
}

fn axis_values(selected: &[usize], cardinality: usize) -> Vec<usize> {
    if selected.is_empty() {
        (0..cardinality).collect()
    } else {
        selected.to_vec()
    }
}

/// Expand a selection into concrete (age, risk, vaccinated) strata,
/// deduplicated, in registration order.
pub fn expand_strata(groups: &[PriorityGroup]) -> Vec<[usize; 3]> {
    let mut strata: Vec<[usize; 3]> = Vec::new();
    for group in groups {
        for &a in &group.ages() {
            for &r in &group.risk_groups() {
                for &v in &group.vaccinated() {
                    let s = [a, r, v];
                    if !strata.contains(&s) {
                        strata.push(s);
                    }
                }
            }
        }
    }
    strata
}

/// Expand a selection into concrete (age, risk) pairs, deduplicated, in
/// registration order. The vaccinated axis is ignored: vaccine
/// application resolves it per compartment.
pub fn expand_age_risk(groups: &[PriorityGroup]) -> Vec<[usize; 2]> {
    let mut pairs: Vec<[usize; 2]> = Vec::new();
    for group in groups {
        for &a in &group.ages() {
            for &r in &group.risk_groups() {
                let p = [a, r];
                if !pairs.contains(&p) {
                    pairs.push(p);
                }
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_pass_check() {
        Parameters::default().check().unwrap();
    }

    #[test]
    fn terminating_rates_required() {
        let params = Parameters {
            gamma: 0.0,
            nu: 0.0,
            ..Parameters::default()
        };
        assert!(params.check().is_err());
    }

    #[test]
    fn universal_group_expands_to_all_strata() {
        let strata = expand_strata(&[PriorityGroup::universal()]);
        assert_eq!(strata.len(), NUM_AGE_GROUPS * NUM_RISK_GROUPS * NUM_VACCINATED_GROUPS);
        assert_eq!(strata[0], [0, 0, 0]);
    }

    #[test]
    fn overlapping_groups_deduplicate() {
        let children = PriorityGroup {
            name: "children".into(),
            ages: vec![0, 1],
            risk_groups: Vec::new(),
            vaccinated: Vec::new(),
        };
        let high_risk = PriorityGroup {
            name: "high risk".into(),
            ages: Vec::new(),
            risk_groups: vec![1],
            vaccinated: Vec::new(),
        };
        let strata = expand_strata(&[children.clone(), high_risk.clone()]);
        // 2 ages x 2 risks x 2 vacc = 8, plus 3 remaining ages x 1 risk x 2 vacc = 6
        assert_eq!(strata.len(), 14);
        let pairs = expand_age_risk(&[children, high_risk]);
        assert_eq!(pairs.len(), 7);
    }
}
