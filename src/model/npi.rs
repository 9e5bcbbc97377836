use anyhow::ensure;
use serde::{Deserialize, Serialize};

use crate::math::rng::SimRng;

use super::NUM_AGE_GROUPS;

/// A non-pharmaceutical intervention: over a node set and day range it
/// suppresses contacts between the given age-group pairs with some
/// effectiveness. Empty node or age lists match everything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Npi {
    pub name: String,
    #[serde(default)]
    pub node_ids: Vec<u32>,
    pub start_day: usize,
    /// inclusive
    pub end_day: usize,
    #[serde(default)]
    pub from_age_groups: Vec<usize>,
    #[serde(default)]
    pub to_age_groups: Vec<usize>,
    pub effectiveness: f64,
}

impl Npi {
    pub fn check(&self) -> anyhow::Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.effectiveness),
            "npi {:?}: effectiveness must be in [0, 1]",
            self.name
        );
        ensure!(
            self.start_day <= self.end_day,
            "npi {:?}: start_day must not exceed end_day",
            self.name
        );
        ensure!(
            self.from_age_groups.iter().all(|&a| a < NUM_AGE_GROUPS)
                && self.to_age_groups.iter().all(|&a| a < NUM_AGE_GROUPS),
            "npi {:?}: age group out of range",
            self.name
        );
        Ok(())
    }

    fn matches(&self, node_id: u32, day: usize, from_age: usize, to_age: usize) -> bool {
        (self.node_ids.is_empty() || self.node_ids.contains(&node_id))
            && day >= self.start_day
            && day <= self.end_day
            && (self.from_age_groups.is_empty() || self.from_age_groups.contains(&from_age))
            && (self.to_age_groups.is_empty() || self.to_age_groups.contains(&to_age))
    }

    /// Maximum effectiveness across all matching NPIs. Deterministic; used
    /// by the travel model as an attenuation factor.
    pub fn effectiveness(
        npis: &[Npi],
        node_id: u32,
        day: usize,
        from_age: usize,
        to_age: usize,
    ) -> f64 {
        npis.iter()
            .filter(|npi| npi.matches(node_id, day, from_age, to_age))
            .map(|npi| npi.effectiveness)
            .fold(0.0, f64::max)
    }

    /// Bernoulli draw against the maximum matching effectiveness. No draw
    /// is consumed when nothing matches.
    pub fn is_effective(
        npis: &[Npi],
        node_id: u32,
        day: usize,
        from_age: usize,
        to_age: usize,
        rng: &mut SimRng,
    ) -> bool {
        let effectiveness = Self::effectiveness(npis, node_id, day, from_age, to_age);
        effectiveness > 0.0 && rng.uniform() <= effectiveness
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn school_closure() -> Npi {
        Npi {
            name: "school closure".into(),
            node_ids: vec![10],
            start_day: 5,
            end_day: 20,
            from_age_groups: vec![0, 1],
            to_age_groups: vec![0, 1],
            effectiveness: 0.9,
        }
    }

    #[test]
    fn matching_respects_every_axis() {
        let npis = vec![school_closure()];
        assert_eq!(Npi::effectiveness(&npis, 10, 5, 0, 1), 0.9);
        assert_eq!(Npi::effectiveness(&npis, 10, 4, 0, 1), 0.0);
        assert_eq!(Npi::effectiveness(&npis, 10, 21, 0, 1), 0.0);
        assert_eq!(Npi::effectiveness(&npis, 11, 5, 0, 1), 0.0);
        assert_eq!(Npi::effectiveness(&npis, 10, 5, 2, 1), 0.0);
    }

    #[test]
    fn overlapping_npis_take_the_maximum() {
        let mut weak = school_closure();
        weak.effectiveness = 0.3;
        weak.node_ids = Vec::new();
        let npis = vec![weak, school_closure()];
        assert_eq!(Npi::effectiveness(&npis, 10, 10, 1, 1), 0.9);
        assert_eq!(Npi::effectiveness(&npis, 99, 10, 1, 1), 0.3);
    }

    #[test]
    fn full_effectiveness_always_fires() {
        let mut npi = school_closure();
        npi.effectiveness = 1.0;
        let npis = vec![npi];
        let mut rng = SimRng::seed_from(9);
        for _ in 0..100 {
            assert!(Npi::is_effective(&npis, 10, 10, 0, 0, &mut rng));
        }
        // nothing matches: no draw, never effective
        assert!(!Npi::is_effective(&npis, 10, 30, 0, 0, &mut rng));
    }
}
