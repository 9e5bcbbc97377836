pub mod ili;
pub mod interventions;
pub mod npi;
pub mod params;
pub mod schedule;
pub mod seatird;
pub mod stockpile;
pub mod store;

/// Fixed stratification cardinalities. The engine is built around exactly
/// these three axes; scenario construction rejects anything else.
pub const NUM_AGE_GROUPS: usize = 5;
pub const NUM_RISK_GROUPS: usize = 2;
pub const NUM_VACCINATED_GROUPS: usize = 2;

/// Wildcard stratum value: aggregate across the whole axis.
pub const ALL: usize = usize::MAX;

pub const AGE_GROUP_LABELS: [&str; NUM_AGE_GROUPS] =
    ["0-4 years", "5-24 years", "25-49 years", "50-64 years", "65+ years"];
pub const RISK_GROUP_LABELS: [&str; NUM_RISK_GROUPS] = ["low risk", "high risk"];
pub const VACCINATED_LABELS: [&str; NUM_VACCINATED_GROUPS] = ["unvaccinated", "vaccinated"];
