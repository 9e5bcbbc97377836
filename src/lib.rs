pub mod io;
pub mod math;
pub mod model;

pub use model::params::{Parameters, PriorityGroup};
pub use model::seatird::{SeatirdScenario, StochasticSeatird};
pub use model::store::Variable;
