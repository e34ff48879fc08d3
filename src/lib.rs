pub mod composition;
pub mod config;
pub mod diagnostics;
pub mod distribution;
pub mod error;
pub mod experiments;
pub mod inventory;
pub mod inverse;
pub mod machine_repair;
pub mod models;
pub mod monte_carlo;
pub mod optimizer;
pub mod reporting;
pub mod rng;
pub mod stats;
pub mod truck_queue;
pub mod unloading_team;
pub mod validate;

pub use diagnostics::Diagnostics;
pub use error::{SimError, SimResult};
pub use models::{Metric, Report, Series};
pub use rng::{Lcg, UniformSource};
