pub mod disconnect;
pub mod engine;
pub mod stall;
pub mod stress;
pub mod suite;

pub use crate::domain::model::ProbeReport;
pub use crate::domain::ports::Probe;
pub use crate::utils::error::Result;
