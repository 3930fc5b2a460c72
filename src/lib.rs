pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod protocol;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::cli::CliConfig;

pub use crate::config::{DisconnectSettings, StallSettings, StressSettings};
pub use crate::core::{
    disconnect::DisconnectProbe, engine::ProbeEngine, stall::StallProbe, stress::StressProbe,
    suite::ProbeSuite,
};
pub use crate::domain::model::{ProbeReport, Verdict};
pub use crate::utils::error::{ProbeError, Result};
