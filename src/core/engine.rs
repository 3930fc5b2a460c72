use crate::core::{Probe, ProbeReport};
use crate::utils::error::Result;
use std::time::Instant;

pub struct ProbeEngine<P: Probe> {
    probe: P,
}

impl<P: Probe> ProbeEngine<P> {
    pub fn new(probe: P) -> Self {
        Self { probe }
    }

    pub async fn run(&self) -> Result<ProbeReport> {
        tracing::info!("🚀 Running probe '{}'", self.probe.name());
        let start = Instant::now();

        let report = self.probe.run().await?;

        if report.passed() {
            tracing::info!(
                "✅ {} finished in {:?}: {}",
                self.probe.name(),
                start.elapsed(),
                report.summary_line()
            );
        } else {
            tracing::warn!(
                "⚠️ {} finished in {:?}: {}",
                self.probe.name(),
                start.elapsed(),
                report.summary_line()
            );
        }

        Ok(report)
    }
}
