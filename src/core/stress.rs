use crate::config::StressSettings;
use crate::core::stall::StallProbe;
use crate::core::{Probe, ProbeReport};
use crate::domain::model::{StallReport, StressReport};
use crate::utils::error::{ProbeError, Result};
use tokio::task::JoinSet;

/// Several concurrent clients, each making sequential echo calls.
pub struct StressProbe {
    name: String,
    calls_per_client: usize,
    /// 每個 client 有自己的連線池
    clients: Vec<StallProbe>,
}

impl StressProbe {
    pub fn new(name: impl Into<String>, settings: StressSettings) -> Result<Self> {
        let name = name.into();
        let clients = (0..settings.clients)
            .map(|id| StallProbe::new(format!("{}-client-{}", name, id), settings.stall.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name,
            calls_per_client: settings.calls_per_client,
            clients,
        })
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn client_names(&self) -> Vec<&str> {
        self.clients.iter().map(|c| c.name()).collect()
    }
}

#[async_trait::async_trait]
impl Probe for StressProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<ProbeReport> {
        let mut tasks = JoinSet::new();

        for (client_id, client) in self.clients.iter().cloned().enumerate() {
            let calls = self.calls_per_client;
            tasks.spawn(async move {
                let mut outcomes: Vec<Option<StallReport>> = Vec::with_capacity(calls);
                for call in 0..calls {
                    match client.check().await {
                        Ok(report) => outcomes.push(Some(report)),
                        Err(e) => {
                            // 單次失敗只計數，不中斷整體壓測
                            tracing::warn!("Client {} call {} failed: {}", client_id, call, e);
                            outcomes.push(None);
                        }
                    }
                }
                outcomes
            });
        }

        let mut report = StressReport::default();
        while let Some(joined) = tasks.join_next().await {
            let outcomes = joined.map_err(|e| ProbeError::TaskError {
                message: e.to_string(),
            })?;
            for outcome in &outcomes {
                report.record(outcome.as_ref());
            }
        }

        tracing::debug!(
            "Stress finished: {} calls, {} stalled, {} failed",
            report.total,
            report.stalled,
            report.failed
        );
        Ok(ProbeReport::Stress(report))
    }
}
