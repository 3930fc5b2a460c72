use crate::config::toml_config::{ProbeDefinition, ProbeKind, SuiteConfig};
use crate::core::disconnect::DisconnectProbe;
use crate::core::stall::StallProbe;
use crate::core::stress::StressProbe;
use crate::core::{Probe, ProbeReport};
use crate::utils::error::{ProbeError, Result};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// 單一探測的執行結果
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub probe_name: String,
    pub report: Option<ProbeReport>,
    pub error: Option<String>,
    pub duration: Duration,
}

impl ProbeResult {
    pub fn passed(&self) -> bool {
        self.report.as_ref().map(|r| r.passed()).unwrap_or(false)
    }
}

/// Builds the concrete probe for a suite entry.
pub fn build_probe(definition: &ProbeDefinition) -> Result<Box<dyn Probe>> {
    let probe: Box<dyn Probe> = match &definition.kind {
        ProbeKind::Disconnect(settings) => {
            Box::new(DisconnectProbe::new(definition.name.clone(), settings.clone()))
        }
        ProbeKind::Stall(settings) => {
            Box::new(StallProbe::new(definition.name.clone(), settings.clone())?)
        }
        ProbeKind::Stress(settings) => {
            Box::new(StressProbe::new(definition.name.clone(), settings.clone())?)
        }
    };
    Ok(probe)
}

/// 依序執行多個探測
pub struct ProbeSuite {
    probes: Vec<Box<dyn Probe>>,
    execution_id: String,
    stop_on_failure: bool,
}

impl ProbeSuite {
    pub fn new(execution_id: String) -> Self {
        Self {
            probes: Vec::new(),
            execution_id,
            stop_on_failure: false,
        }
    }

    pub fn from_config(config: &SuiteConfig) -> Result<Self> {
        let mut suite =
            Self::new(config.suite.name.clone()).with_stop_on_failure(config.stop_on_failure());
        for definition in config.ordered_probes()? {
            suite.add_probe(build_probe(definition)?);
        }
        Ok(suite)
    }

    pub fn with_stop_on_failure(mut self, stop: bool) -> Self {
        self.stop_on_failure = stop;
        self
    }

    pub fn add_probe(&mut self, probe: Box<dyn Probe>) {
        self.probes.push(probe);
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// 執行所有探測
    pub async fn execute_all(&self) -> Result<Vec<ProbeResult>> {
        let mut results = Vec::with_capacity(self.probes.len());
        tracing::info!(
            "🔄 Suite '{}' starting ({} probes)",
            self.execution_id,
            self.probes.len()
        );

        for probe in &self.probes {
            let start_time = Instant::now();
            let outcome = probe.run().await;
            let duration = start_time.elapsed();

            match outcome {
                Ok(report) => {
                    if !report.passed() {
                        tracing::warn!(
                            "⚠️ Probe '{}' did not pass: {}",
                            probe.name(),
                            report.summary_line()
                        );
                        if self.stop_on_failure {
                            return Err(ProbeError::ProbeFailed {
                                probe: probe.name().to_string(),
                                details: report.summary_line(),
                            });
                        }
                    } else {
                        tracing::info!(
                            "✅ Probe executed: {} ({}, duration: {:?})",
                            probe.name(),
                            report.summary_line(),
                            duration
                        );
                    }
                    results.push(ProbeResult {
                        probe_name: probe.name().to_string(),
                        report: Some(report),
                        error: None,
                        duration,
                    });
                }
                Err(e) => {
                    tracing::error!("❌ Probe '{}' failed: {}", probe.name(), e);
                    if self.stop_on_failure {
                        return Err(ProbeError::ProbeFailed {
                            probe: probe.name().to_string(),
                            details: e.to_string(),
                        });
                    }
                    results.push(ProbeResult {
                        probe_name: probe.name().to_string(),
                        report: None,
                        error: Some(e.to_string()),
                        duration,
                    });
                }
            }
        }

        Ok(results)
    }

    /// 獲取執行摘要
    pub fn get_execution_summary(results: &[ProbeResult]) -> HashMap<String, serde_json::Value> {
        let mut summary = HashMap::new();

        let total_probes = results.len();
        let passed = results.iter().filter(|r| r.passed()).count();
        let errored = results.iter().filter(|r| r.error.is_some()).count();
        let total_duration: Duration = results.iter().map(|r| r.duration).sum();

        summary.insert("total_probes".to_string(), serde_json::Value::Number(total_probes.into()));
        summary.insert("passed".to_string(), serde_json::Value::Number(passed.into()));
        summary.insert(
            "failed".to_string(),
            serde_json::Value::Number((total_probes - passed).into()),
        );
        summary.insert("errored".to_string(), serde_json::Value::Number(errored.into()));
        summary.insert(
            "total_duration_ms".to_string(),
            serde_json::Value::Number((total_duration.as_millis() as u64).into()),
        );

        let probe_names: Vec<serde_json::Value> = results
            .iter()
            .map(|r| serde_json::Value::String(r.probe_name.clone()))
            .collect();
        summary.insert("executed_probes".to_string(), serde_json::Value::Array(probe_names));

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::StressReport;

    struct MockProbe {
        name: String,
        fail: bool,
        stalled: usize,
    }

    impl MockProbe {
        fn ok(name: &str) -> Box<dyn Probe> {
            Box::new(Self {
                name: name.to_string(),
                fail: false,
                stalled: 0,
            })
        }

        fn failing(name: &str) -> Box<dyn Probe> {
            Box::new(Self {
                name: name.to_string(),
                fail: true,
                stalled: 0,
            })
        }

        fn stalling(name: &str) -> Box<dyn Probe> {
            Box::new(Self {
                name: name.to_string(),
                fail: false,
                stalled: 1,
            })
        }
    }

    #[async_trait::async_trait]
    impl Probe for MockProbe {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self) -> Result<ProbeReport> {
            if self.fail {
                return Err(ProbeError::ConnectionError {
                    target: "127.0.0.1:1".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
                });
            }
            Ok(ProbeReport::Stress(StressReport {
                total: 1,
                ok: 1 - self.stalled,
                stalled: self.stalled,
                ..Default::default()
            }))
        }
    }

    #[tokio::test]
    async fn test_execute_all_in_order() {
        let mut suite = ProbeSuite::new("test".to_string());
        suite.add_probe(MockProbe::ok("first"));
        suite.add_probe(MockProbe::stalling("second"));
        assert_eq!(suite.len(), 2);

        let results = suite.execute_all().await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].probe_name, "first");
        assert!(results[0].passed());
        assert_eq!(results[1].probe_name, "second");
        assert!(!results[1].passed());
        assert!(results[1].error.is_none());
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_suite_continues() {
        let mut suite = ProbeSuite::new("test".to_string());
        suite.add_probe(MockProbe::failing("broken"));
        suite.add_probe(MockProbe::ok("after"));

        let results = suite.execute_all().await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].error.as_ref().unwrap().contains("127.0.0.1:1"));
        assert!(results[1].passed());

        let summary = ProbeSuite::get_execution_summary(&results);
        assert_eq!(summary.get("total_probes").unwrap(), 2);
        assert_eq!(summary.get("passed").unwrap(), 1);
        assert_eq!(summary.get("failed").unwrap(), 1);
        assert_eq!(summary.get("errored").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stop_on_failure() {
        let mut suite = ProbeSuite::new("test".to_string()).with_stop_on_failure(true);
        suite.add_probe(MockProbe::failing("broken"));
        suite.add_probe(MockProbe::ok("never"));

        let err = suite.execute_all().await.unwrap_err();
        match err {
            ProbeError::ProbeFailed { probe, .. } => assert_eq!(probe, "broken"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stop_on_failure_after_stalled_report() {
        let mut suite = ProbeSuite::new("test".to_string()).with_stop_on_failure(true);
        suite.add_probe(MockProbe::stalling("slow"));
        suite.add_probe(MockProbe::ok("never"));

        let err = suite.execute_all().await.unwrap_err();
        match err {
            ProbeError::ProbeFailed { probe, details } => {
                assert_eq!(probe, "slow");
                assert!(details.contains("stalled"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_from_config_builds_enabled_probes() {
        let config = SuiteConfig::from_toml_str(
            r#"
[suite]
name = "build"
stop_on_failure = true

[[probes]]
name = "abort"
type = "disconnect"

[[probes]]
name = "echo"
type = "stall"
url = "http://localhost:3344/"
enabled = false
"#,
        )
        .unwrap();

        let suite = ProbeSuite::from_config(&config).unwrap();
        assert_eq!(suite.len(), 1);
        assert!(suite.stop_on_failure);
    }
}
