use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

fn as_secs_f64<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// 探測目標 host:port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Outcome of a timed round trip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Ok,
    Timeout(Duration),
}

impl Verdict {
    /// `Ok` iff `elapsed <= threshold`.
    pub fn judge(elapsed: Duration, threshold: Duration) -> Self {
        if elapsed > threshold {
            Verdict::Timeout(elapsed)
        } else {
            Verdict::Ok
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Verdict::Ok)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Ok => write!(f, "OK"),
            Verdict::Timeout(elapsed) => write!(f, "Expect timeout: {:.6}s", elapsed.as_secs_f64()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DisconnectReport {
    pub target: Target,
    pub tls: bool,
    /// Framed request size.
    pub request_bytes: usize,
    pub bytes_sent: usize,
    pub body_bytes: usize,
    pub declared_length: usize,
    #[serde(serialize_with = "as_secs_f64")]
    pub elapsed: Duration,
    pub started_at: DateTime<Utc>,
}

impl DisconnectReport {
    pub fn truncated(&self) -> bool {
        self.bytes_sent < self.request_bytes
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StallReport {
    pub url: String,
    pub status: u16,
    pub payload_bytes: usize,
    pub response_bytes: usize,
    #[serde(serialize_with = "as_secs_f64")]
    pub elapsed: Duration,
    #[serde(serialize_with = "as_secs_f64")]
    pub threshold: Duration,
    pub started_at: DateTime<Utc>,
}

impl StallReport {
    pub fn verdict(&self) -> Verdict {
        Verdict::judge(self.elapsed, self.threshold)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StressReport {
    pub total: usize,
    pub ok: usize,
    pub stalled: usize,
    pub failed: usize,
    #[serde(serialize_with = "as_secs_f64")]
    pub max_elapsed: Duration,
}

impl StressReport {
    pub fn record(&mut self, outcome: Option<&StallReport>) {
        self.total += 1;
        match outcome {
            Some(report) => {
                if report.verdict().is_ok() {
                    self.ok += 1;
                } else {
                    self.stalled += 1;
                }
                self.max_elapsed = self.max_elapsed.max(report.elapsed);
            }
            None => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "probe", rename_all = "snake_case")]
pub enum ProbeReport {
    Disconnect(DisconnectReport),
    Stall(StallReport),
    Stress(StressReport),
}

impl ProbeReport {
    pub fn passed(&self) -> bool {
        match self {
            // 送出即成功，伺服器是否存活由下一個探測判斷
            ProbeReport::Disconnect(_) => true,
            ProbeReport::Stall(report) => report.verdict().is_ok(),
            ProbeReport::Stress(report) => report.stalled == 0 && report.failed == 0,
        }
    }

    pub fn summary_line(&self) -> String {
        match self {
            ProbeReport::Disconnect(r) => format!(
                "Close prematurely: sent {}/{} bytes to {}{}",
                r.bytes_sent,
                r.request_bytes,
                r.target,
                if r.tls { " over TLS" } else { "" }
            ),
            ProbeReport::Stall(r) => r.verdict().to_string(),
            ProbeReport::Stress(r) => format!(
                "{} calls: {} ok, {} stalled, {} failed (max {:.6}s)",
                r.total,
                r.ok,
                r.stalled,
                r.failed,
                r.max_elapsed.as_secs_f64()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stall(elapsed_ms: u64) -> StallReport {
        StallReport {
            url: "http://localhost:3344/".to_string(),
            status: 200,
            payload_bytes: 10,
            response_bytes: 10,
            elapsed: Duration::from_millis(elapsed_ms),
            threshold: Duration::from_secs(1),
            started_at: Utc::now(),
        }
    }

    #[test]
    fn test_verdict_threshold_is_inclusive() {
        let threshold = Duration::from_secs(1);
        assert_eq!(Verdict::judge(Duration::from_millis(999), threshold), Verdict::Ok);
        assert_eq!(Verdict::judge(threshold, threshold), Verdict::Ok);
        assert!(!Verdict::judge(Duration::from_millis(1001), threshold).is_ok());
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::Ok.to_string(), "OK");
        assert_eq!(
            Verdict::Timeout(Duration::from_millis(1500)).to_string(),
            "Expect timeout: 1.500000s"
        );
    }

    #[test]
    fn test_stress_report_counts() {
        let mut report = StressReport::default();
        report.record(Some(&stall(100)));
        report.record(Some(&stall(2500)));
        report.record(None);

        assert_eq!(report.total, 3);
        assert_eq!(report.ok, 1);
        assert_eq!(report.stalled, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.max_elapsed, Duration::from_millis(2500));
        assert!(!ProbeReport::Stress(report).passed());
    }

    #[test]
    fn test_report_serializes_with_probe_tag() {
        let report = ProbeReport::Stall(stall(250));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["probe"], "stall");
        assert_eq!(json["status"], 200);
        assert_eq!(json["elapsed"], 0.25);
        assert_eq!(report.summary_line(), "OK");
    }

    #[test]
    fn test_disconnect_summary() {
        let report = DisconnectReport {
            target: Target::new("127.0.0.1", 3344),
            tls: true,
            request_bytes: 400,
            bytes_sent: 400,
            body_bytes: 250,
            declared_length: 250,
            elapsed: Duration::from_millis(3),
            started_at: Utc::now(),
        };
        assert!(!report.truncated());
        assert_eq!(
            ProbeReport::Disconnect(report).summary_line(),
            "Close prematurely: sent 400/400 bytes to 127.0.0.1:3344 over TLS"
        );
    }
}
