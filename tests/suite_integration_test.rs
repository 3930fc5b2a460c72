mod common;

use anyhow::Result;
use common::{closed_port, CaptureServer};
use httpmock::prelude::*;
use std::time::Duration;
use tempfile::TempDir;
use xmlrpc_probe::config::toml_config::SuiteConfig;
use xmlrpc_probe::utils::validation::Validate;
use xmlrpc_probe::{ProbeReport, ProbeSuite};

/// 斷線探測之後再確認伺服器仍能回應 echo
#[tokio::test]
async fn test_suite_disconnect_then_echo() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let capture = CaptureServer::plain();
    let server = MockServer::start();

    let echo_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/RPC2")
            .body_contains("<methodName>echo</methodName>");
        then.status(200)
            .header("Content-Type", "text/xml")
            .body("<?xml version=\"1.0\"?><methodResponse/>");
    });

    let config_content = format!(
        r#"
[suite]
name = "robustness"
description = "abrupt disconnect followed by a timed echo"

[[probes]]
name = "abort-get-file"
type = "disconnect"
host = "127.0.0.1"
port = {}
tls = false
timeout_seconds = 5

[[probes]]
name = "echo-65535"
type = "stall"
url = "{}"
threshold_seconds = 5
expect_continue = false
"#,
        capture.port,
        server.url("/RPC2")
    );

    let config_path = temp_dir.path().join("suite.toml");
    tokio::fs::write(&config_path, config_content).await?;

    let config = SuiteConfig::from_file(&config_path)?;
    config.validate()?;

    let suite = ProbeSuite::from_config(&config)?;
    let results = suite.execute_all().await?;

    echo_mock.assert();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.passed()));

    let received = String::from_utf8(capture.received())?;
    assert!(received.contains("<methodName>get_file</methodName>"));

    match results[1].report.as_ref() {
        Some(ProbeReport::Stall(report)) => {
            assert_eq!(report.status, 200);
            assert_eq!(report.verdict().to_string(), "OK");
        }
        other => panic!("unexpected report: {:?}", other),
    }

    let summary = ProbeSuite::get_execution_summary(&results);
    assert_eq!(summary.get("total_probes").unwrap(), 2);
    assert_eq!(summary.get("passed").unwrap(), 2);

    Ok(())
}

#[tokio::test]
async fn test_suite_reports_stall_and_connection_error() -> Result<()> {
    let server = MockServer::start();
    let slow_mock = server.mock(|when, then| {
        when.method(POST).path("/");
        then.status(200)
            .body("<methodResponse/>")
            .delay(Duration::from_millis(300));
    });

    let config_content = format!(
        r#"
[suite]
name = "failing"
execution_order = ["slow-echo", "nobody-home"]

[[probes]]
name = "nobody-home"
type = "disconnect"
port = {}
tls = false
timeout_seconds = 2

[[probes]]
name = "slow-echo"
type = "stall"
url = "{}"
threshold_seconds = 0.05
expect_continue = false
payload_len = 1024
"#,
        closed_port(),
        server.url("/")
    );

    let config = SuiteConfig::from_toml_str(&config_content)?;
    config.validate()?;

    let results = ProbeSuite::from_config(&config)?.execute_all().await?;

    slow_mock.assert();
    assert_eq!(results[0].probe_name, "slow-echo");
    assert!(!results[0].passed());
    assert!(results[0]
        .report
        .as_ref()
        .unwrap()
        .summary_line()
        .starts_with("Expect timeout: "));

    assert_eq!(results[1].probe_name, "nobody-home");
    assert!(results[1].report.is_none());
    assert!(results[1].error.is_some());

    let summary = ProbeSuite::get_execution_summary(&results);
    assert_eq!(summary.get("failed").unwrap(), 2);
    assert_eq!(summary.get("errored").unwrap(), 1);

    Ok(())
}

#[tokio::test]
async fn test_stop_on_failure_aborts_suite() -> Result<()> {
    let config_content = format!(
        r#"
[suite]
name = "strict"
stop_on_failure = true

[[probes]]
name = "nobody-home"
type = "disconnect"
port = {}
tls = false
timeout_seconds = 2

[[probes]]
name = "never-runs"
type = "stall"
url = "http://127.0.0.1:1/"
"#,
        closed_port()
    );

    let config = SuiteConfig::from_toml_str(&config_content)?;
    let result = ProbeSuite::from_config(&config)?.execute_all().await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("nobody-home"));

    Ok(())
}
