use crate::adapters::http::build_client;
use crate::adapters::net::{connect_tcp, ProbeStream};
use crate::adapters::tls::{TlsConnector, TlsOptions};
use crate::config::StallSettings;
use crate::core::{Probe, ProbeReport};
use crate::domain::model::{StallReport, Target};
use crate::protocol::http::{RawRequest, ResponseHead, XML_CONTENT_TYPE};
use crate::protocol::xmlrpc::{echo_call, Layout};
use crate::utils::error::{ProbeError, Result};
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::io::{self, BufReader, Write};
use std::time::{Duration, Instant};
use url::Url;

/// Posts a large `echo` call and times the full round trip.
#[derive(Clone)]
pub struct StallProbe {
    name: String,
    settings: StallSettings,
    client: Client,
}

impl StallProbe {
    pub fn new(name: impl Into<String>, settings: StallSettings) -> Result<Self> {
        let client = build_client(&settings.client)?;
        Ok(Self {
            name: name.into(),
            settings,
            client,
        })
    }

    pub fn settings(&self) -> &StallSettings {
        &self.settings
    }

    pub fn payload(&self) -> String {
        echo_call(self.settings.payload_len, self.settings.fill).to_xml(Layout::Pretty)
    }

    /// 送出一次 echo 並量測耗時
    pub async fn check(&self) -> Result<StallReport> {
        if self.settings.expect_continue {
            if self.settings.client.proxy.is_none() {
                return self.check_expect_continue().await;
            }
            tracing::debug!("Proxy configured, sending the body without Expect");
        }
        self.check_with_client().await
    }

    async fn check_with_client(&self) -> Result<StallReport> {
        let body = self.payload();
        let payload_bytes = body.len();

        tracing::debug!(
            "Posting {} bytes of echo payload to {}",
            payload_bytes,
            self.settings.url
        );

        let started_at = Utc::now();
        let start = Instant::now();
        let response = self
            .client
            .post(&self.settings.url)
            .header(CONTENT_TYPE, XML_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;
        let status = response.status();
        let response_body = response.bytes().await?;
        let elapsed = start.elapsed();

        tracing::debug!(
            "Response {} ({} bytes) in {:?}",
            status,
            response_body.len(),
            elapsed
        );
        if !status.is_success() {
            tracing::warn!("⚠️ Server answered with HTTP {}", status);
        }

        Ok(StallReport {
            url: self.settings.url.clone(),
            status: status.as_u16(),
            payload_bytes,
            response_bytes: response_body.len(),
            elapsed,
            threshold: self.settings.threshold(),
            started_at,
        })
    }

    async fn check_expect_continue(&self) -> Result<StallReport> {
        let url = Url::parse(&self.settings.url)?;
        let request = expect_request(&url, self.payload())?;
        let settings = self.settings.clone();

        // 阻塞式 socket 放到 blocking 執行緒
        tokio::task::spawn_blocking(move || post_expect_continue(&url, &request, &settings))
            .await
            .map_err(|e| ProbeError::TaskError {
                message: e.to_string(),
            })?
    }
}

fn url_target(url: &Url) -> Result<Target> {
    let invalid = |reason: &str| ProbeError::InvalidConfigValueError {
        field: "stall.url".to_string(),
        value: url.to_string(),
        reason: reason.to_string(),
    };
    // IPv6 位址不帶中括號才能解析
    let host = match url.host() {
        Some(url::Host::Ipv6(addr)) => addr.to_string(),
        Some(host) => host.to_string(),
        None => return Err(invalid("URL has no host")),
    };
    let port = url
        .port_or_known_default()
        .ok_or_else(|| invalid("URL has no port"))?;
    Ok(Target::new(host, port))
}

/// The echo POST with `Expect: 100-continue`, framed for a raw socket.
fn expect_request(url: &Url, body: String) -> Result<RawRequest> {
    let target = url_target(url)?;
    let host = url.host_str().unwrap_or(target.host.as_str());
    let host_header = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let path = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };

    Ok(RawRequest::xml_post(&target.host, target.port, body)
        .with_path(path)
        .with_header("Host", host_header)
        .with_header("Expect", "100-continue")
        .with_header("Connection", "close"))
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

fn post_expect_continue(
    url: &Url,
    request: &RawRequest,
    settings: &StallSettings,
) -> Result<StallReport> {
    let target = url_target(url)?;
    let timeout = settings.client.timeout_seconds.map(Duration::from_secs);
    let threshold = settings.threshold();
    let io_error = |source: io::Error| ProbeError::ConnectionError {
        target: target.authority(),
        source,
    };

    tracing::debug!(
        "Posting {} bytes of echo payload to {} with Expect: 100-continue",
        request.body_len(),
        url
    );

    let started_at = Utc::now();
    let start = Instant::now();

    let tcp = connect_tcp(&target, timeout)?;
    let stream = if url.scheme() == "https" {
        let connector = TlsConnector::new(TlsOptions {
            verify: settings.client.verify,
            server_fingerprint: None,
        })?;
        ProbeStream::Tls(Box::new(connector.connect(&target, tcp)?))
    } else {
        ProbeStream::Plain(tcp)
    };
    let mut reader = BufReader::new(stream);

    reader
        .get_mut()
        .write_all(&request.head_bytes())
        .and_then(|_| reader.get_mut().flush())
        .map_err(io_error)?;

    // 等待 100 Continue，最多等到門檻值
    reader
        .get_ref()
        .set_read_timeout(Some(threshold.max(Duration::from_millis(1))))
        .map_err(io_error)?;
    let early_answer = match ResponseHead::read_from(&mut reader) {
        Ok(head) if head.is_interim() => {
            tracing::debug!("{} Continue after {:?}", head.status, start.elapsed());
            None
        }
        Ok(head) => Some(head),
        Err(e) if is_timeout(&e) => {
            tracing::warn!(
                "⏳ No 100 Continue from {} within {:?}, sending the body anyway",
                target,
                threshold
            );
            None
        }
        Err(e) => return Err(io_error(e)),
    };
    reader.get_ref().set_read_timeout(timeout).map_err(io_error)?;

    let head = match early_answer {
        Some(head) => {
            tracing::debug!("Server answered {} before the body was sent", head.status);
            head
        }
        None => {
            reader
                .get_mut()
                .write_all(request.body())
                .and_then(|_| reader.get_mut().flush())
                .map_err(io_error)?;
            loop {
                let head = ResponseHead::read_from(&mut reader).map_err(io_error)?;
                if !head.is_interim() {
                    break head;
                }
            }
        }
    };
    let response_body = head.read_body(&mut reader).map_err(io_error)?;
    let elapsed = start.elapsed();

    tracing::debug!(
        "Response {} ({} bytes) in {:?}",
        head.status,
        response_body.len(),
        elapsed
    );
    if !(200..300).contains(&head.status) {
        tracing::warn!("⚠️ Server answered with HTTP {}", head.status);
    }

    Ok(StallReport {
        url: settings.url.clone(),
        status: head.status,
        payload_bytes: request.body_len(),
        response_bytes: response_body.len(),
        elapsed,
        threshold,
        started_at,
    })
}

#[async_trait::async_trait]
impl Probe for StallProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<ProbeReport> {
        Ok(ProbeReport::Stall(self.check().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn without_expect(url: String) -> StallSettings {
        let mut settings = StallSettings::new(url);
        settings.expect_continue = false;
        settings
    }

    #[test]
    fn test_expect_request_framing() {
        let url = Url::parse("http://localhost:3344/RPC2?x=1").unwrap();
        let request = expect_request(&url, "<x/>".to_string()).unwrap();
        let head = String::from_utf8(request.head_bytes()).unwrap();

        assert!(head.starts_with("POST /RPC2?x=1 HTTP/1.1\r\n"));
        assert!(head.contains("Host: localhost:3344\r\n"));
        assert!(head.contains("Expect: 100-continue\r\n"));
        assert!(head.contains("Connection: close\r\n"));
        assert!(head.ends_with("Content-Length: 4\r\n\r\n"));
    }

    #[test]
    fn test_expect_request_uses_default_port() {
        let url = Url::parse("https://example.com/").unwrap();
        let request = expect_request(&url, String::new()).unwrap();
        let head = String::from_utf8(request.head_bytes()).unwrap();

        assert!(head.contains("Host: example.com\r\n"));
        assert_eq!(url_target(&url).unwrap(), Target::new("example.com", 443));
    }

    #[tokio::test]
    async fn test_fast_echo_is_ok() {
        let server = MockServer::start();
        let echo_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/")
                .header("Content-Type", "text/xml")
                .body_contains("<methodName>echo</methodName>");
            then.status(200)
                .header("Content-Type", "text/xml")
                .body("<?xml version=\"1.0\"?><methodResponse/>");
        });

        let probe = StallProbe::new("echo", without_expect(server.url("/"))).unwrap();
        let report = probe.check().await.unwrap();

        echo_mock.assert();
        assert_eq!(report.status, 200);
        assert!(report.payload_bytes > 65535);
        assert!(report.verdict().is_ok());
        assert_eq!(report.verdict().to_string(), "OK");
    }

    #[tokio::test]
    async fn test_slow_echo_reports_timeout() {
        let server = MockServer::start();
        let echo_mock = server.mock(|when, then| {
            when.method(POST).path("/RPC2");
            then.status(200)
                .body("<methodResponse/>")
                .delay(Duration::from_millis(400));
        });

        let mut settings = without_expect(server.url("/RPC2"));
        settings.threshold_seconds = 0.1;
        let probe = StallProbe::new("echo", settings).unwrap();
        let report = probe.check().await.unwrap();

        echo_mock.assert();
        assert!(report.elapsed >= Duration::from_millis(400));
        assert!(report.verdict().to_string().starts_with("Expect timeout: "));
        assert!(report.verdict().to_string().ends_with('s'));
    }

    #[tokio::test]
    async fn test_server_error_keeps_timing_verdict() {
        let server = MockServer::start();
        let echo_mock = server.mock(|when, then| {
            when.method(POST).path("/");
            then.status(500);
        });

        let probe = StallProbe::new("echo", without_expect(server.url("/"))).unwrap();
        let report = probe.run().await.unwrap();

        echo_mock.assert();
        match report {
            ProbeReport::Stall(r) => {
                assert_eq!(r.status, 500);
                assert!(r.verdict().is_ok());
            }
            other => panic!("unexpected report: {:?}", other),
        }
    }
}
