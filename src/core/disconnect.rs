use crate::adapters::net::{connect_tcp, ProbeStream};
use crate::adapters::tls::TlsConnector;
use crate::config::DisconnectSettings;
use crate::core::{Probe, ProbeReport};
use crate::domain::model::DisconnectReport;
use crate::protocol::http::RawRequest;
use crate::protocol::xmlrpc::{get_file_call, Layout};
use crate::utils::error::{ProbeError, Result};
use chrono::Utc;
use std::io::Write;
use std::time::Instant;

/// Sends one raw `get_file` POST and hangs up without reading the answer.
pub struct DisconnectProbe {
    name: String,
    settings: DisconnectSettings,
}

impl DisconnectProbe {
    pub fn new(name: impl Into<String>, settings: DisconnectSettings) -> Self {
        Self {
            name: name.into(),
            settings,
        }
    }

    pub fn settings(&self) -> &DisconnectSettings {
        &self.settings
    }

    /// 組出要送出的原始 HTTP 請求
    pub fn build_request(&self) -> RawRequest {
        let body = get_file_call(self.settings.requested_size).to_xml(Layout::Compact);
        let request = RawRequest::xml_post(&self.settings.host, self.settings.port, body)
            .with_declared_length(self.settings.declared_length);

        match &self.settings.user_agent {
            Some(agent) => request.with_header("User-Agent", agent.as_str()),
            None => request,
        }
    }
}

#[async_trait::async_trait]
impl Probe for DisconnectProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<ProbeReport> {
        let request = self.build_request();
        let settings = self.settings.clone();

        // 阻塞式 socket 放到 blocking 執行緒
        let report = tokio::task::spawn_blocking(move || send_and_close(&settings, &request))
            .await
            .map_err(|e| ProbeError::TaskError {
                message: e.to_string(),
            })??;

        Ok(ProbeReport::Disconnect(report))
    }
}

fn send_and_close(settings: &DisconnectSettings, request: &RawRequest) -> Result<DisconnectReport> {
    let target = settings.target();
    let started_at = Utc::now();
    let start = Instant::now();

    let tcp = connect_tcp(&target, settings.timeout())?;
    let mut stream = if settings.tls {
        let connector = TlsConnector::new(settings.tls_options.clone())?;
        ProbeStream::Tls(Box::new(connector.connect(&target, tcp)?))
    } else {
        ProbeStream::Plain(tcp)
    };

    let bytes = request.to_bytes();
    let limit = settings
        .send_bytes
        .map_or(bytes.len(), |n| n.min(bytes.len()));

    if request.is_malformed() {
        tracing::debug!(
            "Announcing Content-Length {} for a {}-byte body",
            request.declared_length(),
            request.body_len()
        );
    }

    stream
        .write_all(&bytes[..limit])
        .and_then(|_| stream.flush())
        .map_err(|source| ProbeError::ConnectionError {
            target: target.authority(),
            source,
        })?;

    tracing::info!("Close prematurely");
    let tls = stream.is_tls();
    drop(stream);

    Ok(DisconnectReport {
        target,
        tls,
        request_bytes: bytes.len(),
        bytes_sent: limit,
        body_bytes: request.body_len(),
        declared_length: request.declared_length(),
        elapsed: start.elapsed(),
        started_at,
    })
}
