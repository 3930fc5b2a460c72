use crate::protocol::http::DEFAULT_USER_AGENT;
use crate::utils::error::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpClientOptions {
    /// Verify server certificates. Off by default, like `curl -k`.
    #[serde(default)]
    pub verify: bool,
    pub timeout_seconds: Option<u64>,
    pub proxy: Option<String>,
}

pub fn build_client(options: &HttpClientOptions) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(DEFAULT_USER_AGENT)
        .danger_accept_invalid_certs(!options.verify);

    if let Some(secs) = options.timeout_seconds {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    if let Some(proxy) = &options.proxy {
        tracing::debug!("Using proxy {}", proxy);
        builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
    }

    Ok(builder.build()?)
}
