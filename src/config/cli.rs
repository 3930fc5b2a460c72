use crate::adapters::http::HttpClientOptions;
use crate::adapters::tls::TlsOptions;
use crate::config::{
    DisconnectSettings, StallSettings, StressSettings, DEFAULT_HOST, DEFAULT_PORT,
    DEFAULT_THRESHOLD_SECONDS,
};
use crate::protocol::xmlrpc::{DEFAULT_ECHO_FILL, DEFAULT_ECHO_LEN, DEFAULT_REQUESTED_SIZE};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "xmlrpc-probe")]
#[command(version)]
#[command(about = "Robustness probes for XML-RPC over HTTP/HTTPS servers")]
pub struct CliConfig {
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, global = true, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Exit with status 4 when a probe reports a stall or failed calls
    #[arg(long, global = true)]
    pub strict: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Send one raw get_file request and close the socket without reading
    Disconnect(DisconnectArgs),
    /// Time a large echo call against a threshold
    Stall(StallArgs),
    /// Run the echo check from several concurrent clients
    Stress(StressArgs),
    /// Run probes defined in a TOML suite file
    Suite(SuiteArgs),
}

#[derive(Debug, Clone, Args)]
pub struct DisconnectArgs {
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Use a plain TCP socket instead of TLS
    #[arg(long)]
    pub no_tls: bool,

    /// Verify the server certificate and hostname
    #[arg(long)]
    pub verify: bool,

    /// Expected SHA-256 fingerprint of the server certificate
    #[arg(long)]
    pub server_fingerprint: Option<String>,

    #[arg(long, default_value_t = DEFAULT_REQUESTED_SIZE)]
    pub requested_size: i32,

    /// Content-Length to announce instead of the real body length
    #[arg(long)]
    pub declared_length: Option<usize>,

    /// Write only this many bytes of the request
    #[arg(long)]
    pub send_bytes: Option<usize>,

    /// Connect/write timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    #[arg(long)]
    pub user_agent: Option<String>,
}

impl From<DisconnectArgs> for DisconnectSettings {
    fn from(args: DisconnectArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            tls: !args.no_tls,
            tls_options: TlsOptions {
                verify: args.verify,
                server_fingerprint: args.server_fingerprint,
            },
            requested_size: args.requested_size,
            declared_length: args.declared_length,
            send_bytes: args.send_bytes,
            timeout_seconds: args.timeout,
            user_agent: args.user_agent,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct StallArgs {
    /// Target URL, e.g. https://localhost:3344/
    pub url: String,

    #[arg(long, default_value_t = DEFAULT_ECHO_LEN)]
    pub payload_len: usize,

    #[arg(long, default_value_t = DEFAULT_ECHO_FILL)]
    pub fill: char,

    /// Round trips longer than this many seconds are reported as a stall
    #[arg(long, default_value_t = DEFAULT_THRESHOLD_SECONDS)]
    pub threshold: f64,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Send the body right away instead of waiting for `100 Continue`.
    /// Always the case when going through --proxy.
    #[arg(long)]
    pub no_expect: bool,

    #[arg(long)]
    pub proxy: Option<String>,

    /// Verify the server certificate
    #[arg(long)]
    pub verify: bool,
}

impl From<StallArgs> for StallSettings {
    fn from(args: StallArgs) -> Self {
        Self {
            url: args.url,
            payload_len: args.payload_len,
            fill: args.fill,
            threshold_seconds: args.threshold,
            expect_continue: !args.no_expect,
            client: HttpClientOptions {
                verify: args.verify,
                timeout_seconds: args.timeout,
                proxy: args.proxy,
            },
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct StressArgs {
    #[command(flatten)]
    pub stall: StallArgs,

    #[arg(long, default_value_t = 4)]
    pub clients: usize,

    #[arg(long, default_value_t = 1)]
    pub calls_per_client: usize,
}

impl From<StressArgs> for StressSettings {
    fn from(args: StressArgs) -> Self {
        Self {
            stall: args.stall.into(),
            clients: args.clients,
            calls_per_client: args.calls_per_client,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct SuiteArgs {
    /// Path to TOML suite file
    #[arg(short, long, default_value = "probe-suite.toml")]
    pub config: PathBuf,

    /// Override stop_on_failure from the suite file
    #[arg(long)]
    pub stop_on_failure: Option<bool>,

    /// Show the probes that would run without touching the network
    #[arg(long)]
    pub dry_run: bool,
}
