use crate::domain::model::Target;
use crate::utils::error::{ProbeError, Result};
use openssl::ssl::SslStream;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// 依序嘗試解析出的每個位址，回傳第一個連上的
pub fn connect_tcp(target: &Target, timeout: Option<Duration>) -> Result<TcpStream> {
    let addrs = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .map_err(|source| ProbeError::ConnectionError {
            target: target.authority(),
            source,
        })?;

    let mut last_error = io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses");
    for addr in addrs {
        let attempt = match timeout {
            Some(t) => TcpStream::connect_timeout(&addr, t),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => {
                tracing::debug!("🔌 Connected to {} ({})", target, addr);
                // 握手階段也需要讀取逾時
                stream.set_read_timeout(timeout)?;
                stream.set_write_timeout(timeout)?;
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!("Connect to {} failed: {}", addr, e);
                last_error = e;
            }
        }
    }

    Err(ProbeError::ConnectionError {
        target: target.authority(),
        source: last_error,
    })
}

/// Plain or TLS socket. Dropping it closes the connection without a
/// TLS close_notify.
pub enum ProbeStream {
    Plain(TcpStream),
    Tls(Box<SslStream<TcpStream>>),
}

impl ProbeStream {
    pub fn is_tls(&self) -> bool {
        matches!(self, ProbeStream::Tls(_))
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            ProbeStream::Plain(s) => s.set_read_timeout(timeout),
            ProbeStream::Tls(s) => s.get_ref().set_read_timeout(timeout),
        }
    }
}

impl Read for ProbeStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ProbeStream::Plain(s) => s.read(buf),
            ProbeStream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for ProbeStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ProbeStream::Plain(s) => s.write(buf),
            ProbeStream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ProbeStream::Plain(s) => s.flush(),
            ProbeStream::Tls(s) => s.flush(),
        }
    }
}
