//! Raw HTTP/1.1 request framing for probes that write straight to a socket,
//! plus just enough response parsing to read one answer back.

use std::io::{self, BufRead};

pub const DEFAULT_USER_AGENT: &str = concat!("xmlrpc-probe/", env!("CARGO_PKG_VERSION"));
pub const XML_CONTENT_TYPE: &str = "text/xml";

#[derive(Debug, Clone)]
pub struct RawRequest {
    method: String,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    declared_length: Option<usize>,
}

impl RawRequest {
    /// XML-RPC POST with the same header set the original probe used.
    pub fn xml_post(host: &str, port: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: "POST".to_string(),
            path: "/".to_string(),
            headers: vec![
                ("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string()),
                ("Host".to_string(), format!("{}:{}", host, port)),
                ("Accept".to_string(), "*/*".to_string()),
                ("Content-type".to_string(), XML_CONTENT_TYPE.to_string()),
            ],
            body: body.into(),
            declared_length: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Replaces a header of the same (case-insensitive) name or appends it.
    /// `Content-Length` is always framed by `to_bytes`, so a numeric value
    /// becomes the declared length instead of a second header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if name.eq_ignore_ascii_case("content-length") {
            match value.trim().parse::<usize>() {
                Ok(declared) => self.declared_length = Some(declared),
                Err(_) => tracing::warn!("Ignoring non-numeric Content-Length '{}'", value),
            }
            return self;
        }
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(existing) => existing.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    /// 讓 Content-Length 宣告與實際 body 長度不符
    pub fn with_declared_length(mut self, declared: Option<usize>) -> Self {
        self.declared_length = declared;
        self
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    pub fn declared_length(&self) -> usize {
        self.declared_length.unwrap_or(self.body.len())
    }

    pub fn is_malformed(&self) -> bool {
        self.declared_length() != self.body.len()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Request line and headers, up to and including the blank line.
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut head = format!("{} {} HTTP/1.1\r\n", self.method, self.path);
        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        head.push_str(&format!("Content-Length: {}\r\n\r\n", self.declared_length()));
        head.into_bytes()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.head_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }

    /// Exact size on the wire.
    pub fn len(&self) -> usize {
        self.to_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Status line and headers of one HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    pub fn read_from<R: BufRead>(reader: &mut R) -> io::Result<Self> {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before a response",
            ));
        }
        let status = parse_status_line(line.trim_end())?;

        let mut headers = Vec::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed inside the response head",
                ));
            }
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                break;
            }
            if let Some((name, value)) = trimmed.split_once(':') {
                headers.push((name.trim().to_string(), value.trim().to_string()));
            }
        }

        Ok(Self { status, headers })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 1xx, e.g. `100 Continue`.
    pub fn is_interim(&self) -> bool {
        (100..200).contains(&self.status)
    }

    pub fn content_length(&self) -> Option<usize> {
        self.header("Content-Length")
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn is_chunked(&self) -> bool {
        self.header("Transfer-Encoding")
            .map_or(false, |v| v.to_ascii_lowercase().contains("chunked"))
    }

    /// Reads the body that follows this head: chunked, sized, or up to EOF.
    pub fn read_body<R: BufRead>(&self, reader: &mut R) -> io::Result<Vec<u8>> {
        if self.is_chunked() {
            return read_chunked(reader);
        }
        if let Some(len) = self.content_length() {
            let mut body = vec![0u8; len];
            reader.read_exact(&mut body)?;
            return Ok(body);
        }

        let mut body = Vec::new();
        match reader.read_to_end(&mut body) {
            Ok(_) => Ok(body),
            // 伺服器直接斷線也視為 body 結束
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(body),
            Err(e) => Err(e),
        }
    }
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn parse_status_line(line: &str) -> io::Result<u16> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => code
            .parse()
            .map_err(|_| invalid_data(format!("bad status code in '{}'", line))),
        _ => Err(invalid_data(format!("bad status line '{}'", line))),
    }
}

fn read_chunked<R: BufRead>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed inside a chunked body",
            ));
        }
        let size_field = line.trim_end().split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_field, 16)
            .map_err(|_| invalid_data(format!("bad chunk size '{}'", size_field)))?;

        if size == 0 {
            // trailers
            loop {
                line.clear();
                if reader.read_line(&mut line)? == 0 || line.trim_end().is_empty() {
                    return Ok(body);
                }
            }
        }

        let start = body.len();
        body.resize(start + size, 0);
        reader.read_exact(&mut body[start..])?;
        line.clear();
        reader.read_line(&mut line)?;
    }
}
