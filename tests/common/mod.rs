#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::ssl::{SslAcceptor, SslMethod};
use openssl::x509::{X509NameBuilder, X509};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Reads everything one client sends until it hangs up.
pub struct CaptureServer {
    pub port: u16,
    handle: JoinHandle<Vec<u8>>,
}

impl CaptureServer {
    pub fn plain() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(10)))
                .unwrap();
            read_until_closed(&mut stream)
        });

        Self { port, handle }
    }

    pub fn tls(key: PKey<Private>, cert: X509) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut builder = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
        builder.set_private_key(&key).unwrap();
        builder.set_certificate(&cert).unwrap();
        builder.check_private_key().unwrap();
        let acceptor = builder.build();

        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(10)))
                .unwrap();
            match acceptor.accept(stream) {
                Ok(mut tls) => read_until_closed(&mut tls),
                Err(_) => Vec::new(),
            }
        });

        Self { port, handle }
    }

    pub fn received(self) -> Vec<u8> {
        self.handle.join().unwrap()
    }
}

// The client never sends close_notify, so a read error ends the capture too.
fn read_until_closed<R: Read>(reader: &mut R) -> Vec<u8> {
    let mut received = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => received.extend_from_slice(&chunk[..n]),
        }
    }
    received
}

/// What an `EchoServer` saw of the request.
pub struct EchoRequest {
    pub head: String,
    pub body_len: usize,
    /// Time between the end of the head and the last body byte.
    pub body_wait: Duration,
}

/// Answers one XML-RPC POST. With `send_continue` off it never sends the
/// interim `100 Continue`, like a server that ignores `Expect`.
pub struct EchoServer {
    pub port: u16,
    handle: JoinHandle<EchoRequest>,
}

impl EchoServer {
    pub fn start(send_continue: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(10)))
                .unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut head = String::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                head.push_str(&line);
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let head_done = Instant::now();

            let content_length: usize = head
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse().unwrap())
                })
                .unwrap_or(0);

            if send_continue && head.to_ascii_lowercase().contains("expect: 100-continue") {
                stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").unwrap();
            }

            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();
            let body_wait = head_done.elapsed();

            let answer = "<?xml version=\"1.0\"?><methodResponse/>";
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                answer.len(),
                answer
            );
            stream.write_all(response.as_bytes()).unwrap();

            EchoRequest {
                head,
                body_len: body.len(),
                body_wait,
            }
        });

        Self { port, handle }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    pub fn request(self) -> EchoRequest {
        self.handle.join().unwrap()
    }
}

pub fn self_signed_cert() -> (PKey<Private>, X509) {
    let rsa = Rsa::generate(2048).unwrap();
    let key = PKey::from_rsa(rsa).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", "localhost").unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(1).unwrap())
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();

    (key, builder.build())
}

/// A port nobody listens on.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
