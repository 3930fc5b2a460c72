// Adapters layer: concrete implementations for external systems (sockets, TLS, HTTP client).

pub mod http;
pub mod net;
pub mod tls;
