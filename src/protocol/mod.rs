pub mod http;
pub mod xmlrpc;

pub use http::RawRequest;
pub use xmlrpc::{echo_call, get_file_call, Layout, MethodCall, Value};
