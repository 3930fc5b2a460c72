//! XML-RPC `methodCall` encoding.
//!
//! Only the client direction is covered: values are turned into request
//! bodies, nothing here parses XML.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::NaiveDateTime;

pub const XML_DECLARATION: &str = r#"<?xml version="1.0"?>"#;

/// 預設 echo 負載長度 (65535 個字元)
pub const DEFAULT_ECHO_LEN: usize = 65535;
pub const DEFAULT_ECHO_FILL: char = 'a';
pub const DEFAULT_REQUESTED_SIZE: i32 = 55000;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Int(i32),
    Boolean(bool),
    Double(f64),
    String(String),
    Base64(Vec<u8>),
    DateTime(NaiveDateTime),
    Array(Vec<Value>),
    /// Members keep insertion order.
    Struct(Vec<(String, Value)>),
}

impl Value {
    pub fn structure<K, I>(members: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Struct(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Int(_) => "int",
            Value::Boolean(_) => "boolean",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Base64(_) => "base64",
            Value::DateTime(_) => "dateTime.iso8601",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// No whitespace between tags.
    #[default]
    Compact,
    /// One element per line, two-space indentation.
    Pretty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method_name: String,
    pub params: Vec<Value>,
}

impl MethodCall {
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn to_xml(&self, layout: Layout) -> String {
        let mut w = XmlWriter::new(layout);
        w.line(XML_DECLARATION);
        w.open("methodCall");
        w.leaf("methodName", &escape(&self.method_name));
        w.open("params");
        for param in &self.params {
            w.open("param");
            write_value(&mut w, param);
            w.close("param");
        }
        w.close("params");
        w.close("methodCall");
        w.finish()
    }
}

/// `get_file` 呼叫：單一 struct 參數，成員 `requested-size`
pub fn get_file_call(requested_size: i32) -> MethodCall {
    MethodCall::new("get_file").param(Value::structure([(
        "requested-size",
        Value::Int(requested_size),
    )]))
}

/// `echo` 呼叫：單一字串參數，內容為 `len` 個 `fill`
pub fn echo_call(len: usize, fill: char) -> MethodCall {
    let body: String = std::iter::repeat(fill).take(len).collect();
    MethodCall::new("echo").param(Value::String(body))
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn write_value(w: &mut XmlWriter, value: &Value) {
    w.open("value");
    let tag = value.type_name();
    match value {
        Value::Nil => w.empty(tag),
        Value::Int(v) => w.leaf(tag, &v.to_string()),
        Value::Boolean(v) => w.leaf(tag, if *v { "1" } else { "0" }),
        // 非有限值不是合法的 XML-RPC double，照原樣輸出
        Value::Double(v) => w.leaf(tag, &v.to_string()),
        Value::String(v) => w.leaf(tag, &escape(v)),
        Value::Base64(v) => w.leaf(tag, &BASE64.encode(v)),
        Value::DateTime(v) => w.leaf(tag, &v.format("%Y%m%dT%H:%M:%S").to_string()),
        Value::Array(items) => {
            w.open(tag);
            w.open("data");
            for item in items {
                write_value(w, item);
            }
            w.close("data");
            w.close(tag);
        }
        Value::Struct(members) => {
            w.open(tag);
            for (name, member) in members {
                w.open("member");
                w.leaf("name", &escape(name));
                write_value(w, member);
                w.close("member");
            }
            w.close(tag);
        }
    }
    w.close("value");
}

struct XmlWriter {
    out: String,
    layout: Layout,
    depth: usize,
}

impl XmlWriter {
    fn new(layout: Layout) -> Self {
        Self {
            out: String::new(),
            layout,
            depth: 0,
        }
    }

    fn line(&mut self, text: &str) {
        if self.layout == Layout::Pretty {
            if !self.out.is_empty() {
                self.out.push('\n');
            }
            for _ in 0..self.depth {
                self.out.push_str("  ");
            }
        }
        self.out.push_str(text);
    }

    fn open(&mut self, tag: &str) {
        self.line(&format!("<{}>", tag));
        self.depth += 1;
    }

    fn close(&mut self, tag: &str) {
        self.depth -= 1;
        self.line(&format!("</{}>", tag));
    }

    fn leaf(&mut self, tag: &str, text: &str) {
        self.line(&format!("<{tag}>{text}</{tag}>"));
    }

    fn empty(&mut self, tag: &str) {
        self.line(&format!("<{}/>", tag));
    }

    fn finish(self) -> String {
        self.out
    }
}
