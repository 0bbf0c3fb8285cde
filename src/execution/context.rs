use std::fmt;
use std::path::PathBuf;

use super::cookies::CookieJar;
use crate::adapters::Method;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Content type reported to PHP for a request body.
///
/// Only the media type essence of `CONTENT_TYPE` is inspected: `application/json`
/// and `+json` suffixes select JSON, anything else (including a missing value)
/// falls back to form encoding.
pub fn select_content_type(env_value: Option<&str>) -> &'static str {
    let Some(value) = env_value else {
        return FORM_CONTENT_TYPE;
    };

    let essence = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence == JSON_CONTENT_TYPE || essence.ends_with("+json") {
        JSON_CONTENT_TYPE
    } else {
        FORM_CONTENT_TYPE
    }
}

/// Splits `/path?query` into its path and query string. An empty query
/// after `?` counts as none.
pub fn split_uri(uri: &str) -> (&str, &str) {
    match memchr::memchr(b'?', uri.as_bytes()) {
        Some(pos) => (&uri[..pos], &uri[pos + 1..]),
        None => (uri, ""),
    }
}

/// Raw body plus the content type PHP will see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBody {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

impl RequestBody {
    pub fn content_length(&self) -> usize {
        self.bytes.len()
    }
}

/// Per-request state built by the bootstrapper. Not persisted between
/// requests.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub uri: String,
    pub query_string: String,
    pub script_path: PathBuf,
    pub body: Option<RequestBody>,
    pub cookies: CookieJar,
}

impl RequestContext {
    pub fn new(
        method: Method,
        uri: impl Into<String>,
        script_path: impl Into<PathBuf>,
    ) -> Self {
        let uri = uri.into();
        let query_string = split_uri(&uri).1.to_string();

        Self {
            method,
            uri,
            query_string,
            script_path: script_path.into(),
            body: None,
            cookies: CookieJar::new(),
        }
    }

    pub fn path(&self) -> &str {
        split_uri(&self.uri).0
    }

    pub fn content_type(&self) -> Option<&'static str> {
        self.body.as_ref().map(|b| b.content_type)
    }

    pub fn content_length(&self) -> usize {
        self.body
            .as_ref()
            .map(RequestBody::content_length)
            .unwrap_or(0)
    }
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RequestContext {{")?;
        writeln!(f, "  {} {}", self.method, self.uri)?;
        writeln!(f, "  script: {}", self.script_path.display())?;

        if self.cookies.is_empty() {
            writeln!(f, "  cookies: []")?;
        } else {
            let names: Vec<_> = self.cookies.iter().map(|(k, _)| k).collect();
            writeln!(f, "  cookies: [{}]", names.join(", "))?;
        }

        match &self.body {
            Some(body) => writeln!(
                f,
                "  body: {} bytes ({})",
                body.content_length(),
                body.content_type
            )?,
            None => writeln!(f, "  body: none")?,
        }
        write!(f, "}}")
    }
}
