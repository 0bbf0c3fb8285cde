use std::ffi::CString;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::execution::RequestContext;

pub const SERVER_ADDR: &str = "127.0.0.1";
pub const SERVER_PROTOCOL: &str = "HTTP/1.1";
pub const SERVER_PORT: u16 = 80;
pub const USER_AGENT: &str = "PHPNative/1.0";

/// Variables registered into `$_SERVER`.
///
/// The app runs behind no real web server, so [`ServerVars::synthetic`]
/// fills in a loopback host on port 80 over plain HTTP. Later values for
/// the same key win when PHP registers them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerVars {
    vars: Vec<(String, String)>,
}

impl ServerVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            vars: Vec::with_capacity(cap),
        }
    }

    /// The fixed server environment for one request.
    pub fn synthetic(ctx: &RequestContext, script_name: &str) -> Self {
        let mut vars = Self::with_capacity(18);

        vars.request_method(ctx.method.as_str())
            .request_uri(&ctx.uri)
            .query_string(&ctx.query_string)
            .script_name(script_name)
            .script_filename(&ctx.script_path)
            .server_protocol(SERVER_PROTOCOL)
            .server_name(SERVER_ADDR)
            .server_port(SERVER_PORT)
            .remote_addr(SERVER_ADDR)
            .set("HTTP_HOST", SERVER_ADDR)
            .https(false)
            .set("HTTP_USER_AGENT", USER_AGENT)
            .request_time();

        vars
    }

    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.vars.push((key.into(), value.into()));
        self
    }

    pub fn extend<I, K, V>(&mut self, iter: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in iter {
            self.set(k, v);
        }
        self
    }

    /// Last value registered for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.vars.iter()
    }

    pub fn request_method(&mut self, method: &str) -> &mut Self {
        self.set("REQUEST_METHOD", method)
    }

    pub fn request_uri(&mut self, uri: &str) -> &mut Self {
        self.set("REQUEST_URI", uri)
    }

    pub fn query_string(&mut self, qs: &str) -> &mut Self {
        self.set("QUERY_STRING", qs)
    }

    pub fn request_time(&mut self) -> &mut Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        self.set("REQUEST_TIME", now.as_secs().to_string())
            .set("REQUEST_TIME_FLOAT", now.as_secs_f64().to_string())
    }

    pub fn script_filename(&mut self, path: &Path) -> &mut Self {
        self.set("SCRIPT_FILENAME", path.to_string_lossy())
    }

    pub fn script_name(&mut self, name: &str) -> &mut Self {
        self.set("SCRIPT_NAME", name)
            .set("PHP_SELF", name)
    }

    pub fn server_name(&mut self, name: &str) -> &mut Self {
        self.set("SERVER_NAME", name)
    }

    pub fn server_port(&mut self, port: u16) -> &mut Self {
        self.set("SERVER_PORT", port.to_string())
    }

    pub fn server_protocol(&mut self, proto: &str) -> &mut Self {
        self.set("SERVER_PROTOCOL", proto)
    }

    pub fn remote_addr(&mut self, addr: &str) -> &mut Self {
        self.set("REMOTE_ADDR", addr)
    }

    pub fn https(&mut self, enabled: bool) -> &mut Self {
        if enabled {
            self.set("HTTPS", "on")
                .set("REQUEST_SCHEME", "https")
        } else {
            self.set("HTTPS", "off")
                .set("REQUEST_SCHEME", "http")
        }
    }

    /// Pairs ready for the C side. Entries containing interior NULs are
    /// skipped.
    pub fn to_cstring_pairs(&self) -> Vec<(CString, CString)> {
        self.vars
            .iter()
            .filter_map(|(k, v)| {
                Some((CString::new(k.as_str()).ok()?, CString::new(v.as_str()).ok()?))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::Method;

    #[test]
    fn test_server_vars_builder_basic() {
        let mut vars = ServerVars::new();

        vars.request_method("POST")
            .request_uri("/test")
            .query_string("foo=bar");

        assert_eq!(vars.len(), 3);
        assert_eq!(vars.get("REQUEST_METHOD"), Some("POST"));
        assert_eq!(vars.get("QUERY_STRING"), Some("foo=bar"));
    }

    #[test]
    fn test_synthetic_environment() {
        let ctx = RequestContext::new(Method::Get, "/x?a=1", "/app/public/index.php");
        let vars = ServerVars::synthetic(&ctx, "/native.php");

        assert_eq!(vars.get("REQUEST_METHOD"), Some("GET"));
        assert_eq!(vars.get("REQUEST_URI"), Some("/x?a=1"));
        assert_eq!(vars.get("QUERY_STRING"), Some("a=1"));
        assert_eq!(vars.get("SCRIPT_NAME"), Some("/native.php"));
        assert_eq!(vars.get("PHP_SELF"), Some("/native.php"));
        assert_eq!(vars.get("SCRIPT_FILENAME"), Some("/app/public/index.php"));
        assert_eq!(vars.get("SERVER_PROTOCOL"), Some("HTTP/1.1"));
        assert_eq!(vars.get("SERVER_NAME"), Some("127.0.0.1"));
        assert_eq!(vars.get("SERVER_PORT"), Some("80"));
        assert_eq!(vars.get("REMOTE_ADDR"), Some("127.0.0.1"));
        assert_eq!(vars.get("HTTP_HOST"), Some("127.0.0.1"));
        assert_eq!(vars.get("REQUEST_SCHEME"), Some("http"));
        assert_eq!(vars.get("HTTPS"), Some("off"));
        assert_eq!(vars.get("HTTP_USER_AGENT"), Some("PHPNative/1.0"));
        assert!(vars.get("REQUEST_TIME").is_some());
        assert!(vars.get("REQUEST_TIME_FLOAT").is_some());
    }

    #[test]
    fn test_get_returns_last_value() {
        let mut vars = ServerVars::new();
        vars.set("A", "1").set("A", "2");
        assert_eq!(vars.get("A"), Some("2"));
        assert_eq!(vars.get("B"), None);
    }

    #[test]
    fn test_cstring_pairs_skip_interior_nul() {
        let mut vars = ServerVars::new();
        vars.set("GOOD", "yes").set("BAD", "a\0b");

        let pairs = vars.to_cstring_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.to_str().unwrap(), "GOOD");
    }

    #[test]
    fn test_https_sets_scheme() {
        let mut vars = ServerVars::new();
        vars.https(true);
        assert_eq!(vars.get("HTTPS"), Some("on"));
        assert_eq!(vars.get("REQUEST_SCHEME"), Some("https"));
    }
}
