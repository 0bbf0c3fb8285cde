//! Shaping raw interpreter output into an HTTP-like message for the host's
//! web view.
//!
//! The front controller may or may not emit its own status line and
//! headers. [`normalize`] makes sure the host always receives
//! `HTTP/1.1 <status>\r\n<headers>\r\n\r\n<body>`.

use super::header::ResponseHeader;

const CSRF_MISMATCH: &str = "CSRF token mismatch";

/// Synthetic response returned when the interpreter could not be brought up.
pub fn internal_error(message: &str) -> String {
    format!(
        "HTTP/1.1 500 Internal Server Error\r\nContent-Type: text/plain\r\n\r\n{}",
        message
    )
}

/// Synthetic response for a request the bridge refused before execution.
pub fn bad_request(message: &str) -> String {
    format!(
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/plain\r\n\r\n{}",
        message
    )
}

pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        match json_csrf_mismatch(trimmed) {
            Some(true) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("CSRF token mismatch in response, answering 419");
                return format!(
                    "HTTP/1.1 419 Page Expired\r\n\
                     Content-Type: application/json\r\n\
                     X-CSRF-Error: true\r\n\
                     \r\n{}",
                    raw
                );
            }
            Some(false) => {
                return format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n{}",
                    raw
                );
            }
            None => {}
        }
    }

    let lower = raw.to_ascii_lowercase();
    if lower.contains("content-type:") || lower.contains("set-cookie:") {
        if raw.starts_with("HTTP/") {
            return raw.to_string();
        }
        return format!("HTTP/1.1 200 OK\r\n{}", raw);
    }

    format!("HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n{}", raw)
}

/// `None` when `body` is not a JSON object.
#[cfg(feature = "serde")]
fn json_csrf_mismatch(body: &str) -> Option<bool> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;

    Some(
        object
            .get("message")
            .and_then(|m| m.as_str())
            .is_some_and(|m| m.contains(CSRF_MISMATCH)),
    )
}

#[cfg(not(feature = "serde"))]
fn json_csrf_mismatch(body: &str) -> Option<bool> {
    Some(body.contains("\"message\"") && body.contains(CSRF_MISMATCH))
}

/// A parsed, normalized host response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostResponse {
    pub status: u16,
    pub headers: Vec<ResponseHeader>,
    pub body: Vec<u8>,
}

impl HostResponse {
    /// Parses `HTTP/x.y <code> ...` followed by header lines and a blank
    /// line. Input without a status line is treated as a bare `200` body.
    pub fn parse(raw: &[u8]) -> Self {
        let bare = || Self {
            status: 200,
            headers: Vec::new(),
            body: raw.to_vec(),
        };

        if !raw.starts_with(b"HTTP/") {
            return bare();
        }

        let (head, body) = match memchr::memmem::find(raw, b"\r\n\r\n") {
            Some(pos) => (&raw[..pos], &raw[pos + 4..]),
            None => (raw, &[][..]),
        };

        let mut lines = head.split(|&b| b == b'\n');
        let status = lines
            .next()
            .and_then(|line| std::str::from_utf8(line).ok())
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse::<u16>().ok());

        let Some(status) = status else {
            return bare();
        };

        let headers = lines
            .filter_map(ResponseHeader::parse)
            .collect();

        Self {
            status,
            headers,
            body: body.to_vec(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.is(name))
            .map(|h| h.value())
    }

    pub fn headers_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|h| h.is(name))
            .map(|h| h.value())
            .collect()
    }

    /// Values of every non-empty `Set-Cookie` header, in order. This is
    /// what the host hands to its cookie store.
    pub fn set_cookies(&self) -> Vec<&str> {
        self.headers_all("Set-Cookie")
            .into_iter()
            .filter(|v| !v.is_empty())
            .collect()
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(feature = "http")]
impl HostResponse {
    pub fn into_http_response(self) -> http::Response<Vec<u8>> {
        let mut builder = http::Response::builder().status(self.status);

        for h in self.headers.iter().filter(|h| !h.is("Set-Cookie")) {
            builder = builder.header(h.name(), h.value());
        }
        for cookie in self.set_cookies() {
            builder = builder.header(http::header::SET_COOKIE, cookie);
        }

        builder
            .body(self.body)
            .unwrap_or_else(|_| http::Response::new(Vec::new()))
    }
}

#[cfg(feature = "http")]
impl From<HostResponse> for http::Response<Vec<u8>> {
    fn from(res: HostResponse) -> Self {
        res.into_http_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_body_wrapped_as_html() {
        let out = normalize("<h1>Hi</h1>");
        assert_eq!(
            out,
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<h1>Hi</h1>"
        );
    }

    #[test]
    fn test_json_body() {
        let out = normalize(r#"{"ok":true}"#);
        assert!(out.starts_with("HTTP/1.1 200 OK\r\nContent-Type: application/json"));
        assert!(out.ends_with(r#"{"ok":true}"#));
    }

    #[test]
    fn test_csrf_mismatch_becomes_419() {
        let out = normalize(r#"{"message":"CSRF token mismatch."}"#);
        assert!(out.starts_with("HTTP/1.1 419 Page Expired"));
        assert!(out.contains("X-CSRF-Error: true"));
    }

    #[test]
    fn test_headers_without_status_line() {
        let raw = "Content-Type: text/plain\r\n\r\nbody";
        assert_eq!(normalize(raw), format!("HTTP/1.1 200 OK\r\n{}", raw));
    }

    #[test]
    fn test_full_message_untouched() {
        let raw = "HTTP/1.1 302 Found\r\nLocation: /home\r\nSet-Cookie: a=1\r\n\r\n";
        assert_eq!(normalize(raw), raw);
    }

    #[test]
    fn test_set_cookies_skip_empty() {
        let raw = b"HTTP/1.1 200 OK\r\nset-cookie: a=1; Path=/\r\nSet-Cookie:   \r\nSet-Cookie: b=2\r\n\r\nx";
        let parsed = HostResponse::parse(raw);
        assert_eq!(parsed.set_cookies(), vec!["a=1; Path=/", "b=2"]);
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_http_response_carries_set_cookies() {
        let raw = b"HTTP/1.1 302 Found\r\nLocation: /home\r\nSet-Cookie: \r\nSet-Cookie: s=1\r\n\r\n";
        let res: http::Response<Vec<u8>> = HostResponse::parse(raw).into();

        assert_eq!(res.status(), 302);
        assert_eq!(res.headers()["location"], "/home");
        let cookies: Vec<_> = res.headers().get_all("set-cookie").iter().collect();
        assert_eq!(cookies, vec!["s=1"]);
    }

    #[test]
    fn test_internal_error_shape() {
        let out = internal_error("PHP init failed.");
        let parsed = HostResponse::parse(out.as_bytes());
        assert_eq!(parsed.status, 500);
        assert_eq!(parsed.header("content-type"), Some("text/plain"));
        assert_eq!(parsed.body_string(), "PHP init failed.");
    }

    #[test]
    fn test_parse_multiple_set_cookie() {
        let raw = b"HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\n\r\n";
        let parsed = HostResponse::parse(raw);
        assert_eq!(parsed.headers_all("set-cookie"), vec!["a=1", "b=2"]);
        assert!(parsed.body.is_empty());
    }

    #[test]
    fn test_parse_without_status_line() {
        let parsed = HostResponse::parse(b"just text");
        assert_eq!(parsed.status, 200);
        assert!(parsed.headers.is_empty());
        assert_eq!(parsed.body, b"just text");
    }

    #[test]
    fn test_parse_garbage_status() {
        let parsed = HostResponse::parse(b"HTTP/1.1 abc\r\n\r\nx");
        assert_eq!(parsed.status, 200);
        assert_eq!(parsed.body, b"HTTP/1.1 abc\r\n\r\nx");
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_into_http_response() {
        let parsed = HostResponse::parse(
            normalize(r#"{"message":"CSRF token mismatch."}"#).as_bytes(),
        );
        let res: http::Response<Vec<u8>> = parsed.into();

        assert_eq!(res.status(), 419);
        assert_eq!(res.headers()["x-csrf-error"], "true");
    }
}
