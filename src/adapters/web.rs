use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RequestError {
    #[error("HTTP method not specified")]
    MissingMethod,

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid request URI: {0}")]
    InvalidUri(String),
}

/// Rejects URIs that cannot be handed to the interpreter as a C string.
pub fn validate_uri(uri: &str) -> Result<&str, RequestError> {
    if uri.contains('\0') {
        return Err(RequestError::InvalidUri(uri.replace('\0', "%00")));
    }
    Ok(uri)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl TryFrom<&str> for Method {
    type Error = RequestError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "" => Err(RequestError::MissingMethod),
            _ => Err(RequestError::InvalidMethod(value.to_string())),
        }
    }
}

impl TryFrom<String> for Method {
    type Error = RequestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Method::try_from(value.as_str())
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match &self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }

    /// Only these methods hand a supplied body to PHP.
    pub fn allows_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

/// A request as it arrives from the host's web view.
///
/// Headers are exported to PHP as `HTTP_*` environment variables; cookies
/// are merged into a single `HTTP_COOKIE` value.
#[derive(Debug, Clone)]
pub struct HostRequest {
    method: Method,
    uri: String,
    body: Option<Vec<u8>>,
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
}

impl HostRequest {
    #[must_use]
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            body: None,
            headers: Vec::new(),
            cookies: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::Get, uri)
    }

    #[must_use]
    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(Method::Post, uri)
    }

    #[must_use]
    pub fn put(uri: impl Into<String>) -> Self {
        Self::new(Method::Put, uri)
    }

    #[must_use]
    pub fn patch(uri: impl Into<String>) -> Self {
        Self::new(Method::Patch, uri)
    }

    #[must_use]
    pub fn delete(uri: impl Into<String>) -> Self {
        Self::new(Method::Delete, uri)
    }

    #[must_use]
    pub fn with_body(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.body = Some(bytes.into());
        self
    }

    #[must_use]
    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.headers
            .push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_headers<I, K, V>(mut self, iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.extend(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into())),
        );
        self
    }

    #[must_use]
    pub fn with_content_type(self, ct: impl Into<String>) -> Self {
        self.with_header("Content-Type", ct)
    }

    #[must_use]
    pub fn with_cookie(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.cookies
            .push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_raw_cookie_header(
        self,
        cookie_string: impl Into<String>,
    ) -> Self {
        self.with_header("Cookie", cookie_string)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn into_body(self) -> Option<Vec<u8>> {
        self.body
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// All `Cookie` headers and explicit cookies joined with `"; "`.
    pub fn cookie_header(&self) -> Option<String> {
        let parts: Vec<String> = self
            .headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("Cookie"))
            .map(|(_, value)| value.clone())
            .chain(
                self.cookies
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v)),
            )
            .filter(|s| !s.is_empty())
            .collect();

        (!parts.is_empty()).then(|| parts.join("; "))
    }

    /// Headers in their CGI spelling. `Cookie` is left to
    /// [`HostRequest::cookie_header`].
    pub fn env_vars(&self) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = self
            .headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("Cookie"))
            .map(|(name, value)| (header_env_name(name), value.clone()))
            .collect();

        if let Some(cookie) = self.cookie_header() {
            vars.push(("HTTP_COOKIE".to_string(), cookie));
        }

        vars
    }
}

/// `X-Requested-With` becomes `HTTP_X_REQUESTED_WITH`; `Content-Type`
/// and `Content-Length` keep their bare CGI names.
pub fn header_env_name(name: &str) -> String {
    let upper = name
        .trim()
        .to_uppercase()
        .replace('-', "_");

    match upper.as_str() {
        "CONTENT_TYPE" | "CONTENT_LENGTH" => upper,
        _ => format!("HTTP_{}", upper),
    }
}

#[cfg(feature = "http")]
mod http_compat {
    use super::*;

    pub fn from_http_request<B: AsRef<[u8]>>(
        req: http::Request<B>,
    ) -> Result<HostRequest, RequestError> {
        let (parts, body) = req.into_parts();
        from_http_parts(parts, body.as_ref().to_vec())
    }

    pub fn from_http_parts(
        parts: http::request::Parts,
        body: Vec<u8>,
    ) -> Result<HostRequest, RequestError> {
        let method = Method::try_from(parts.method.as_str())?;

        let uri = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let mut request = HostRequest::new(method, uri);

        for (name, value) in parts.headers.iter() {
            if let Ok(value_str) = value.to_str() {
                request = request.with_header(name.as_str(), value_str);
            }
        }

        if !body.is_empty() {
            request = request.with_body(body);
        }

        Ok(request)
    }
}

#[cfg(feature = "http")]
pub use http_compat::{from_http_parts, from_http_request};
