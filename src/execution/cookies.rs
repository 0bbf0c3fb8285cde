//! `HTTP_COOKIE` parsing.

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

/// Cookie table handed to the interpreter as `$_COOKIE`.
///
/// Keeps first-seen order; a repeated name replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: Vec<(String, String)>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `Cookie` header value.
    ///
    /// Tokens are split on `;` and stripped of leading spaces. Everything
    /// after the first `=` is the value, untrimmed. Tokens without `=` are
    /// skipped.
    pub fn parse(header: &str) -> Self {
        let mut jar = Self::new();

        for token in header.split(';') {
            let token = token.trim_start_matches(' ');
            if token.is_empty() {
                continue;
            }

            match token.split_once('=') {
                Some((name, value)) => {
                    #[cfg(feature = "tracing")]
                    trace!(name, value, "Parsed cookie");
                    jar.insert(name, value);
                }
                None => {
                    #[cfg(feature = "tracing")]
                    debug!(token, "Skipping malformed cookie token");
                }
            }
        }

        jar
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self.cookies.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => *existing = value,
            None => self.cookies.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Re-serializes as `a=1; b=2`.
    pub fn to_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
