/// A `Name: Value` header line of a host response.
///
/// Malformed lines are dropped during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeader {
    name: String,
    value: String,
}

impl ResponseHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Parses `Name: Value`. Leading whitespace of the value is skipped,
    /// trailing CR/LF removed.
    pub(crate) fn parse(bytes: &[u8]) -> Option<Self> {
        let colon_pos = memchr::memchr(b':', bytes)?;
        if colon_pos == 0 {
            return None;
        }

        let name = std::str::from_utf8(&bytes[..colon_pos])
            .ok()?
            .trim();
        if name.is_empty() {
            return None;
        }

        let mut value = &bytes[colon_pos + 1..];
        while let [first, rest @ ..] = value {
            if !first.is_ascii_whitespace() {
                break;
            }
            value = rest;
        }
        while let [rest @ .., b'\r' | b'\n'] = value {
            value = rest;
        }

        Some(Self {
            name: name.to_string(),
            value: String::from_utf8_lossy(value).into_owned(),
        })
    }
}
