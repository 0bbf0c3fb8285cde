/// Output of one script run, as recovered from the aggregator.
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub body: Vec<u8>,
    /// Some output was dropped because the buffer hit its ceiling or could
    /// not grow.
    pub truncated: bool,
    /// The interpreter reported the script as executed. PHP-level errors
    /// still count as executed; their text is part of `body`.
    pub script_executed: bool,
}

impl ExecutionResult {
    pub fn new(body: Vec<u8>, truncated: bool, script_executed: bool) -> Self {
        Self {
            body,
            truncated,
            script_executed,
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn body_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
