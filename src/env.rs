//! Per-bridge environment variables.
//!
//! The host sets variables such as `HTTP_COOKIE`, `CONTENT_TYPE` or
//! `SESSION_SAVE_PATH` before a request. They live here instead of the
//! process environment; the engine exposes them to PHP's `getenv`.

/// Ordered name/value store with `setenv(3)` overwrite semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: Vec<(String, String)>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`. An existing value is only replaced when
    /// `overwrite` is true. Returns false for names `setenv` rejects
    /// (empty or containing `=`).
    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        overwrite: bool,
    ) -> bool {
        let name = name.into();
        if name.is_empty() || name.contains('=') {
            return false;
        }

        let value = value.into();
        match self.vars.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => {
                if overwrite {
                    *existing = value;
                }
            }
            None => self.vars.push((name, value)),
        }

        true
    }

    /// Shorthand for `set(name, value, true)`.
    pub fn put(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.set(name, value, true);
    }

    pub fn unset(&mut self, name: &str) {
        self.vars.retain(|(k, _)| k != name);
    }

    /// Keeps only the variables for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &str) -> bool) {
        self.vars.retain(|(k, v)| keep(k, v));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Environment
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut env = Self::new();
        for (k, v) in iter {
            env.put(k, v);
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_respects_overwrite_flag() {
        let mut env = Environment::new();

        assert!(env.set("APP_ENV", "local", false));
        assert!(env.set("APP_ENV", "production", false));
        assert_eq!(env.get("APP_ENV"), Some("local"));

        assert!(env.set("APP_ENV", "production", true));
        assert_eq!(env.get("APP_ENV"), Some("production"));
        assert_eq!(env.len(), 1);
    }

    #[test]
    fn test_set_rejects_invalid_names() {
        let mut env = Environment::new();
        assert!(!env.set("", "x", true));
        assert!(!env.set("A=B", "x", true));
        assert!(env.is_empty());
    }

    #[test]
    fn test_unset() {
        let mut env: Environment =
            [("QUERY_STRING", "a=1"), ("HTTP_COOKIE", "s=1")]
                .into_iter()
                .collect();

        env.unset("QUERY_STRING");
        assert!(!env.contains("QUERY_STRING"));
        assert!(env.contains("HTTP_COOKIE"));
    }

    #[test]
    fn test_iter_keeps_insertion_order() {
        let mut env = Environment::new();
        env.put("B", "2");
        env.put("A", "1");
        env.put("B", "3");

        let pairs: Vec<_> = env.iter().collect();
        assert_eq!(pairs, vec![("B", "3"), ("A", "1")]);
    }

    #[test]
    fn test_retain_filters_by_name() {
        let mut env: Environment =
            [("HTTP_ACCEPT", "*/*"), ("APP_ENV", "local")].into_iter().collect();
        env.retain(|name, _| !name.starts_with("HTTP_"));

        assert_eq!(env.get("HTTP_ACCEPT"), None);
        assert_eq!(env.get("APP_ENV"), Some("local"));
    }
}
