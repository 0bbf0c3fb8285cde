//! The embedded interpreter, seen from the bridge.
//!
//! [`Engine`] is the only surface the bootstrapper touches. The `embed`
//! feature provides [`EmbedEngine`], bound to a statically linked
//! `libphp.a`; tests drive the bootstrapper with recording fakes.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::env::Environment;
use crate::execution::{CookieJar, RequestBody};

mod server_vars;

#[cfg(feature = "embed")]
mod embed;

pub use server_vars::{ServerVars, SERVER_ADDR, SERVER_PORT, SERVER_PROTOCOL, USER_AGENT};

#[cfg(feature = "embed")]
pub use embed::EmbedEngine;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineError {
    #[error("PHP module startup failed: {0}")]
    ModuleStartupFailed(String),

    #[error("PHP request startup failed")]
    RequestStartupFailed,

    #[error("PHP engine is not running")]
    NotRunning,

    #[error("Failed to create output stream: {0}")]
    StreamUnavailable(String),

    #[error("Invalid engine input: {0}")]
    InvalidInput(String),
}

/// How the module is brought up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupOptions {
    /// Newline separated `key=value` INI entries.
    pub ini_entries: String,
    /// `argv` for console runs, empty for web requests.
    pub argv: Vec<String>,
    /// Directory to switch to before the module starts.
    pub working_dir: Option<PathBuf>,
}

impl StartupOptions {
    pub fn web(ini_entries: impl Into<String>) -> Self {
        Self {
            ini_entries: ini_entries.into(),
            ..Default::default()
        }
    }

    pub fn console(
        ini_entries: impl Into<String>,
        argv: Vec<String>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ini_entries: ini_entries.into(),
            argv,
            working_dir: Some(working_dir.into()),
        }
    }

    pub fn is_console(&self) -> bool {
        !self.argv.is_empty()
    }
}

/// Operations the bootstrapper needs from the embedded interpreter.
///
/// Calls arrive in request order: `export_env`, `module_startup` (unless
/// warm), `request_startup`, registration calls, `execute_script`,
/// `drain_stdout`, `request_shutdown`, `module_shutdown` (unless warm).
/// Implementations are never called concurrently.
pub trait Engine {
    fn module_startup(&mut self, options: &StartupOptions) -> Result<(), EngineError>;

    fn module_shutdown(&mut self);

    fn is_running(&self) -> bool;

    /// Environment visible to `getenv()` for the following request.
    fn export_env(&mut self, env: &Environment);

    fn request_startup(&mut self) -> Result<(), EngineError>;

    /// Fills `$_SERVER`.
    fn register_server_vars(&mut self, vars: &ServerVars);

    /// Fills `$_COOKIE`.
    fn register_cookies(&mut self, cookies: &CookieJar);

    /// Installs a fresh in-memory `STDOUT` stream and activates output
    /// buffering.
    fn open_stdout(&mut self) -> Result<(), EngineError>;

    /// Exposes the raw body as `php://input` with its length and type.
    fn set_request_body(&mut self, body: &RequestBody);

    /// Stores method and URI on the request and leaves the startup phase.
    fn finish_request_startup(&mut self, method: &str, uri: &str, query_string: &str);

    /// Evaluates a PHP snippet. Returns false if it failed.
    fn eval(&mut self, code: &str, name: &str) -> bool;

    /// Runs a script; every unbuffered write is passed to `output`.
    /// Returns false if the interpreter reported failure.
    fn execute_script(&mut self, path: &Path, output: &mut dyn FnMut(&[u8])) -> bool;

    /// Flushes and reads back everything written to the `STDOUT` stream,
    /// then releases it.
    fn drain_stdout(&mut self) -> Vec<u8>;

    fn request_shutdown(&mut self);
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn module_startup(&mut self, options: &StartupOptions) -> Result<(), EngineError> {
        (**self).module_startup(options)
    }

    fn module_shutdown(&mut self) {
        (**self).module_shutdown()
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }

    fn export_env(&mut self, env: &Environment) {
        (**self).export_env(env)
    }

    fn request_startup(&mut self) -> Result<(), EngineError> {
        (**self).request_startup()
    }

    fn register_server_vars(&mut self, vars: &ServerVars) {
        (**self).register_server_vars(vars)
    }

    fn register_cookies(&mut self, cookies: &CookieJar) {
        (**self).register_cookies(cookies)
    }

    fn open_stdout(&mut self) -> Result<(), EngineError> {
        (**self).open_stdout()
    }

    fn set_request_body(&mut self, body: &RequestBody) {
        (**self).set_request_body(body)
    }

    fn finish_request_startup(&mut self, method: &str, uri: &str, query_string: &str) {
        (**self).finish_request_startup(method, uri, query_string)
    }

    fn eval(&mut self, code: &str, name: &str) -> bool {
        (**self).eval(code, name)
    }

    fn execute_script(&mut self, path: &Path, output: &mut dyn FnMut(&[u8])) -> bool {
        (**self).execute_script(path, output)
    }

    fn drain_stdout(&mut self) -> Vec<u8> {
        (**self).drain_stdout()
    }

    fn request_shutdown(&mut self) {
        (**self).request_shutdown()
    }
}

/// Quotes `value` as a single-quoted PHP string literal.
pub(crate) fn php_single_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// PHP code assigning `$_COOKIE` from a parsed jar.
pub(crate) fn cookie_assignment(cookies: &CookieJar) -> String {
    let entries = cookies
        .iter()
        .map(|(k, v)| format!("{} => {}", php_single_quoted(k), php_single_quoted(v)))
        .collect::<Vec<_>>()
        .join(", ");

    format!("$_COOKIE = [{}];", entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_php_single_quoted_escapes() {
        assert_eq!(php_single_quoted("plain"), "'plain'");
        assert_eq!(php_single_quoted("it's"), r"'it\'s'");
        assert_eq!(php_single_quoted(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn test_cookie_assignment() {
        let jar = CookieJar::parse("a=1; b='x'");
        assert_eq!(
            cookie_assignment(&jar),
            r"$_COOKIE = ['a' => '1', 'b' => '\'x\''];"
        );
        assert_eq!(cookie_assignment(&CookieJar::new()), "$_COOKIE = [];");
    }

    #[test]
    fn test_startup_options() {
        let web = StartupOptions::web("display_errors=1\n");
        assert!(!web.is_console());

        let console = StartupOptions::console(
            "output_buffering=0\n",
            vec!["php".into(), "migrate".into()],
            "/app",
        );
        assert!(console.is_console());
        assert_eq!(console.working_dir, Some(PathBuf::from("/app")));
    }
}
