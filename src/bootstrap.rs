//! Request bootstrapping.
//!
//! Turns a method, URI, optional body and the bridge environment into
//! interpreter request state, runs one script and recovers its output.

use std::path::Path;

use thiserror::Error;

#[cfg(feature = "tracing")]
use tracing::{debug, error, info, trace};

use crate::adapters::{ManagementCommand, Method, RequestError};
use crate::config::{BridgeConfig, ReusePolicy, CONSOLE_INI_ENTRIES, WEB_INI_ENTRIES};
use crate::engine::{Engine, EngineError, ServerVars, StartupOptions, SERVER_ADDR};
use crate::env::Environment;
use crate::execution::response;
use crate::execution::{
    select_content_type, CookieJar, ExecutionHooks, ExecutionResult, NoOpHooks,
    OutputAction, OutputAggregator, OutputError, RequestBody, RequestContext,
};

/// Body of the synthetic 500 returned when the interpreter cannot start.
pub const INIT_FAILED_MESSAGE: &str = "PHP init failed.";

const DEFAULT_SESSION_SAVE_PATH: &str = "/tmp";

const PATCH_STDIO: &str = "\
if (!defined('STDOUT')) { define('STDOUT', fopen('php://output', 'w')); }\n\
if (!defined('STDERR')) { define('STDERR', fopen('php://output', 'w')); }";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExecutionError {
    #[error("PHP engine failed to start: {0}")]
    EngineStartup(#[source] EngineError),

    #[error("Request startup failed")]
    StartupFailed,

    #[error("Output stream unavailable: {0}")]
    OutputStream(#[source] EngineError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Request(#[from] RequestError),
}

impl ExecutionError {
    /// The raw HTTP-like message handed back to the host instead of
    /// script output.
    pub fn to_response(&self) -> String {
        match self {
            Self::Request(e) => response::bad_request(&e.to_string()),
            Self::EngineStartup(_) | Self::StartupFailed | Self::OutputStream(_) => {
                response::internal_error(INIT_FAILED_MESSAGE)
            }
            Self::Output(_) => response::internal_error("Output buffer unavailable."),
        }
    }
}

/// Drives one request through the engine.
///
/// Borrowed pieces come from the bridge state; nothing here outlives a
/// request.
pub struct Bootstrapper<'a, E: Engine> {
    engine: &'a mut E,
    output: &'a mut OutputAggregator,
    env: &'a Environment,
    config: &'a BridgeConfig,
}

impl<'a, E: Engine> Bootstrapper<'a, E> {
    pub fn new(
        engine: &'a mut E,
        output: &'a mut OutputAggregator,
        env: &'a Environment,
        config: &'a BridgeConfig,
    ) -> Self {
        Self {
            engine,
            output,
            env,
            config,
        }
    }

    /// Builds the request context from the call and the environment.
    ///
    /// Cookies come from `HTTP_COOKIE`, the body content type from
    /// `CONTENT_TYPE`. Methods other than POST, PUT and PATCH drop any
    /// supplied body.
    pub fn build_context(
        &self,
        method: Method,
        uri: &str,
        body: Option<&[u8]>,
        script_path: &Path,
    ) -> RequestContext {
        let mut ctx = RequestContext::new(method, uri, script_path);

        if let Some(header) = self.env.get("HTTP_COOKIE") {
            ctx.cookies = CookieJar::parse(header);
        }

        match body {
            Some(bytes) if method.allows_body() => {
                ctx.body = Some(RequestBody {
                    bytes: bytes.to_vec(),
                    content_type: select_content_type(self.env.get("CONTENT_TYPE")),
                });
            }
            Some(_bytes) => {
                #[cfg(feature = "tracing")]
                debug!(method = %method, len = _bytes.len(), "Ignoring body for method");
            }
            None => {}
        }

        ctx
    }

    /// Environment exported to the interpreter for `ctx`.
    pub fn request_env(&self, ctx: &RequestContext) -> Environment {
        let mut env = self.env.clone();

        env.put("REQUEST_URI", ctx.uri.as_str());
        env.put("REQUEST_METHOD", ctx.method.as_str());
        env.put("SCRIPT_FILENAME", ctx.script_path.to_string_lossy());
        env.put("PHP_SELF", self.config.script_name.as_str());
        env.put("HTTP_HOST", SERVER_ADDR);
        env.put("APP_URL", self.config.app_url.as_str());
        env.put("ASSET_URL", self.config.asset_url());
        env.put("NATIVEPHP_RUNNING", "true");

        if ctx.query_string.is_empty() {
            env.unset("QUERY_STRING");
        } else {
            env.put("QUERY_STRING", ctx.query_string.as_str());
        }

        env
    }

    /// INI entries for web requests, including `session.save_path`.
    pub fn web_ini(&self) -> String {
        let save_path = self
            .env
            .get("SESSION_SAVE_PATH")
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_SESSION_SAVE_PATH);

        format!("{}session.save_path={}\n", WEB_INI_ENTRIES, save_path)
    }

    pub fn run(&mut self, ctx: &RequestContext) -> Result<ExecutionResult, ExecutionError> {
        self.run_with_hooks(ctx, NoOpHooks)
    }

    pub fn run_with_hooks<H: ExecutionHooks>(
        &mut self,
        ctx: &RequestContext,
        mut hooks: H,
    ) -> Result<ExecutionResult, ExecutionError> {
        #[cfg(feature = "tracing")]
        debug!(method = %ctx.method, uri = %ctx.uri, script = %ctx.script_path.display(), "Running request");

        self.output.reset()?;

        let env = self.request_env(ctx);
        self.engine.export_env(&env);

        if !self.engine.is_running() {
            let options = StartupOptions::web(self.web_ini());
            self.engine
                .module_startup(&options)
                .map_err(|e| {
                    #[cfg(feature = "tracing")]
                    error!(error = %e, "PHP module startup failed");
                    ExecutionError::EngineStartup(e)
                })?;
        }

        hooks.on_request_starting();

        if let Err(_e) = self.engine.request_startup() {
            #[cfg(feature = "tracing")]
            error!(error = %_e, "PHP request startup failed");
            self.abort_request();
            return Err(ExecutionError::StartupFailed);
        }

        self.engine
            .register_server_vars(&ServerVars::synthetic(ctx, &self.config.script_name));

        if !ctx.cookies.is_empty() {
            #[cfg(feature = "tracing")]
            trace!(count = ctx.cookies.len(), "Registering cookies");
            self.engine.register_cookies(&ctx.cookies);
        }

        if let Err(e) = self.engine.open_stdout() {
            #[cfg(feature = "tracing")]
            error!(error = %e, "Failed to open STDOUT stream");
            self.abort_request();
            return Err(ExecutionError::OutputStream(e));
        }

        if let Some(body) = &ctx.body {
            self.engine.set_request_body(body);
        }

        self.engine
            .finish_request_startup(ctx.method.as_str(), &ctx.uri, &ctx.query_string);

        hooks.on_request_started();
        hooks.on_script_executing(&ctx.script_path);

        let output = &mut *self.output;
        let executed = self.engine.execute_script(&ctx.script_path, &mut |chunk: &[u8]| {
            if hooks.on_output(chunk) == OutputAction::Buffer {
                let _ = output.append(chunk);
            }
        });

        hooks.on_script_executed(executed);

        let stdout = self.engine.drain_stdout();
        if !stdout.is_empty() && hooks.on_output(&stdout) == OutputAction::Buffer {
            let _ = self.output.append(&stdout);
        }

        self.engine.request_shutdown();
        self.release_module();

        let result = self.result(executed);

        #[cfg(feature = "tracing")]
        debug!(
            body_len = result.body.len(),
            truncated = result.truncated,
            "{}",
            if executed { "Execution succeeded" } else { "Execution failed" }
        );

        hooks.on_request_finished(&result);

        Ok(result)
    }

    /// Runs `artisan.php` in console mode with `["php", args...]`.
    ///
    /// The module is always restarted for commands and shut down afterwards.
    pub fn run_command(
        &mut self,
        command: &ManagementCommand,
    ) -> Result<ExecutionResult, ExecutionError> {
        #[cfg(feature = "tracing")]
        info!(args = ?command.args(), "Running management command");

        self.output.reset()?;

        let mut env = self.env.clone();
        env.put("APP_RUNNING_IN_CONSOLE", "true");
        env.put("PHP_SELF", "artisan.php");
        env.put("APP_ENV", "local");
        env.put("APP_DEBUG", "true");
        for (k, v) in command.env_vars() {
            env.put(k.as_str(), v.as_str());
        }
        self.engine.export_env(&env);

        if self.engine.is_running() {
            self.engine.module_shutdown();
        }

        let root = command
            .working_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.app_root());

        let options = StartupOptions::console(CONSOLE_INI_ENTRIES, command.argv(), root);
        self.engine
            .module_startup(&options)
            .map_err(ExecutionError::EngineStartup)?;

        if self.engine.request_startup().is_err() {
            self.engine.request_shutdown();
            self.engine.module_shutdown();
            return Err(ExecutionError::StartupFailed);
        }

        if !self.engine.eval(PATCH_STDIO, "patch_stdio") {
            #[cfg(feature = "tracing")]
            error!("Failed to redirect STDOUT/STDERR");
        }

        let script = self.config.console_script_path();
        let output = &mut *self.output;
        let executed = self.engine.execute_script(&script, &mut |chunk: &[u8]| {
            let _ = output.append(chunk);
        });

        self.engine.request_shutdown();
        self.engine.module_shutdown();

        Ok(self.result(executed))
    }

    /// Request shutdown after a failed startup, so the next attempt starts
    /// clean.
    fn abort_request(&mut self) {
        self.engine.request_shutdown();
        self.release_module();
    }

    fn release_module(&mut self) {
        if self.config.reuse == ReusePolicy::PerCall {
            self.engine.module_shutdown();
        }
    }

    fn result(&self, executed: bool) -> ExecutionResult {
        ExecutionResult::new(
            self.output.as_bytes().to_vec(),
            self.output.truncated(),
            executed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{FORM_CONTENT_TYPE, JSON_CONTENT_TYPE};
    use std::path::PathBuf;

    struct NullEngine;

    impl Engine for NullEngine {
        fn module_startup(&mut self, _: &StartupOptions) -> Result<(), EngineError> {
            Ok(())
        }
        fn module_shutdown(&mut self) {}
        fn is_running(&self) -> bool {
            false
        }
        fn export_env(&mut self, _: &Environment) {}
        fn request_startup(&mut self) -> Result<(), EngineError> {
            Ok(())
        }
        fn register_server_vars(&mut self, _: &ServerVars) {}
        fn register_cookies(&mut self, _: &CookieJar) {}
        fn open_stdout(&mut self) -> Result<(), EngineError> {
            Ok(())
        }
        fn set_request_body(&mut self, _: &RequestBody) {}
        fn finish_request_startup(&mut self, _: &str, _: &str, _: &str) {}
        fn eval(&mut self, _: &str, _: &str) -> bool {
            true
        }
        fn execute_script(&mut self, _: &Path, output: &mut dyn FnMut(&[u8])) -> bool {
            output(b"ok");
            true
        }
        fn drain_stdout(&mut self) -> Vec<u8> {
            Vec::new()
        }
        fn request_shutdown(&mut self) {}
    }

    fn with_bootstrapper<T>(
        env: Environment,
        f: impl FnOnce(&mut Bootstrapper<'_, NullEngine>) -> T,
    ) -> T {
        let config = BridgeConfig::new("/storage");
        let mut engine = NullEngine;
        let mut output = OutputAggregator::new(config.buffer);
        let mut boot = Bootstrapper::new(&mut engine, &mut output, &env, &config);
        f(&mut boot)
    }

    #[test]
    fn test_context_takes_cookies_from_env() {
        let env: Environment = [("HTTP_COOKIE", "a=1; b=2; bad; c= 3")].into_iter().collect();

        with_bootstrapper(env, |boot| {
            let ctx = boot.build_context(Method::Get, "/", None, Path::new("/s.php"));
            assert_eq!(ctx.cookies.get("a"), Some("1"));
            assert_eq!(ctx.cookies.get("b"), Some("2"));
            assert_eq!(ctx.cookies.get("c"), Some(" 3"));
            assert_eq!(ctx.cookies.len(), 3);
        });
    }

    #[test]
    fn test_body_kept_only_for_body_methods() {
        with_bootstrapper(Environment::new(), |boot| {
            let script = Path::new("/s.php");

            let post = boot.build_context(Method::Post, "/", Some(b"a=1"), script);
            assert_eq!(post.content_type(), Some(FORM_CONTENT_TYPE));
            assert_eq!(post.content_length(), 3);

            let get = boot.build_context(Method::Get, "/", Some(b"a=1"), script);
            assert!(get.body.is_none());

            let delete = boot.build_context(Method::Delete, "/", Some(b"a=1"), script);
            assert!(delete.body.is_none());
        });
    }

    #[test]
    fn test_json_content_type_from_env() {
        let env: Environment = [("CONTENT_TYPE", "application/json; charset=utf-8")]
            .into_iter()
            .collect();

        with_bootstrapper(env, |boot| {
            let ctx = boot.build_context(Method::Put, "/", Some(b"{}"), Path::new("/s.php"));
            assert_eq!(ctx.content_type(), Some(JSON_CONTENT_TYPE));
        });
    }

    #[test]
    fn test_request_env() {
        let env: Environment = [("QUERY_STRING", "stale=1"), ("KEEP", "me")]
            .into_iter()
            .collect();

        with_bootstrapper(env, |boot| {
            let ctx = boot.build_context(Method::Get, "/home", None, Path::new("/app/native.php"));
            let env = boot.request_env(&ctx);

            assert_eq!(env.get("REQUEST_URI"), Some("/home"));
            assert_eq!(env.get("REQUEST_METHOD"), Some("GET"));
            assert_eq!(env.get("SCRIPT_FILENAME"), Some("/app/native.php"));
            assert_eq!(env.get("PHP_SELF"), Some("/native.php"));
            assert_eq!(env.get("HTTP_HOST"), Some("127.0.0.1"));
            assert_eq!(env.get("APP_URL"), Some("http://127.0.0.1"));
            assert_eq!(env.get("ASSET_URL"), Some("http://127.0.0.1/_assets/"));
            assert_eq!(env.get("NATIVEPHP_RUNNING"), Some("true"));
            assert_eq!(env.get("QUERY_STRING"), None);
            assert_eq!(env.get("KEEP"), Some("me"));

            let ctx = boot.build_context(Method::Get, "/x?a=1", None, Path::new("/s.php"));
            assert_eq!(boot.request_env(&ctx).get("QUERY_STRING"), Some("a=1"));
        });
    }

    #[test]
    fn test_web_ini_session_path() {
        with_bootstrapper(Environment::new(), |boot| {
            assert!(boot.web_ini().ends_with("session.save_path=/tmp\n"));
        });

        let env: Environment = [("SESSION_SAVE_PATH", "/data/sessions")].into_iter().collect();
        with_bootstrapper(env, |boot| {
            assert!(boot.web_ini().contains("session.save_path=/data/sessions\n"));
            assert!(boot.web_ini().starts_with(WEB_INI_ENTRIES));
        });
    }

    #[test]
    fn test_run_collects_output() {
        with_bootstrapper(Environment::new(), |boot| {
            let ctx = boot.build_context(Method::Get, "/", None, &PathBuf::from("/s.php"));
            let result = boot.run(&ctx).unwrap();
            assert_eq!(result.body, b"ok");
            assert!(result.script_executed);
            assert!(!result.truncated);
        });
    }

    #[test]
    fn test_error_responses() {
        let init = ExecutionError::StartupFailed.to_response();
        assert_eq!(
            init,
            "HTTP/1.1 500 Internal Server Error\r\nContent-Type: text/plain\r\n\r\nPHP init failed."
        );

        let bad = ExecutionError::from(RequestError::InvalidMethod("BREW".into())).to_response();
        assert!(bad.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(bad.ends_with("Invalid HTTP method: BREW"));
    }
}
