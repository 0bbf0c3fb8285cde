#![allow(dead_code)]

use std::path::{Path, PathBuf};

use mobile_php_bridge::engine::ServerVars;
use mobile_php_bridge::execution::{CookieJar, RequestBody};
use mobile_php_bridge::{Engine, EngineError, Environment, StartupOptions};

/// What the engine was handed for one request.
#[derive(Debug, Clone, Default)]
pub struct Seen {
    pub env: Environment,
    pub server_vars: ServerVars,
    pub cookies: Option<CookieJar>,
    pub body: Option<RequestBody>,
    pub method: String,
    pub uri: String,
    pub query_string: String,
    pub script: Option<PathBuf>,
    pub evals: Vec<String>,
}

pub type Script = Box<dyn FnMut(&Seen) -> Vec<Vec<u8>> + Send>;

/// An engine that records every call and "runs" scripts with a closure.
pub struct RecordingEngine {
    pub running: bool,
    pub calls: Vec<&'static str>,
    pub startups: Vec<StartupOptions>,
    pub module_shutdowns: usize,
    pub fail_module_startup: bool,
    pub fail_request_startup: bool,
    pub fail_stdout: bool,
    pub stdout: Vec<u8>,
    pub seen: Seen,
    pub last: Seen,
    script: Script,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::with_script(|_| vec![b"ok".to_vec()])
    }

    pub fn with_script(script: impl FnMut(&Seen) -> Vec<Vec<u8>> + Send + 'static) -> Self {
        Self {
            running: false,
            calls: Vec::new(),
            startups: Vec::new(),
            module_shutdowns: 0,
            fail_module_startup: false,
            fail_request_startup: false,
            fail_stdout: false,
            stdout: Vec::new(),
            seen: Seen::default(),
            last: Seen::default(),
            script: Box::new(script),
        }
    }

    /// Echoes method, URI and body back as the script output.
    pub fn echo() -> Self {
        Self::with_script(|seen| {
            let mut out = format!("{} {}", seen.method, seen.uri).into_bytes();
            if let Some(body) = &seen.body {
                out.push(b' ');
                out.extend_from_slice(&body.bytes);
            }
            vec![out]
        })
    }

    pub fn module_startups(&self) -> usize {
        self.startups.len()
    }
}

impl Engine for RecordingEngine {
    fn module_startup(&mut self, options: &StartupOptions) -> Result<(), EngineError> {
        self.calls.push("module_startup");
        if self.fail_module_startup {
            return Err(EngineError::ModuleStartupFailed("php_module_startup".into()));
        }
        self.startups.push(options.clone());
        self.running = true;
        Ok(())
    }

    fn module_shutdown(&mut self) {
        self.calls.push("module_shutdown");
        self.module_shutdowns += 1;
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn export_env(&mut self, env: &Environment) {
        self.calls.push("export_env");
        self.seen.env = env.clone();
    }

    fn request_startup(&mut self) -> Result<(), EngineError> {
        self.calls.push("request_startup");
        if self.fail_request_startup {
            return Err(EngineError::RequestStartupFailed);
        }
        Ok(())
    }

    fn register_server_vars(&mut self, vars: &ServerVars) {
        self.calls.push("register_server_vars");
        self.seen.server_vars = vars.clone();
    }

    fn register_cookies(&mut self, cookies: &CookieJar) {
        self.calls.push("register_cookies");
        self.seen.cookies = Some(cookies.clone());
    }

    fn open_stdout(&mut self) -> Result<(), EngineError> {
        self.calls.push("open_stdout");
        if self.fail_stdout {
            return Err(EngineError::StreamUnavailable("php://memory".into()));
        }
        Ok(())
    }

    fn set_request_body(&mut self, body: &RequestBody) {
        self.calls.push("set_request_body");
        self.seen.body = Some(body.clone());
    }

    fn finish_request_startup(&mut self, method: &str, uri: &str, query_string: &str) {
        self.calls.push("finish_request_startup");
        self.seen.method = method.to_string();
        self.seen.uri = uri.to_string();
        self.seen.query_string = query_string.to_string();
    }

    fn eval(&mut self, code: &str, _name: &str) -> bool {
        self.calls.push("eval");
        self.seen.evals.push(code.to_string());
        true
    }

    fn execute_script(&mut self, path: &Path, output: &mut dyn FnMut(&[u8])) -> bool {
        self.calls.push("execute_script");
        self.seen.script = Some(path.to_path_buf());

        for chunk in (self.script)(&self.seen) {
            output(&chunk);
        }
        true
    }

    fn drain_stdout(&mut self) -> Vec<u8> {
        self.calls.push("drain_stdout");
        std::mem::take(&mut self.stdout)
    }

    fn request_shutdown(&mut self) {
        self.calls.push("request_shutdown");
        self.last = std::mem::take(&mut self.seen);
    }
}
