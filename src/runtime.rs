//! The host call boundary.
//!
//! [`Bridge`] is the single context object the host's dispatcher owns. All
//! entry points lock one mutex, so at most one request runs at a time and
//! two sequential calls never see each other's output.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

#[cfg(feature = "tracing")]
use tracing::{debug, info, warn};

use crate::adapters::{validate_uri, HostRequest, ManagementCommand, Method};
use crate::bootstrap::{Bootstrapper, ExecutionError};
use crate::config::{BridgeConfig, ReusePolicy};
use crate::engine::{Engine, EngineError, StartupOptions};
use crate::env::Environment;
use crate::execution::{
    response, ExecutionHooks, ExecutionResult, NoOpHooks, OutputAggregator, OutputError,
};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BridgeError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Variables a [`HostRequest`] derives from its headers.
fn is_header_var(name: &str) -> bool {
    name.starts_with("HTTP_") || name == "CONTENT_TYPE" || name == "CONTENT_LENGTH"
}

/// Request parameters stored by [`Bridge::set_request_info`] for the next
/// [`Bridge::run_pending`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub method: String,
    pub uri: String,
    pub body: Option<Vec<u8>>,
}

impl Default for PendingRequest {
    fn default() -> Self {
        Self {
            method: Method::Get.as_str().to_string(),
            uri: "/".to_string(),
            body: None,
        }
    }
}

struct BridgeState<E> {
    engine: E,
    output: OutputAggregator,
    env: Environment,
    pending: Option<PendingRequest>,
    config: BridgeConfig,
}

impl<E: Engine> BridgeState<E> {
    fn bootstrapper(&mut self) -> Bootstrapper<'_, E> {
        Bootstrapper::new(&mut self.engine, &mut self.output, &self.env, &self.config)
    }

    fn execute<H: ExecutionHooks>(
        &mut self,
        script_path: &Path,
        method: &str,
        uri: &str,
        body: Option<&[u8]>,
        hooks: H,
    ) -> Result<ExecutionResult, ExecutionError> {
        let method = Method::try_from(method)?;
        let uri = validate_uri(uri)?;
        let mut boot = self.bootstrapper();
        let ctx = boot.build_context(method, uri, body, script_path);
        boot.run_with_hooks(&ctx, hooks)
    }

    /// Like [`execute`](Self::execute), but against `env` instead of the
    /// bridge environment, which is left untouched.
    fn execute_in(
        &mut self,
        env: &Environment,
        script_path: &Path,
        method: Method,
        uri: &str,
        body: Option<&[u8]>,
    ) -> Result<ExecutionResult, ExecutionError> {
        let uri = validate_uri(uri)?;
        let mut boot =
            Bootstrapper::new(&mut self.engine, &mut self.output, env, &self.config);
        let ctx = boot.build_context(method, uri, body, script_path);
        boot.run_with_hooks(&ctx, NoOpHooks)
    }
}

/// Owns the engine, the output aggregator and the bridge environment.
pub struct Bridge<E: Engine> {
    state: Mutex<BridgeState<E>>,
}

impl<E: Engine> Bridge<E> {
    pub fn new(engine: E, config: BridgeConfig) -> Self {
        let output = OutputAggregator::new(config.buffer);

        Self {
            state: Mutex::new(BridgeState {
                engine,
                output,
                env: Environment::new(),
                pending: None,
                config,
            }),
        }
    }

    // A panic inside a previous call must not wedge the host.
    fn lock(&self) -> MutexGuard<'_, BridgeState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> BridgeConfig {
        self.lock().config.clone()
    }

    /// Allocates the output buffer. With [`ReusePolicy::Warm`] the
    /// interpreter is started right away instead of on first request.
    pub fn initialize(&self) -> Result<(), BridgeError> {
        let mut state = self.lock();

        #[cfg(feature = "tracing")]
        info!(reuse = ?state.config.reuse, "Initializing bridge");

        state.output.reset()?;

        if state.config.reuse == ReusePolicy::Warm && !state.engine.is_running() {
            let options = StartupOptions::web(state.bootstrapper().web_ini());
            state.engine.module_startup(&options)?;
        }

        Ok(())
    }

    /// Frees the output buffer and stops the interpreter.
    pub fn shutdown(&self) {
        let mut state = self.lock();

        #[cfg(feature = "tracing")]
        info!("Shutting down bridge");

        state.output.release();
        if state.engine.is_running() {
            state.engine.module_shutdown();
        }
    }

    /// `setenv(3)` semantics. Returns false for invalid names.
    pub fn set_env(&self, name: &str, value: &str, overwrite: bool) -> bool {
        let ok = self.lock().env.set(name, value, overwrite);

        #[cfg(feature = "tracing")]
        {
            if !ok {
                warn!(name, "Rejected environment variable name");
            }
        }

        ok
    }

    pub fn unset_env(&self, name: &str) {
        self.lock().env.unset(name);
    }

    pub fn env_var(&self, name: &str) -> Option<String> {
        self.lock().env.get(name).map(str::to_string)
    }

    pub fn set_request_info(&self, method: &str, uri: &str, body: Option<Vec<u8>>) {
        #[cfg(feature = "tracing")]
        debug!(method, uri, body_len = body.as_ref().map(Vec::len), "Request info set");

        self.lock().pending = Some(PendingRequest {
            method: method.to_string(),
            uri: uri.to_string(),
            body,
        });
    }

    pub fn pending_request(&self) -> Option<PendingRequest> {
        self.lock().pending.clone()
    }

    /// Runs one script and returns everything it printed, or a synthetic
    /// error response.
    pub fn run_script_once(
        &self,
        script_path: impl AsRef<Path>,
        method: &str,
        uri: &str,
        body: Option<&[u8]>,
    ) -> String {
        match self.execute(script_path, method, uri, body) {
            Ok(result) => result.body_string(),
            Err(e) => e.to_response(),
        }
    }

    /// [`Bridge::run_script_once`] with the parameters of the last
    /// [`Bridge::set_request_info`], which are consumed.
    pub fn run_pending(&self, script_path: impl AsRef<Path>) -> String {
        let mut state = self.lock();
        let pending = state.pending.take().unwrap_or_default();

        match state.execute(
            script_path.as_ref(),
            &pending.method,
            &pending.uri,
            pending.body.as_deref(),
            NoOpHooks,
        ) {
            Ok(result) => result.body_string(),
            Err(e) => e.to_response(),
        }
    }

    pub fn execute(
        &self,
        script_path: impl AsRef<Path>,
        method: &str,
        uri: &str,
        body: Option<&[u8]>,
    ) -> Result<ExecutionResult, ExecutionError> {
        self.execute_with_hooks(script_path, method, uri, body, NoOpHooks)
    }

    pub fn execute_with_hooks<H: ExecutionHooks>(
        &self,
        script_path: impl AsRef<Path>,
        method: &str,
        uri: &str,
        body: Option<&[u8]>,
        hooks: H,
    ) -> Result<ExecutionResult, ExecutionError> {
        self.lock()
            .execute(script_path.as_ref(), method, uri, body, hooks)
    }

    /// Runs an `artisan` command line and returns its output.
    pub fn run_management_command(&self, command_line: &str) -> String {
        self.run_command(&ManagementCommand::parse(command_line))
    }

    pub fn run_command(&self, command: &ManagementCommand) -> String {
        let mut state = self.lock();
        match state.bootstrapper().run_command(command) {
            Ok(result) => result.body_string(),
            Err(e) => e.to_response(),
        }
    }

    /// `<storage>/<app_dir>`
    pub fn storage_root_path(&self) -> PathBuf {
        self.lock().config.app_root()
    }

    /// `<storage>/<app_dir>/public`. Also marks the app as not running in
    /// the console.
    pub fn public_path(&self) -> PathBuf {
        let mut state = self.lock();
        state.env.put("APP_RUNNING_IN_CONSOLE", "false");
        state.config.public_dir()
    }

    /// Serves a web view request through the front controller and returns
    /// the normalized HTTP-like response.
    ///
    /// Request headers only live for this call. The bridge environment
    /// never sees them.
    pub fn handle_request(&self, request: HostRequest) -> String {
        let mut state = self.lock();

        #[cfg(feature = "tracing")]
        debug!(method = %request.method(), uri = request.uri(), "Handling host request");

        let mut env = state.env.clone();
        env.retain(|name, _| !is_header_var(name));
        for (name, value) in request.env_vars() {
            env.put(name, value);
        }

        let script = state.config.front_script_path();
        let method = request.method();
        let uri = request.uri().to_string();
        let body = request.into_body();

        match state.execute_in(&env, &script, method, &uri, body.as_deref()) {
            Ok(result) => response::normalize(&result.body_string()),
            Err(e) => e.to_response(),
        }
    }

    /// Runs `f` with exclusive access to the engine.
    pub fn with_engine<T>(&self, f: impl FnOnce(&mut E) -> T) -> T {
        f(&mut self.lock().engine)
    }
}

impl<E: Engine> Drop for Bridge<E> {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);

        if state.engine.is_running() {
            state.engine.module_shutdown();
        }
    }
}
