//! [`Engine`] over a statically linked `libphp.a` built with
//! `--enable-embed=static` (NTS).

use std::ffi::{c_char, CString};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "tracing")]
use tracing::{debug, error, info, trace};

mod callbacks;
mod ffi;
mod request_state;

use request_state::RequestState;

use super::{cookie_assignment, php_single_quoted, Engine, EngineError, ServerVars, StartupOptions};
use crate::env::Environment;
use crate::execution::{CookieJar, RequestBody};

pub(crate) static SAPI_NAME: &[u8] = b"nativephp\0";
pub(crate) static SAPI_PRETTY_NAME: &[u8] = b"NativePHP Mobile Bridge\0";

static CLAIMED: AtomicBool = AtomicBool::new(false);

const OPEN_STDOUT: &str =
    "if (!defined('STDOUT')) { define('STDOUT', fopen('php://memory', 'w+')); }";
const DRAIN_STDOUT: &str = "if (defined('STDOUT') && is_resource(STDOUT)) { \
     fflush(STDOUT); rewind(STDOUT); echo stream_get_contents(STDOUT); fclose(STDOUT); }";

/// The process-wide PHP interpreter.
///
/// PHP keeps its state in globals, so at most one `EmbedEngine` exists at a
/// time.
pub struct EmbedEngine {
    running: bool,
    ini_entries: CString,
    argv: Vec<CString>,
    argv_ptrs: Vec<*mut c_char>,
    env: Vec<(CString, CString)>,
    state: *mut RequestState,
    request_method: Option<CString>,
    request_uri: Option<CString>,
    query_string: Option<CString>,
}

// SAFETY: NTS PHP has no thread-local state; the bridge serialises every
// call behind its mutex, so the engine may move between host threads.
unsafe impl Send for EmbedEngine {}

impl EmbedEngine {
    /// Claims the interpreter. Fails if another `EmbedEngine` is alive.
    pub fn new() -> Result<Self, EngineError> {
        if CLAIMED.swap(true, Ordering::AcqRel) {
            return Err(EngineError::InvalidInput(
                "an EmbedEngine already exists in this process".to_string(),
            ));
        }

        Ok(Self {
            running: false,
            ini_entries: CString::default(),
            argv: Vec::new(),
            argv_ptrs: Vec::new(),
            env: Vec::new(),
            state: std::ptr::null_mut(),
            request_method: None,
            request_uri: None,
            query_string: None,
        })
    }

    fn state(&mut self) -> Option<&mut RequestState> {
        // SAFETY: `state` is either null or the live box installed by
        // `request_startup`.
        unsafe { self.state.as_mut() }
    }

    fn to_cstring(value: &str, what: &str) -> Result<CString, EngineError> {
        CString::new(value)
            .map_err(|_| EngineError::InvalidInput(format!("{} contains a NUL byte", what)))
    }
}

impl Drop for EmbedEngine {
    fn drop(&mut self) {
        if !self.state.is_null() {
            self.request_shutdown();
        }
        self.module_shutdown();
        CLAIMED.store(false, Ordering::Release);
    }
}

impl Engine for EmbedEngine {
    fn module_startup(&mut self, options: &StartupOptions) -> Result<(), EngineError> {
        if self.running {
            return Ok(());
        }

        #[cfg(feature = "tracing")]
        info!(console = options.is_console(), "Starting PHP module");

        if let Some(dir) = &options.working_dir {
            std::env::set_current_dir(dir).map_err(|e| {
                EngineError::ModuleStartupFailed(format!("chdir {}: {}", dir.display(), e))
            })?;
        }

        self.ini_entries = Self::to_cstring(&options.ini_entries, "INI entries")?;
        self.argv = options
            .argv
            .iter()
            .map(|arg| Self::to_cstring(arg, "argument"))
            .collect::<Result<_, _>>()?;
        self.argv_ptrs = self
            .argv
            .iter()
            .map(|arg| arg.as_ptr() as *mut c_char)
            .collect();

        // SAFETY: single owner of the interpreter (see `CLAIMED`); the INI
        // and argv strings live in `self` until the module shuts down.
        unsafe {
            let module = std::ptr::addr_of_mut!(ffi::sapi_module);

            (*module).name = SAPI_NAME.as_ptr() as *mut _;
            (*module).pretty_name = SAPI_PRETTY_NAME.as_ptr() as *mut _;
            callbacks::install(module);
            (*module).php_ini_ignore = 0;
            (*module).php_ini_ignore_cwd = 1;
            (*module).phpinfo_as_text = 1;

            #[cfg(feature = "tracing")]
            trace!("Starting SAPI");
            ffi::sapi_startup(module);

            // sapi_startup clears ini_entries
            (*module).ini_entries = self.ini_entries.as_ptr();

            if ffi::php_module_startup(module, std::ptr::null_mut()) == ffi::FAILURE {
                #[cfg(feature = "tracing")]
                error!("PHP startup failed");
                ffi::sapi_shutdown();
                return Err(EngineError::ModuleStartupFailed(
                    "php_module_startup returned FAILURE".to_string(),
                ));
            }
        }

        self.running = true;

        #[cfg(feature = "tracing")]
        info!("PHP initialized");

        Ok(())
    }

    fn module_shutdown(&mut self) {
        if !self.running {
            return;
        }

        #[cfg(feature = "tracing")]
        info!("Shutting down PHP module");

        // SAFETY: the module was started by this engine and no request is
        // active.
        unsafe {
            ffi::php_module_shutdown();
            ffi::sapi_shutdown();
            (*std::ptr::addr_of_mut!(ffi::sapi_module)).ini_entries = std::ptr::null();
        }

        self.running = false;
        self.argv_ptrs.clear();
        self.argv.clear();
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn export_env(&mut self, env: &Environment) {
        self.env = env
            .iter()
            .filter_map(|(k, v)| Some((CString::new(k).ok()?, CString::new(v).ok()?)))
            .collect();
    }

    fn request_startup(&mut self) -> Result<(), EngineError> {
        if !self.running {
            return Err(EngineError::NotRunning);
        }

        #[cfg(feature = "tracing")]
        trace!("Starting PHP request");

        self.state = Box::into_raw(Box::new(RequestState::new(self.env.clone())));

        // SAFETY: ownership of the box moves to `sapi_globals.server_context`
        // until `request_shutdown` reclaims it. `self.state` is set first so
        // a failed startup is still cleaned up.
        unsafe {
            ffi::sapi_globals.server_context = self.state.cast();

            if !self.argv_ptrs.is_empty() {
                ffi::sapi_globals.request_info.argc = self.argv_ptrs.len() as i32;
                ffi::sapi_globals.request_info.argv = self.argv_ptrs.as_mut_ptr();
            }

            if ffi::php_request_startup() == ffi::FAILURE {
                #[cfg(feature = "tracing")]
                error!("Request startup failed");
                return Err(EngineError::RequestStartupFailed);
            }
        }

        Ok(())
    }

    fn register_server_vars(&mut self, vars: &ServerVars) {
        let pairs = vars.to_cstring_pairs();
        if let Some(state) = self.state() {
            state.set_server_vars(pairs);
        }
    }

    fn register_cookies(&mut self, cookies: &CookieJar) {
        if let (Ok(header), Some(state)) = (CString::new(cookies.to_header()), self.state()) {
            state.set_cookie_data(header);
        }

        // $_COOKIE was built during request startup, before the jar existed.
        let code = cookie_assignment(cookies);
        if !self.eval(&code, "cookies") {
            #[cfg(feature = "tracing")]
            error!("Failed to register cookies");
        }
    }

    fn open_stdout(&mut self) -> Result<(), EngineError> {
        if !self.eval(OPEN_STDOUT, "stdout") {
            return Err(EngineError::StreamUnavailable(
                "php://memory could not be opened".to_string(),
            ));
        }

        // SAFETY: inside an active request.
        if unsafe { ffi::php_output_start_default() } == ffi::FAILURE {
            return Err(EngineError::StreamUnavailable(
                "output buffering could not be started".to_string(),
            ));
        }

        Ok(())
    }

    fn set_request_body(&mut self, body: &RequestBody) {
        let content_type = CString::new(body.content_type).ok();
        let Some(state) = self.state() else {
            return;
        };
        state.set_body(body.bytes.clone(), content_type);

        let content_type_ptr = state.content_type_ptr();
        let content_length = state.content_length() as i64;

        // SAFETY: the pointers are owned by the request state, which outlives
        // the request.
        unsafe {
            ffi::sapi_globals.request_info.content_type = content_type_ptr;
            ffi::sapi_globals.request_info.content_length = content_length;
            ffi::sapi_globals.read_post_bytes = 0;
            ffi::sapi_globals.post_read = 0;
        }

        #[cfg(feature = "tracing")]
        debug!(content_length, content_type = body.content_type, "Request body set");
    }

    fn finish_request_startup(&mut self, method: &str, uri: &str, query_string: &str) {
        self.request_method = CString::new(method).ok();
        self.request_uri = CString::new(uri).ok();
        self.query_string = CString::new(query_string).ok();

        // SAFETY: the strings live in `self` until `request_shutdown`.
        unsafe {
            let info = &mut ffi::sapi_globals.request_info;
            info.request_method = self
                .request_method
                .as_ref()
                .map(|c| c.as_ptr())
                .unwrap_or(c"GET".as_ptr());
            info.request_uri = self
                .request_uri
                .as_ref()
                .map(|c| c.as_ptr() as *mut c_char)
                .unwrap_or(std::ptr::null_mut());
            info.query_string = self
                .query_string
                .as_ref()
                .map(|c| c.as_ptr() as *mut c_char)
                .unwrap_or(std::ptr::null_mut());
        }

        // $_GET was built during request startup as well.
        if !query_string.is_empty() {
            let code = format!("parse_str({}, $_GET);", php_single_quoted(query_string));
            self.eval(&code, "query");
        }
    }

    fn eval(&mut self, code: &str, name: &str) -> bool {
        let (Ok(code), Ok(name)) = (CString::new(code), CString::new(name)) else {
            return false;
        };

        // SAFETY: inside an active request; both strings are NUL-terminated.
        let result = unsafe {
            ffi::zend_eval_stringl(
                code.as_ptr(),
                code.as_bytes().len(),
                std::ptr::null_mut(),
                name.as_ptr(),
            )
        };

        result == ffi::SUCCESS
    }

    fn execute_script(&mut self, path: &Path, output: &mut dyn FnMut(&[u8])) -> bool {
        let Ok(script) = CString::new(path.to_string_lossy().as_bytes()) else {
            return false;
        };

        let Some(state) = self.state() else {
            return false;
        };

        // SAFETY: the sink is detached below, before `output` goes out of
        // scope. Pending buffers are flushed while it is attached.
        unsafe {
            state.attach_sink(output);

            let mut file_handle = ffi::zend_file_handle::default();
            ffi::zend_stream_init_filename(&mut file_handle, script.as_ptr());
            file_handle.primary_script = 1;

            let executed = ffi::php_execute_script(&mut file_handle);
            ffi::zend_destroy_file_handle(&mut file_handle);
            ffi::php_output_end_all();

            state.detach_sink();
            executed
        }
    }

    fn drain_stdout(&mut self) -> Vec<u8> {
        self.eval(DRAIN_STDOUT, "stdout");
        self.state()
            .map(RequestState::take_captured)
            .unwrap_or_default()
    }

    fn request_shutdown(&mut self) {
        if self.state.is_null() {
            return;
        }

        #[cfg(feature = "tracing")]
        trace!("Shutting down request");

        // SAFETY: reclaims the box installed by `request_startup` after PHP
        // no longer references it.
        unsafe {
            ffi::sapi_globals.post_read = 1;
            ffi::php_request_shutdown(std::ptr::null_mut());
            ffi::sapi_globals.server_context = std::ptr::null_mut();

            let info = &mut ffi::sapi_globals.request_info;
            info.request_method = std::ptr::null();
            info.content_type = std::ptr::null();
            info.query_string = std::ptr::null_mut();
            info.cookie_data = std::ptr::null_mut();
            info.request_uri = std::ptr::null_mut();
            info.argc = 0;
            info.argv = std::ptr::null_mut();

            drop(Box::from_raw(self.state));
        }

        self.state = std::ptr::null_mut();
        self.request_method = None;
        self.request_uri = None;
        self.query_string = None;
    }
}
