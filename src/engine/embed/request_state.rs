use std::cell::Cell;
use std::ffi::{c_char, CString};

type OutputSink = *mut (dyn FnMut(&[u8]) + 'static);

/// Per-request state reached from SAPI callbacks through
/// `sapi_globals.server_context`.
///
/// `post_position` uses `Cell` because `read_post` runs behind a shared
/// pointer while PHP owns the call stack.
pub(crate) struct RequestState {
    env_vars: Vec<(CString, CString)>,
    server_vars: Vec<(CString, CString)>,
    cookie_data: Option<CString>,
    content_type: Option<CString>,
    post_data: Vec<u8>,
    post_position: Cell<usize>,
    sink: Option<OutputSink>,
    captured: Vec<u8>,
}

impl RequestState {
    pub fn new(env_vars: Vec<(CString, CString)>) -> Self {
        Self {
            env_vars,
            server_vars: Vec::new(),
            cookie_data: None,
            content_type: None,
            post_data: Vec::new(),
            post_position: Cell::new(0),
            sink: None,
            captured: Vec::new(),
        }
    }

    pub fn get_env(&self, key: &[u8]) -> Option<*const c_char> {
        self.env_vars
            .iter()
            .find(|(k, _)| k.as_bytes() == key)
            .map(|(_, v)| v.as_ptr())
    }

    pub fn set_server_vars(&mut self, vars: Vec<(CString, CString)>) {
        self.server_vars = vars;
    }

    pub fn server_vars(&self) -> &[(CString, CString)] {
        &self.server_vars
    }

    pub fn set_cookie_data(&mut self, header: CString) {
        self.cookie_data = Some(header);
    }

    pub fn cookie_data_ptr(&self) -> *mut c_char {
        self.cookie_data
            .as_ref()
            .map(|c| c.as_ptr() as *mut c_char)
            .unwrap_or(std::ptr::null_mut())
    }

    pub fn set_body(&mut self, bytes: Vec<u8>, content_type: Option<CString>) {
        self.post_data = bytes;
        self.post_position.set(0);
        self.content_type = content_type;
    }

    pub fn content_type_ptr(&self) -> *const c_char {
        self.content_type
            .as_ref()
            .map(|c| c.as_ptr())
            .unwrap_or(std::ptr::null())
    }

    pub fn content_length(&self) -> usize {
        self.post_data.len()
    }

    pub fn read_post(&self, buffer: &mut [u8]) -> usize {
        if buffer.is_empty() {
            return 0;
        }

        let pos = self.post_position.get();
        let remaining = self
            .post_data
            .len()
            .saturating_sub(pos);
        let to_copy = remaining.min(buffer.len());

        if to_copy > 0 {
            let end = pos + to_copy;
            buffer[..to_copy].copy_from_slice(&self.post_data[pos..end]);
            self.post_position.set(end);
        }

        to_copy
    }

    /// Routes writes to `sink` until [`RequestState::detach_sink`].
    ///
    /// # Safety
    ///
    /// The closure must outlive the attachment; callers detach before the
    /// borrow ends.
    pub unsafe fn attach_sink(&mut self, sink: &mut dyn FnMut(&[u8])) {
        let ptr: *mut (dyn FnMut(&[u8]) + '_) = sink;
        self.sink = Some(std::mem::transmute::<
            *mut (dyn FnMut(&[u8]) + '_),
            OutputSink,
        >(ptr));
    }

    pub fn detach_sink(&mut self) {
        self.sink = None;
    }

    /// Unbuffered output. Goes to the attached sink, or is kept for
    /// [`RequestState::take_captured`] when none is attached.
    pub fn write_output(&mut self, data: &[u8]) -> usize {
        match self.sink {
            // SAFETY: see `attach_sink`.
            Some(sink) => unsafe { (*sink)(data) },
            None => self.captured.extend_from_slice(data),
        }
        data.len()
    }

    pub fn take_captured(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.captured)
    }
}
