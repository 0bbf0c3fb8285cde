//! SAPI callbacks of the embed engine.
//!
//! # Safety
//!
//! All callbacks share these invariants:
//!
//! - **Threading**: NTS build only. One request executes at a time.
//! - **Context lifetime**: `sapi_globals.server_context` points at a live
//!   `RequestState` between request startup and request shutdown, and is
//!   null otherwise.
//! - **Panic safety**: Rust code runs inside `catch_unwind`.
//! - **Pointer validity**: PHP-provided pointers are valid for the callback duration.

#![allow(clippy::missing_safety_doc)]

use std::ffi::CStr;
use std::os::raw::{c_char, c_double, c_int, c_uint, c_void};

#[cfg(feature = "tracing")]
use tracing::{debug, error, info, trace, warn};

use super::ffi;
use super::request_state::RequestState;

#[inline]
pub(crate) unsafe fn get_state() -> Option<*mut RequestState> {
    let ptr = ffi::sapi_globals.server_context as *mut RequestState;
    if ptr.is_null() {
        return None;
    }

    // Alignment check catches corruption
    let align = std::mem::align_of::<RequestState>();
    if (ptr as usize) % align != 0 {
        return None;
    }

    Some(ptr)
}

#[no_mangle]
pub unsafe extern "C" fn nativephp_sapi_ub_write(
    str: *const c_char,
    str_length: usize,
) -> usize {
    if str.is_null() || str_length == 0 {
        return 0;
    }

    let Some(state) = get_state() else {
        return 0;
    };

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let bytes = std::slice::from_raw_parts(str as *const u8, str_length);

        #[cfg(feature = "tracing")]
        trace!(bytes_written = str_length, "Output captured");

        (*state).write_output(bytes)
    }));

    result.unwrap_or(0)
}

#[no_mangle]
pub unsafe extern "C" fn nativephp_sapi_flush(_server_context: *mut c_void) {
    #[cfg(feature = "tracing")]
    trace!("Flush called");
}

/// Headers travel inside the body for the host to normalize, so nothing is
/// sent here.
#[no_mangle]
pub unsafe extern "C" fn nativephp_sapi_send_headers(
    sapi_headers: *mut ffi::sapi_headers_struct,
) -> c_int {
    if sapi_headers.is_null() {
        return ffi::SAPI_HEADER_SEND_FAILED;
    }

    #[cfg(feature = "tracing")]
    debug!(
        status = (*sapi_headers).http_response_code,
        count = (*sapi_headers).headers.count,
        "Headers sent"
    );

    ffi::SAPI_HEADER_SENT_SUCCESSFULLY
}

/// May be called multiple times per request.
#[no_mangle]
pub unsafe extern "C" fn nativephp_sapi_read_post(
    buffer: *mut c_char,
    count_bytes: usize,
) -> usize {
    if buffer.is_null() || count_bytes == 0 {
        return 0;
    }

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let Some(state) = get_state() else {
            return 0;
        };

        let slice = std::slice::from_raw_parts_mut(buffer as *mut u8, count_bytes);
        (*state).read_post(slice)
    }));

    result.unwrap_or(0)
}

#[no_mangle]
pub unsafe extern "C" fn nativephp_sapi_read_cookies() -> *mut c_char {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let Some(state) = get_state() else {
            return std::ptr::null_mut();
        };
        (*state).cookie_data_ptr()
    }));

    result.unwrap_or(std::ptr::null_mut())
}

/// Fills `$_SERVER` on first use.
#[no_mangle]
pub unsafe extern "C" fn nativephp_sapi_register_server_variables(
    track_vars_array: *mut ffi::zval,
) {
    if track_vars_array.is_null() {
        return;
    }

    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let Some(state) = get_state() else {
            return;
        };

        for (name, value) in (*state).server_vars() {
            ffi::php_register_variable_safe(
                name.as_ptr(),
                value.as_ptr(),
                value.as_bytes().len(),
                track_vars_array,
            );
        }
    }));
}

#[no_mangle]
pub extern "C" fn nativephp_sapi_default_post_reader() {}

#[no_mangle]
pub unsafe extern "C" fn nativephp_sapi_treat_data(
    arg: c_int,
    str: *mut c_char,
    dest_array: *mut ffi::zval,
) {
    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        ffi::php_default_treat_data(arg, str, dest_array);
    }));
}

#[no_mangle]
pub unsafe extern "C" fn nativephp_sapi_input_filter(
    arg: c_int,
    var: *const c_char,
    val: *mut *mut c_char,
    val_len: usize,
    new_val_len: *mut usize,
) -> c_uint {
    ffi::php_default_input_filter(arg, var, val, val_len, new_val_len)
}

#[no_mangle]
pub unsafe extern "C" fn nativephp_sapi_log_message(
    message: *const c_char,
    syslog_type: c_int,
) {
    if message.is_null() {
        return;
    }

    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let msg = CStr::from_ptr(message).to_string_lossy();

        #[cfg(feature = "tracing")]
        match syslog_type {
            0..=3 => error!(message = %msg, "PHP error"),
            4 => warn!(message = %msg, "PHP warning"),
            5 | 6 => info!(message = %msg, "PHP notice"),
            _ => debug!(message = %msg, "PHP debug"),
        }

        #[cfg(not(feature = "tracing"))]
        let _ = (msg, syslog_type);
    }));
}

#[no_mangle]
pub unsafe extern "C" fn nativephp_sapi_get_request_time(
    request_time: *mut c_double,
) -> c_int {
    if request_time.is_null() {
        return ffi::FAILURE;
    }

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        use std::time::{SystemTime, UNIX_EPOCH};

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        *request_time = now;
        ffi::SUCCESS
    }));

    result.unwrap_or(ffi::FAILURE)
}

/// `getenv()` from scripts resolves against the exported environment.
#[no_mangle]
pub unsafe extern "C" fn nativephp_sapi_getenv(
    name: *const c_char,
    name_len: usize,
) -> *mut c_char {
    if name.is_null() || name_len == 0 {
        return std::ptr::null_mut();
    }

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let name_bytes = std::slice::from_raw_parts(name as *const u8, name_len);

        get_state()
            .and_then(|state| (*state).get_env(name_bytes))
            .map(|ptr| ptr as *mut c_char)
            .unwrap_or(std::ptr::null_mut())
    }));

    result.unwrap_or(std::ptr::null_mut())
}

/// Points the module at the callbacks above.
pub(crate) unsafe fn install(module: *mut ffi::sapi_module_struct) {
    (*module).ub_write = Some(nativephp_sapi_ub_write);
    (*module).flush = Some(nativephp_sapi_flush);
    (*module).send_headers = Some(nativephp_sapi_send_headers);
    (*module).read_post = Some(nativephp_sapi_read_post);
    (*module).read_cookies = Some(nativephp_sapi_read_cookies);
    (*module).register_server_variables =
        Some(nativephp_sapi_register_server_variables);
    (*module).log_message = Some(nativephp_sapi_log_message);
    (*module).get_request_time = Some(nativephp_sapi_get_request_time);
    (*module).getenv = Some(nativephp_sapi_getenv);
    (*module).input_filter = Some(nativephp_sapi_input_filter);
    (*module).default_post_reader = Some(nativephp_sapi_default_post_reader);
    (*module).treat_data = Some(nativephp_sapi_treat_data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ub_write_null_buffer() {
        unsafe {
            assert_eq!(nativephp_sapi_ub_write(std::ptr::null(), 10), 0);
        }
    }

    #[test]
    fn test_ub_write_zero_length() {
        unsafe {
            let data = b"test";
            assert_eq!(nativephp_sapi_ub_write(data.as_ptr() as *const c_char, 0), 0);
        }
    }

    #[test]
    fn test_getenv_null_name() {
        unsafe {
            assert!(nativephp_sapi_getenv(std::ptr::null(), 4).is_null());
        }
    }

    #[test]
    fn test_get_request_time_null() {
        unsafe {
            assert_eq!(
                nativephp_sapi_get_request_time(std::ptr::null_mut()),
                ffi::FAILURE
            );
        }
    }
}
