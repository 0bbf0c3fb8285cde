use std::path::Path;

use super::result::ExecutionResult;

/// What to do with a chunk of interpreter output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OutputAction {
    /// Append to the output aggregator.
    Buffer,
    /// Already delivered elsewhere (e.g. forwarded to a host callback).
    Handled,
}

/// No-op implementation of `ExecutionHooks`.
pub struct NoOpHooks;

impl ExecutionHooks for NoOpHooks {}

/// Forwards every output chunk to a closure instead of buffering it.
///
/// This is the shape of the iOS bridge, where each write goes straight to
/// a host-side callback.
pub struct StreamingCallback<F> {
    output_fn: F,
}

impl<F> StreamingCallback<F>
where
    F: FnMut(&[u8]),
{
    pub fn new(output_fn: F) -> Self {
        Self { output_fn }
    }
}

impl<F> ExecutionHooks for StreamingCallback<F>
where
    F: FnMut(&[u8]),
{
    fn on_output(&mut self, data: &[u8]) -> OutputAction {
        (self.output_fn)(data);
        OutputAction::Handled
    }
}

/// Callbacks invoked while the bootstrapper drives a request.
///
/// Every method has a default that does nothing.
pub trait ExecutionHooks {
    /// Called before the interpreter's request startup.
    fn on_request_starting(&mut self) {}
    /// Called once request state (server vars, cookies, body) is in place.
    fn on_request_started(&mut self) {}

    fn on_script_executing(&mut self, script_path: &Path) {
        let _ = script_path;
    }

    fn on_script_executed(&mut self, success: bool) {
        let _ = success;
    }

    /// Called for each chunk the interpreter writes. Return `Handled` to
    /// keep it out of the aggregated result.
    fn on_output(&mut self, data: &[u8]) -> OutputAction {
        let _ = data;
        OutputAction::Buffer
    }

    /// Called after request shutdown with the final result.
    fn on_request_finished(&mut self, result: &ExecutionResult) {
        let _ = result;
    }
}

impl<H: ExecutionHooks + ?Sized> ExecutionHooks for &mut H {
    fn on_request_starting(&mut self) {
        (**self).on_request_starting()
    }

    fn on_request_started(&mut self) {
        (**self).on_request_started()
    }

    fn on_script_executing(&mut self, script_path: &Path) {
        (**self).on_script_executing(script_path)
    }

    fn on_script_executed(&mut self, success: bool) {
        (**self).on_script_executed(success)
    }

    fn on_output(&mut self, data: &[u8]) -> OutputAction {
        (**self).on_output(data)
    }

    fn on_request_finished(&mut self, result: &ExecutionResult) {
        (**self).on_request_finished(result)
    }
}
