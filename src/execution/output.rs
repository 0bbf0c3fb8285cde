//! Output aggregation for a single request.
//!
//! Chunks written by the interpreter are appended to one growable buffer.
//! Growth happens in fixed `chunk_size` steps up to a hard `ceiling`;
//! anything past the ceiling is dropped and logged, never surfaced as an
//! error. The buffer keeps a trailing NUL so it can be handed to C hosts
//! as-is.

use std::ffi::CStr;

use thiserror::Error;

#[cfg(feature = "tracing")]
use tracing::{error, trace, warn};

use crate::config::BufferPolicy;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OutputError {
    #[error("failed to allocate {requested} bytes for output buffer")]
    Allocation { requested: usize },
}

/// Result of a single [`OutputAggregator::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum AppendOutcome {
    Appended,
    /// The chunk would have pushed the buffer past its ceiling.
    Truncated,
    /// Growing the buffer failed; prior content is intact.
    AllocationFailed,
}

impl AppendOutcome {
    pub fn is_appended(&self) -> bool {
        matches!(self, Self::Appended)
    }
}

#[derive(Debug)]
pub struct OutputAggregator {
    policy: BufferPolicy,
    /// Content followed by one NUL byte. `None` until the first reset.
    data: Option<Vec<u8>>,
    /// Logical capacity, a multiple of `chunk_size` clamped to `ceiling`.
    /// The NUL terminator is stored outside of it.
    capacity: usize,
    truncated: bool,
}

impl Default for OutputAggregator {
    fn default() -> Self {
        Self::new(BufferPolicy::default())
    }
}

impl OutputAggregator {
    /// Creates an unallocated aggregator. Call [`reset`](Self::reset) before
    /// the first run; `append` will otherwise allocate lazily.
    pub fn new(policy: BufferPolicy) -> Self {
        Self {
            policy,
            data: None,
            capacity: 0,
            truncated: false,
        }
    }

    pub fn policy(&self) -> BufferPolicy {
        self.policy
    }

    /// Drops prior content and allocates one chunk.
    pub fn reset(&mut self) -> Result<(), OutputError> {
        self.data = None;
        self.capacity = 0;
        self.truncated = false;

        let chunk = self.policy.chunk_size().max(1);
        let mut buf = Vec::new();
        buf.try_reserve_exact(chunk + 1)
            .map_err(|_| OutputError::Allocation { requested: chunk })?;
        buf.push(0);

        self.data = Some(buf);
        self.capacity = chunk;
        Ok(())
    }

    pub fn append(&mut self, chunk: &[u8]) -> AppendOutcome {
        if chunk.is_empty() {
            return AppendOutcome::Appended;
        }

        if self.data.is_none() {
            #[cfg(feature = "tracing")]
            trace!("Output buffer not allocated, resetting lazily");

            if let Err(_e) = self.reset() {
                #[cfg(feature = "tracing")]
                error!(error = %_e, "Lazy output buffer allocation failed");
                return AppendOutcome::AllocationFailed;
            }
        }

        let len = self.len();
        let Some(required) = len.checked_add(chunk.len()) else {
            self.truncated = true;
            return AppendOutcome::Truncated;
        };

        if required > self.capacity {
            let step = self.policy.chunk_size().max(1);
            let needed = required
                .div_ceil(step)
                .checked_mul(step);

            let needed = match needed {
                Some(n) if required <= self.policy.ceiling() => n.min(self.policy.ceiling()),
                _ => {
                    #[cfg(feature = "tracing")]
                    warn!(
                        ceiling = self.policy.ceiling(),
                        dropped = chunk.len(),
                        "Output buffer exceeded maximum size, dropping chunk"
                    );
                    self.truncated = true;
                    return AppendOutcome::Truncated;
                }
            };

            let Some(buf) = self.data.as_mut() else {
                return AppendOutcome::AllocationFailed;
            };

            if buf.try_reserve_exact(needed - len).is_err() {
                #[cfg(feature = "tracing")]
                error!(requested = needed, "Failed to grow output buffer");
                self.truncated = true;
                return AppendOutcome::AllocationFailed;
            }

            self.capacity = needed;
        }

        let Some(buf) = self.data.as_mut() else {
            return AppendOutcome::AllocationFailed;
        };

        buf.pop();
        buf.extend_from_slice(chunk);
        buf.push(0);

        AppendOutcome::Appended
    }

    /// Snapshot of the current content. Does not clear the buffer.
    pub fn collect(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.data {
            Some(buf) => &buf[..buf.len() - 1],
            None => &[],
        }
    }

    /// NUL-terminated view. Stops at the first interior NUL, as a C reader
    /// would.
    pub fn as_c_str(&self) -> &CStr {
        self.data
            .as_deref()
            .and_then(|buf| CStr::from_bytes_until_nul(buf).ok())
            .unwrap_or(c"")
    }

    /// Empties the content but keeps the allocation.
    pub fn clear(&mut self) {
        if let Some(buf) = self.data.as_mut() {
            buf.clear();
            buf.push(0);
        }
        self.truncated = false;
    }

    /// Frees the buffer entirely.
    pub fn release(&mut self) {
        self.data = None;
        self.capacity = 0;
        self.truncated = false;
    }

    pub fn len(&self) -> usize {
        self.data
            .as_ref()
            .map(|buf| buf.len() - 1)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_allocated(&self) -> bool {
        self.data.is_some()
    }

    /// True when some chunk was refused since the last reset or clear.
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}
