//! Calls from PHP extensions back into the host application.
//!
//! The host side is a managed runtime (a JVM on Android) reached through a
//! per-thread environment handle. A thread that is not yet known to the
//! runtime has to attach before it can call in; [`Attachment`] does that for
//! the duration of one call.

mod actions;

use std::ops::{Deref, DerefMut};

use thiserror::Error;

#[cfg(feature = "tracing")]
use tracing::trace;

pub use actions::*;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HostError {
    #[error("Failed to attach thread to host runtime")]
    AttachFailed,

    #[error("Bridge instance is not registered")]
    NoInstance,

    #[error("Host method not found: {name}{signature}")]
    MethodNotFound {
        name: &'static str,
        signature: &'static str,
    },

    #[error("Host call failed: {0}")]
    CallFailed(String),
}

/// A method on the host-side bridge object, by name and type descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostMethod {
    pub name: &'static str,
    pub signature: &'static str,
}

impl HostMethod {
    pub const fn new(name: &'static str, signature: &'static str) -> Self {
        Self { name, signature }
    }
}

impl std::fmt::Display for HostMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.name, self.signature)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostArg<'a> {
    Str(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostValue {
    Void,
    Bool(bool),
    /// A possibly-null string reference.
    Str(Option<String>),
}

/// A thread's handle into the host runtime.
pub trait HostEnv {
    fn call(&mut self, method: HostMethod, args: &[HostArg<'_>]) -> Result<HostValue, HostError>;
}

pub trait HostRuntime {
    type Env: HostEnv;

    /// The environment of the calling thread, if it is attached.
    fn current_env(&self) -> Option<Self::Env>;

    fn attach_current_thread(&self) -> Result<Self::Env, HostError>;

    fn detach_current_thread(&self);
}

/// Scoped access to the host environment.
///
/// Detaches on drop, but only when this guard did the attaching; a thread
/// the host already owns stays attached.
pub struct Attachment<'r, R: HostRuntime> {
    runtime: &'r R,
    env: R::Env,
    attached: bool,
}

impl<'r, R: HostRuntime> Attachment<'r, R> {
    pub fn acquire(runtime: &'r R) -> Result<Self, HostError> {
        if let Some(env) = runtime.current_env() {
            return Ok(Self {
                runtime,
                env,
                attached: false,
            });
        }

        #[cfg(feature = "tracing")]
        trace!("Thread not attached, attaching");

        let env = runtime.attach_current_thread()?;
        Ok(Self {
            runtime,
            env,
            attached: true,
        })
    }

    /// Whether dropping this guard will detach the thread.
    pub fn attached(&self) -> bool {
        self.attached
    }
}

impl<R: HostRuntime> Deref for Attachment<'_, R> {
    type Target = R::Env;

    fn deref(&self) -> &Self::Target {
        &self.env
    }
}

impl<R: HostRuntime> DerefMut for Attachment<'_, R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.env
    }
}

impl<R: HostRuntime> Drop for Attachment<'_, R> {
    fn drop(&mut self) {
        if self.attached {
            #[cfg(feature = "tracing")]
            trace!("Detaching thread");

            self.runtime.detach_current_thread();
        }
    }
}
