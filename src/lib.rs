//! Embeds PHP's embed SAPI inside a mobile host process.
//!
//! The host (an Android or iOS app) hands over HTTP-like requests from its
//! web view; the bridge turns them into interpreter request state, runs the
//! app's front controller and returns whatever the script printed.
//!
//! # Execution Model
//!
//! The interpreter is NTS and process-global. One [`Bridge`] owns it and
//! serializes every entry point behind a mutex, so exactly one request runs
//! at a time and each starts with an empty output buffer.
//!
//! The interpreter itself sits behind the [`Engine`] trait. The `embed`
//! feature provides [`EmbedEngine`], linked against a static `libphp.a`.
//!
//! # Example
//!
//! ```ignore
//! use mobile_php_bridge::{Bridge, BridgeConfig, EmbedEngine, HostRequest};
//!
//! let config = BridgeConfig::from_env("/data/user/0/com.example/app_storage");
//! let bridge = Bridge::new(EmbedEngine::new()?, config);
//! bridge.initialize()?;
//!
//! let response = bridge.handle_request(
//!     HostRequest::get("/dashboard?tab=2").with_cookie("laravel_session", "abc"),
//! );
//! println!("{}", response);
//! ```

#![allow(static_mut_refs)]

pub mod adapters;
pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod env;
pub mod execution;
pub mod host;
pub mod runtime;

pub use adapters::{ManagementCommand, Method, HostRequest, RequestError, MAX_ARGV};

pub use bootstrap::{Bootstrapper, ExecutionError, INIT_FAILED_MESSAGE};
pub use config::{BridgeConfig, BufferPolicy, ReusePolicy};
pub use engine::{Engine, EngineError, ServerVars, StartupOptions};
pub use env::Environment;
pub use runtime::{Bridge, BridgeError, PendingRequest};

#[cfg(feature = "embed")]
pub use engine::EmbedEngine;

pub use execution::{
    AppendOutcome, CookieJar, ExecutionHooks, ExecutionResult, HostResponse,
    NoOpHooks, OutputAction, OutputAggregator, OutputError, RequestContext,
    ResponseHeader, StreamingCallback,
};

pub use host::{
    Attachment, HostArg, HostEnv, HostError, HostMethod, HostRuntime,
    HostValue, NativeActions,
};

pub mod prelude {
    pub use crate::{
        Bridge, BridgeConfig, BridgeError, Engine, EngineError,
        ExecutionError, ExecutionHooks, ExecutionResult, HostRequest,
        ManagementCommand, Method, NoOpHooks, OutputAction, OutputAggregator,
        ReusePolicy, StreamingCallback,
    };

    #[cfg(feature = "embed")]
    pub use crate::EmbedEngine;

    #[cfg(feature = "http")]
    pub use crate::{from_http_parts, from_http_request};
}

#[cfg(feature = "http")]
pub use adapters::{from_http_parts, from_http_request};
