mod context;
mod cookies;
mod header;
mod hooks;
mod output;
pub mod response;
mod result;

pub use context::{
    select_content_type, split_uri, RequestBody, RequestContext,
    FORM_CONTENT_TYPE, JSON_CONTENT_TYPE,
};
pub use cookies::CookieJar;
pub use header::ResponseHeader;
pub use hooks::{ExecutionHooks, NoOpHooks, OutputAction, StreamingCallback};
pub use output::{AppendOutcome, OutputAggregator, OutputError};
pub use response::HostResponse;
pub use result::ExecutionResult;
