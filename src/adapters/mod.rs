pub mod cli;
pub mod web;

pub use cli::{ManagementCommand, MAX_ARGV};
pub use web::{header_env_name, validate_uri, HostRequest, Method, RequestError};

#[cfg(feature = "http")]
pub use web::{from_http_parts, from_http_request};

#[cfg(test)]
mod tests;
