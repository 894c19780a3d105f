//! Generation backends: anything that turns a prompt into generated text.
//!
//! Backends are stateless across calls. Every failure to obtain text
//! (transport, timeout, non-success status, empty body) surfaces as
//! `ServiceError::UpstreamUnavailable`.

use crate::error::ServiceResult;

pub(crate) mod command;
pub(crate) mod http;

pub use command::CommandBackend;
pub use http::{HttpBackend, HttpBackendConfig};

pub trait GenerationBackend {
    fn name(&self) -> &str;

    fn generate(&self, prompt: &str) -> ServiceResult<String>;
}
