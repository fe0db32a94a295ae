//! # GraphSON v3 Protocol
//!
//! Low-level Gremlin-over-GraphSON message handling.
//!
//! ## Submodules
//!
//! - [`codec`] - Frame serialization and parsing
//! - [`message`] - Request and response messages
//! - [`encoder`] / [`decoder`] - Typed GraphSON values
//! - [`error`] - Protocol error types
//!
//! ## Note
//!
//! Most users should use the high-level [`crate::driver`] module instead of
//! building frames directly.

pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod message;

pub use codec::{deserialize_response, peek_request_id, serialize_request, GRAPHSON_V3_MIME};
pub use error::{GraphsonError, GraphsonResult};
pub use message::{
    make_auth_request, make_close_session_request, make_request, Op, Processor, Request,
    RequestOptions, Response, ResponseOrigin, ResponseStatusCode, SessionContext, StatusClass,
};
