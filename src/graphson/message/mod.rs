//! GraphSON request and response messages.

pub mod request;
pub mod response;

pub use request::{
    make_auth_request, make_close_session_request, make_request, new_request_id, Op, Processor,
    Request, RequestOptions, SessionContext,
};
pub use response::{Response, ResponseOrigin, ResponseStatus, ResponseStatusCode, StatusClass};
