//! sitesync Remote - HTTP adapter for the remote content store
//!
//! Implements the `IRemoteStore` port over a small REST API:
//!
//! | operation | request                                              |
//! |-----------|------------------------------------------------------|
//! | upload    | `PUT  {endpoint}/sites/{site}/files{path}?mode=...`  |
//! | delete    | `DELETE {endpoint}/sites/{site}/files{path}`         |
//! | move      | `POST {endpoint}/sites/{site}/move` `{"from","to"}`  |
//!
//! Every request carries a bearer token. Failed responses are classified
//! into fatal and retryable [`RemoteError`]s by [`classify_status`].
//!
//! ## Modules
//!
//! - [`client`] - The [`HttpRemoteStore`] client

pub mod client;

use reqwest::StatusCode;
use sitesync_core::ports::RemoteError;

pub use client::HttpRemoteStore;

/// Maps a non-success HTTP status to a [`RemoteError`]
///
/// | status                 | error          | fatal |
/// |------------------------|----------------|-------|
/// | 401                    | `Unauthorized` | yes   |
/// | 403                    | `Forbidden`    | yes   |
/// | 400, 413, 422          | `Validation`   | yes   |
/// | 404                    | `NotFound`     | no    |
/// | 409                    | `Conflict`     | no    |
/// | 429                    | `RateLimited`  | no    |
/// | 408, 5xx               | `Server`       | no    |
/// | any other 4xx          | `Validation`   | yes   |
/// | anything else          | `Server`       | no    |
pub fn classify_status(status: StatusCode, message: String) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED => RemoteError::Unauthorized(message),
        StatusCode::FORBIDDEN => RemoteError::Forbidden(message),
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNPROCESSABLE_ENTITY => {
            RemoteError::Validation(message)
        }
        StatusCode::NOT_FOUND => RemoteError::NotFound(message),
        StatusCode::CONFLICT => RemoteError::Conflict(message),
        StatusCode::TOO_MANY_REQUESTS => RemoteError::RateLimited(message),
        StatusCode::REQUEST_TIMEOUT => RemoteError::Server {
            status: status.as_u16(),
            message,
        },
        s if s.is_client_error() => RemoteError::Validation(format!("{}: {}", s.as_u16(), message)),
        s => RemoteError::Server {
            status: s.as_u16(),
            message,
        },
    }
}

/// Wraps a transport failure (connect, TLS, timeout, body)
pub fn network_error(err: reqwest::Error) -> RemoteError {
    RemoteError::Network(err.to_string())
}
