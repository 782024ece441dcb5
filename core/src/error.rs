//! Error types for the identity service client.
//!
//! # Design
//! Every operation declares one expected status code. Any other status is
//! classified by range: 4xx becomes `ClientRequest`, 5xx becomes `Server`,
//! and everything else (including a 200 where a 204 was expected) becomes
//! `UnexpectedStatus`. Each classified error carries the status, the
//! response body when there is one, and the method and URL of the request
//! that produced it. Failures raised before a status is observed arrive as
//! `Transport` and are passed through without reinterpretation.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::http::{HttpMethod, HttpResponse};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Method and URL of the request an error belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub method: HttpMethod,
    pub url: String,
}

impl fmt::Display for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Errors returned by resource command operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The service rejected the request (4xx).
    #[error("client error {status} on {context}")]
    ClientRequest {
        status: u16,
        body: Option<Value>,
        context: RequestContext,
    },

    /// The service failed while handling the request (5xx).
    #[error("server error {status} on {context}")]
    Server {
        status: u16,
        body: Option<Value>,
        context: RequestContext,
    },

    /// A status outside 4xx/5xx that is not the one the operation expects.
    #[error("unexpected status {status} (expected {expected}) on {context}")]
    UnexpectedStatus {
        status: u16,
        expected: u16,
        body: Option<Value>,
        context: RequestContext,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be decoded as JSON.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl Error {
    /// Status code of a classified response error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::ClientRequest { status, .. }
            | Error::Server { status, .. }
            | Error::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Decoded error payload returned by the service, if any.
    pub fn body(&self) -> Option<&Value> {
        match self {
            Error::ClientRequest { body, .. }
            | Error::Server { body, .. }
            | Error::UnexpectedStatus { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    pub fn context(&self) -> Option<&RequestContext> {
        match self {
            Error::ClientRequest { context, .. }
            | Error::Server { context, .. }
            | Error::UnexpectedStatus { context, .. } => Some(context),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ClientRequest { status: 404, .. })
    }
}

/// Failures raised by the transport before any status code is observed.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("tls failure: {0}")]
    Tls(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl From<ureq::Error> for TransportError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Timeout(_) => TransportError::Timeout,
            ureq::Error::Io(e) => TransportError::Io(e),
            ureq::Error::ConnectionFailed | ureq::Error::HostNotFound => {
                TransportError::Connect(e.to_string())
            }
            ureq::Error::Tls(msg) => TransportError::Tls(msg.to_string()),
            ureq::Error::BadUri(_) | ureq::Error::Http(_) | ureq::Error::InvalidProxyUrl => {
                TransportError::InvalidRequest(e.to_string())
            }
            other => TransportError::Other(other.to_string()),
        }
    }
}

/// Errors raised while building a [`crate::Session`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid proxy {proxy}: {source}")]
    InvalidProxy {
        proxy: String,
        source: TransportError,
    },
}

/// Accept `response` only if it carries `expected`, otherwise classify it.
pub(crate) fn check_status(
    response: &HttpResponse,
    expected: u16,
    method: HttpMethod,
    url: &str,
) -> Result<()> {
    if response.status == expected {
        return Ok(());
    }
    Err(classify(response, expected, method, url))
}

fn classify(response: &HttpResponse, expected: u16, method: HttpMethod, url: &str) -> Error {
    let status = response.status;
    let body = error_body(&response.body);
    let context = RequestContext {
        method,
        url: url.to_string(),
    };
    match status {
        400..=499 => Error::ClientRequest {
            status,
            body,
            context,
        },
        500..=599 => Error::Server {
            status,
            body,
            context,
        },
        _ => Error::UnexpectedStatus {
            status,
            expected,
            body,
            context,
        },
    }
}

fn error_body(raw: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())))
}
