//! Response values and the flushed response.
//!
//! # Responsibilities
//! - Represent what a handler returns (text, bytes, JSON, a stream, nothing)
//! - Turn the context's status, headers and body into the wire response
//!
//! # Design Decisions
//! - 204 and 304 never carry a body
//! - JSON bodies set their own `Content-Type`; text, bytes and streams
//!   leave it to the handler
//! - Streams are passed through chunk by chunk, never buffered

use std::fmt;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::BoxError;
use futures_util::TryStream;
use serde_json::Value;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// The body slot of a response.
#[derive(Default)]
pub enum ResponseBody {
    #[default]
    Empty,
    Text(String),
    Bytes(Bytes),
    Json(Value),
    /// Written to the client as it is produced.
    Stream(Body),
}

impl ResponseBody {
    /// Stream `chunks` to the client.
    pub fn stream<S>(chunks: S) -> Self
    where
        S: TryStream + Send + 'static,
        S::Ok: Into<Bytes>,
        S::Error: Into<BoxError>,
    {
        Self::Stream(Body::from_stream(chunks))
    }

    pub fn json(value: impl serde::Serialize) -> Result<Self, crate::HttpError> {
        Ok(Self::Json(serde_json::to_value(value).map_err(|err| {
            crate::HttpError::internal(format!("Failed to serialize response: {err}"))
        })?))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.is_empty(),
            Self::Bytes(bytes) => bytes.is_empty(),
            Self::Json(_) | Self::Stream(_) => false,
        }
    }

    /// The body as template data.
    pub fn into_value(self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::Text(text) => Value::String(text),
            Self::Bytes(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
            Self::Json(value) => value,
            Self::Stream(_) => Value::Null,
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(bytes).finish(),
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Streams never compare equal; they can only be consumed.
impl PartialEq for ResponseBody {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Json(a), Self::Json(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for ResponseBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for ResponseBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Value> for ResponseBody {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<()> for ResponseBody {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

/// A response that has been flushed and can no longer change.
pub struct Outgoing {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    stream: Option<Body>,
}

impl Outgoing {
    pub fn new(status: StatusCode, mut headers: HeaderMap, body: ResponseBody) -> Self {
        let mut stream = None;
        let body = if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
            Bytes::new()
        } else {
            match body {
                ResponseBody::Empty => Bytes::new(),
                ResponseBody::Text(text) => Bytes::from(text),
                ResponseBody::Bytes(bytes) => bytes,
                ResponseBody::Json(value) => {
                    headers.insert(
                        header::CONTENT_TYPE,
                        HeaderValue::from_static(JSON_CONTENT_TYPE),
                    );
                    Bytes::from(value.to_string())
                }
                ResponseBody::Stream(body) => {
                    stream = Some(body);
                    Bytes::new()
                }
            }
        };
        Self {
            status,
            headers,
            body,
            stream,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The buffered body; empty when the response is streamed.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }
}

impl fmt::Debug for Outgoing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outgoing")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("streaming", &self.is_streaming())
            .finish()
    }
}

impl IntoResponse for Outgoing {
    fn into_response(self) -> Response {
        let body = match self.stream {
            Some(stream) => stream,
            None => Body::from(self.body),
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
