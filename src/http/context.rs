//! Per-request context.
//!
//! # Responsibilities
//! - Expose the request (method, decoded path, query, params, headers, body,
//!   protocol, host and origin)
//! - Hold the response being built (status, headers, body slot)
//! - Carry request-scoped capabilities: plugins, the template renderer
//! - Flush the response exactly once
//!
//! # Design Decisions
//! - Created fresh per request and owned by exactly one in-flight request
//! - The request body is buffered by the transport before dispatch
//! - A second flush is a silent no-op so handlers may respond directly
//!   (redirects) without tripping the request cycle
//! - Path decoding keeps escaped reserved characters (`%2F`, `%3F`, ...)
//!   encoded, so an escaped slash never splits a path segment

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::HttpError;
use crate::http::request::X_REQUEST_ID;
use crate::http::response::{Outgoing, ResponseBody, HTML_CONTENT_TYPE};
use crate::routing::Params;
use crate::template::Renderer;

/// Names a plugin may not take because the context already uses them.
pub const RESERVED_NAMES: &[&str] = &[
    "method", "uri", "path", "query", "params", "headers", "body", "status", "cookies",
    "request", "response", "error", "view", "render", "send", "redirect", "throw",
    "protocol", "host", "hostname", "origin",
];

/// Characters whose escapes survive path decoding.
const RESERVED_ESCAPES: &[u8] = b";/?:@&=+$,#";

/// Percent-decode a path, leaving escapes of reserved characters intact.
fn decode_path(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = (bytes[i + 1] as char).to_digit(16).zip((bytes[i + 2] as char).to_digit(16));
            if let Some((hi, lo)) = hex {
                let value = (hi * 16 + lo) as u8;
                if RESERVED_ESCAPES.contains(&value) {
                    decoded.extend(percent_decode(&bytes[start..i]));
                    decoded.extend_from_slice(&bytes[i..i + 3]);
                    i += 3;
                    start = i;
                    continue;
                }
            }
        }
        i += 1;
    }
    decoded.extend(percent_decode(&bytes[start..]));
    String::from_utf8_lossy(&decoded).into_owned()
}

/// Attributes for `Context::set_cookie`.
#[derive(Debug, Clone, Default)]
pub struct CookieOptions {
    pub domain: Option<String>,
    pub path: Option<String>,
    pub max_age: Option<i64>,
    pub http_only: bool,
}

type Capability = Arc<dyn Any + Send + Sync>;

pub struct Context {
    method: Method,
    uri: Uri,
    path: String,
    query: HashMap<String, String>,
    params: Params,
    headers: HeaderMap,
    request_body: Bytes,

    status: Option<StatusCode>,
    response_headers: HeaderMap,
    body: ResponseBody,
    sent: Option<Outgoing>,

    plugins: HashMap<String, Capability>,
    renderer: Option<Arc<dyn Renderer>>,
    error: Option<HttpError>,
}

impl Context {
    pub fn new(method: Method, uri: Uri) -> Self {
        let path = decode_path(uri.path());
        let query = uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        Self {
            method,
            uri,
            path,
            query,
            params: Params::new(),
            headers: HeaderMap::new(),
            request_body: Bytes::new(),
            status: None,
            response_headers: HeaderMap::new(),
            body: ResponseBody::Empty,
            sent: None,
            plugins: HashMap::new(),
            renderer: None,
            error: None,
        }
    }

    /// Build from transport request parts and the buffered body.
    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        let mut ctx = Self::new(parts.method, parts.uri);
        ctx.headers = parts.headers;
        ctx.request_body = body;
        ctx
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.request_body = body.into();
        self
    }

    // --- request ---

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Percent-decoded request path. Escaped reserved characters stay
    /// encoded: `/a%2Fb` reads as `/a%2Fb`, `/caf%C3%A9` as `/café`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Merge `params` into the bound parameters.
    pub fn set_params(&mut self, params: Params) {
        for (name, value) in params {
            self.params.insert(name, value);
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A request header as text; `None` when missing or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `https` or `http`. A proxy's `X-Forwarded-Proto` wins over the
    /// request URI; only its first entry counts.
    pub fn protocol(&self) -> &str {
        if let Some(forwarded) = self.header("x-forwarded-proto") {
            let first = forwarded.split(',').next().unwrap_or_default().trim();
            if !first.is_empty() {
                return first;
            }
        }
        self.uri.scheme_str().unwrap_or("http")
    }

    /// `Host` header, falling back to the URI authority.
    pub fn host(&self) -> Option<&str> {
        self.header(header::HOST.as_str())
            .or_else(|| self.uri.authority().map(|a| a.as_str()))
    }

    /// The host without its port.
    pub fn hostname(&self) -> Option<String> {
        self.base_url()?.host_str().map(str::to_string)
    }

    /// `protocol://host[:port]`, default ports omitted.
    pub fn origin(&self) -> Option<String> {
        Some(self.base_url()?.origin().ascii_serialization())
    }

    fn base_url(&self) -> Option<Url> {
        Url::parse(&format!("{}://{}", self.protocol(), self.host()?)).ok()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.header(X_REQUEST_ID)
    }

    pub fn cookies(&self) -> HashMap<String, String> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.request_body
    }

    pub fn text(&self) -> Result<String, HttpError> {
        String::from_utf8(self.request_body.to_vec())
            .map_err(|_| HttpError::bad_request("Request body is not valid UTF-8"))
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        Ok(serde_json::from_slice(&self.request_body)?)
    }

    // --- response ---

    /// Response status; unset or outside 200..=511 reads as 200.
    pub fn status(&self) -> StatusCode {
        match self.status {
            Some(status) if (200..=511).contains(&status.as_u16()) => status,
            _ => StatusCode::OK,
        }
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), HttpError> {
        let name = HeaderName::try_from(name)
            .map_err(|_| HttpError::internal(format!("Invalid header name: {name}")))?;
        let value = HeaderValue::try_from(value)
            .map_err(|_| HttpError::internal(format!("Invalid value for header {name}")))?;
        self.response_headers.insert(name, value);
        Ok(())
    }

    /// Append a `Set-Cookie` header. `None` deletes the cookie.
    pub fn set_cookie(
        &mut self,
        name: &str,
        value: Option<&str>,
        options: &CookieOptions,
    ) -> Result<(), HttpError> {
        let mut parts = vec![format!("{name}={}", value.unwrap_or_default())];
        if let Some(domain) = &options.domain {
            parts.push(format!("Domain={domain}"));
        }
        if let Some(path) = &options.path {
            parts.push(format!("Path={path}"));
        }
        match (value, options.max_age) {
            (None, _) => parts.push("Max-Age=0".to_string()),
            (Some(_), Some(age)) => parts.push(format!("Max-Age={age}")),
            (Some(_), None) => {}
        }
        if options.http_only {
            parts.push("HttpOnly".to_string());
        }

        let cookie = HeaderValue::try_from(parts.join("; "))
            .map_err(|_| HttpError::internal(format!("Invalid cookie: {name}")))?;
        self.response_headers.append(header::SET_COOKIE, cookie);
        Ok(())
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<ResponseBody>) {
        self.body = body.into();
    }

    /// Respond with a redirect right away; later flushes are no-ops.
    pub fn redirect(&mut self, location: &str, status: StatusCode) -> Result<(), HttpError> {
        let location = HeaderValue::try_from(location)
            .map_err(|_| HttpError::internal(format!("Invalid redirect location: {location}")))?;
        if self.sent.is_none() {
            let mut headers = std::mem::take(&mut self.response_headers);
            headers.insert(header::LOCATION, location);
            self.sent = Some(Outgoing::new(status, headers, ResponseBody::Empty));
        }
        Ok(())
    }

    /// Freeze status, headers and body into the outgoing response.
    ///
    /// Returns `false` when the response had already been flushed.
    pub fn flush(&mut self) -> bool {
        if self.sent.is_some() {
            return false;
        }
        let headers = std::mem::take(&mut self.response_headers);
        let body = std::mem::take(&mut self.body);
        self.sent = Some(Outgoing::new(self.status(), headers, body));
        true
    }

    /// Set the body and flush.
    pub fn send(&mut self, body: impl Into<ResponseBody>) -> bool {
        if self.sent.is_some() {
            return false;
        }
        self.body = body.into();
        self.flush()
    }

    pub fn is_sent(&self) -> bool {
        self.sent.is_some()
    }

    pub fn outgoing(&self) -> Option<&Outgoing> {
        self.sent.as_ref()
    }

    pub fn into_response(mut self) -> Response {
        self.flush();
        match self.sent {
            Some(outgoing) => outgoing.into_response(),
            None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }

    // --- capabilities ---

    /// A plugin declared on the app, downcast to its concrete type.
    pub fn plugin<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.plugins.get(name).cloned()?.downcast::<T>().ok()
    }

    /// Attach a plugin. Fails if `name` collides with a context member or
    /// an already attached plugin.
    pub fn inject_plugin(&mut self, name: &str, capability: Capability) -> Result<(), HttpError> {
        if RESERVED_NAMES.contains(&name) || self.plugins.contains_key(name) {
            return Err(HttpError::internal(format!(
                "The plugin name \"{name}\" is reserved"
            )));
        }
        self.plugins.insert(name.to_string(), capability);
        Ok(())
    }

    pub(crate) fn set_renderer(&mut self, renderer: Arc<dyn Renderer>) {
        self.renderer = Some(renderer);
    }

    /// Render `template` with `data` and mark the response as HTML.
    pub fn view(&mut self, template: &str, data: &Value) -> Result<String, HttpError> {
        let renderer = self
            .renderer
            .clone()
            .ok_or_else(|| HttpError::internal("No template renderer configured"))?;
        let html = renderer.render(template, data)?;
        self.response_headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(HTML_CONTENT_TYPE),
        );
        Ok(html)
    }

    /// The error that aborted the request, visible to the error handler.
    pub fn error(&self) -> Option<&HttpError> {
        self.error.as_ref()
    }

    pub(crate) fn set_error(&mut self, error: HttpError) {
        self.error = Some(error);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("status", &self.status)
            .field("sent", &self.sent.is_some())
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
