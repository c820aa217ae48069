//! Connection to one ADT server.
//!
//! # Design
//! `execute` is split into two pure halves around the transport call:
//! `build_request` turns a path and `Request` options into an `HttpRequest`
//! (URL assembly and header merge), and `check_response` turns the
//! `HttpResponse` back into a result (content negotiation and error
//! classification). Both are deterministic and tested without a network.
//!
//! The HTTP session is opened on the first `execute` and reused afterwards.
//! All methods take `&mut self`, so calls on one connection are strictly
//! sequential.

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::error::{ApiError, Result};
use crate::exception::parse_exception;
use crate::http::{set_header, HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{HttpSession, Transport};

/// Ordered list of acceptable response content types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accept(Vec<String>);

impl Accept {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(candidates.into_iter().map(Into::into).collect())
    }

    pub fn candidates(&self) -> &[String] {
        &self.0
    }

    /// The `Accept` header value: candidates joined with `", "`.
    pub fn header_value(&self) -> String {
        self.0.join(", ")
    }

    /// Whether `content_type` satisfies one of the candidates.
    pub fn matches(&self, content_type: &str) -> bool {
        self.0
            .iter()
            .any(|candidate| media_type_matches(candidate, content_type))
    }
}

impl From<&str> for Accept {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for Accept {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<&str>> for Accept {
    fn from(values: Vec<&str>) -> Self {
        Self::new(values)
    }
}

impl<const N: usize> From<[&str; N]> for Accept {
    fn from(values: [&str; N]) -> Self {
        Self::new(values)
    }
}

/// Case-insensitive prefix match of `actual` against `candidate`. The match
/// has to end at a parameter or at the end of the value, so
/// `application/xml` accepts `application/xml; charset=utf-8` but not
/// `application/xmlfoo`. `*/*` and `type/*` accept any subtype.
fn media_type_matches(candidate: &str, actual: &str) -> bool {
    let candidate = candidate.trim().to_ascii_lowercase();
    let actual = actual.trim().to_ascii_lowercase();

    if candidate.is_empty() {
        return false;
    }
    if candidate == "*/*" {
        return true;
    }
    if let Some(kind) = candidate.strip_suffix("/*") {
        return actual
            .split_once('/')
            .is_some_and(|(actual_kind, _)| actual_kind == kind);
    }

    match actual.strip_prefix(&candidate) {
        Some(rest) => rest.is_empty() || rest.starts_with(';') || rest.starts_with(char::is_whitespace),
        None => false,
    }
}

/// Options of one `execute` call.
///
/// `content_type` and `accept` win over `Content-Type` and `Accept` entries
/// in `headers`; no other header is touched.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub accept: Option<Accept>,
    pub body: Option<String>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn accept(mut self, accept: impl Into<Accept>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A connection to one ADT server.
pub struct Connection {
    config: ConnectionConfig,
    base_url: String,
    query_args: String,
    session: Option<Box<dyn Transport>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("user", &self.config.user)
            .field("base_url", &self.base_url)
            .field("query_args", &self.query_args)
            .field("session_open", &self.session.is_some())
            .finish()
    }
}

impl Connection {
    /// A connection that opens an `HttpSession` on first use.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            base_url: config.base_url(),
            query_args: config.query_args(),
            config,
            session: None,
        }
    }

    /// A connection sending every request through `transport`.
    pub fn with_transport(config: ConnectionConfig, transport: impl Transport + 'static) -> Self {
        let mut connection = Self::new(config);
        connection.session = Some(Box::new(transport));
        connection
    }

    pub fn user(&self) -> &str {
        &self.config.user
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn query_args(&self) -> &str {
        &self.query_args
    }

    /// `<base_url>?<query_args>`
    pub fn uri(&self) -> String {
        format!("{}?{}", self.base_url, self.query_args)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.config.timeout()
    }

    pub fn build_request(&self, method: HttpMethod, path: &str, request: &Request) -> HttpRequest {
        let mut query = url::form_urlencoded::Serializer::new(self.query_args.clone());
        for (name, value) in &request.params {
            query.append_pair(name, value);
        }
        let url = format!(
            "{}/{}?{}",
            self.base_url,
            path.trim_start_matches('/'),
            query.finish()
        );

        let mut headers = request.headers.clone();
        if let Some(content_type) = &request.content_type {
            set_header(&mut headers, "Content-Type", content_type.clone());
        }
        if let Some(accept) = &request.accept {
            set_header(&mut headers, "Accept", accept.header_value());
        }

        HttpRequest {
            method,
            url,
            headers,
            body: request.body.clone(),
        }
    }

    /// Classify a response: non-2xx becomes `Adt` or `HttpRequest`, and a
    /// 2xx whose content type was not requested becomes
    /// `UnexpectedResponseContent`.
    pub fn check_response(&self, request: &Request, response: HttpResponse) -> Result<HttpResponse> {
        let content_type = response.content_type().unwrap_or_default();

        if !response.is_success() {
            let payload = if is_xml(content_type) {
                parse_exception(&response.body)
            } else {
                None
            };
            let err = match payload {
                Some(payload) => ApiError::Adt {
                    namespace: payload.namespace.id,
                    type_id: payload.exception_type.id,
                    message: payload.message,
                },
                None => ApiError::HttpRequest {
                    status: response.status,
                    body: response.body,
                },
            };
            return Err(err);
        }

        if let Some(accept) = &request.accept {
            if !accept.matches(content_type) {
                return Err(ApiError::UnexpectedResponseContent {
                    content_type: content_type.to_string(),
                    body: response.body,
                });
            }
        }

        Ok(response)
    }

    /// Send `method path` with `request` and classify the response.
    pub fn execute(&mut self, method: HttpMethod, path: &str, request: &Request) -> Result<HttpResponse> {
        let http_request = self.build_request(method, path, request);
        debug!(%method, url = %http_request.url, "request");

        let session = match &mut self.session {
            Some(session) => session,
            None => self.session.insert(Box::new(HttpSession::open(
                &self.base_url,
                &self.query_args,
                &self.config.user,
                &self.config.password,
                self.config.timeout(),
            )?)),
        };
        let response = session.send(&http_request)?;
        debug!(
            status = response.status,
            content_type = response.content_type().unwrap_or_default(),
            "response"
        );

        self.check_response(request, response).inspect_err(|err| {
            warn!(%method, url = %http_request.url, error = %err, "request failed");
        })
    }
}

fn is_xml(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.ends_with("/xml") || essence.ends_with("+xml")
}
