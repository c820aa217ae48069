//! The I/O half of a `Connection`.
//!
//! # Design
//! `Connection` only ever builds `HttpRequest` values and interprets
//! `HttpResponse` values; sending one is the job of a `Transport`. The
//! default implementation, `HttpSession`, wraps a `ureq` agent that keeps
//! cookies (ADT ties stateful sessions and locks to them) and the CSRF token
//! fetched when the session is opened. Tests swap in a scripted transport.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, warn};

use crate::error::{ApiError, Result};
use crate::http::{set_header, HttpMethod, HttpRequest, HttpResponse};

const CSRF_HEADER: &str = "x-csrf-token";

/// Sends one HTTP request and returns the response, whatever its status.
///
/// Only failures that produce no response at all are errors here.
pub trait Transport {
    fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// An authenticated HTTP session against one ADT server.
pub struct HttpSession {
    agent: ureq::Agent,
    authorization: String,
    csrf_token: Option<String>,
}

impl std::fmt::Debug for HttpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSession")
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}

impl HttpSession {
    /// Create the agent and fetch a CSRF token from the discovery service.
    pub fn open(
        base_url: &str,
        query_args: &str,
        user: &str,
        password: &str,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        let authorization = format!("Basic {}", STANDARD.encode(format!("{user}:{password}")));

        let mut session = Self {
            agent,
            authorization,
            csrf_token: None,
        };

        let discovery = HttpRequest {
            method: HttpMethod::Get,
            url: format!("{base_url}/core/discovery?{query_args}"),
            headers: vec![(CSRF_HEADER.to_string(), "Fetch".to_string())],
            body: None,
        };
        let response = session.send(&discovery)?;
        if !response.is_success() {
            return Err(ApiError::HttpRequest {
                status: response.status,
                body: response.body,
            });
        }

        session.csrf_token = response.header(CSRF_HEADER).map(str::to_string);
        match session.csrf_token {
            Some(_) => debug!(user, "session opened"),
            None => warn!(user, "server did not issue a CSRF token"),
        }
        Ok(session)
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl HttpSession {
    /// Request headers plus the session's credentials, which replace any
    /// caller-supplied value of the same name.
    fn outgoing_headers(&self, request: &HttpRequest) -> Vec<(String, String)> {
        let mut headers = request.headers.clone();
        set_header(&mut headers, "Authorization", self.authorization.clone());
        if let Some(token) = &self.csrf_token {
            set_header(&mut headers, CSRF_HEADER, token.clone());
        }
        headers
    }
}

impl Transport for HttpSession {
    fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse> {
        let headers = self.outgoing_headers(request);

        let url = request.url.as_str();
        let body = request.body.as_deref().unwrap_or_default().as_bytes();
        let sent = match request.method {
            HttpMethod::Get => with_headers(self.agent.get(url), &headers).call(),
            HttpMethod::Delete => with_headers(self.agent.delete(url), &headers).call(),
            HttpMethod::Post => with_headers(self.agent.post(url), &headers).send(body),
            HttpMethod::Put => with_headers(self.agent.put(url), &headers).send(body),
        };
        let mut response = sent.map_err(|err| ApiError::Transport(err.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|err| ApiError::Transport(err.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
