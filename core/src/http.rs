//! HTTP transport for the request lifecycle.
//!
//! # Design
//! Requests and responses are plain data, as in the host-does-IO pattern: the
//! lifecycle builds an `HttpRequest` and classifies an `HttpResponse` without
//! caring who moved the bytes. [`Transport`] is the seam where the exchange
//! happens; [`UreqTransport`] is the blocking implementation used by
//! `Request::execute`.
//!
//! Transport options are an immutable value passed into every call rather
//! than process-wide state.

use std::io::Read;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{TransportError, TransportErrorKind, UspsError};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Fixed transport settings for a call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub follow_redirects: bool,
    pub max_redirects: u32,
    pub user_agent: String,
    pub secure_port: u16,
    pub plain_port: u16,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            timeout: Duration::from_secs(60),
            follow_redirects: true,
            max_redirects: 10,
            user_agent: "usps-rs".to_string(),
            secure_port: 443,
            plain_port: 80,
        }
    }
}

impl TransportOptions {
    /// Port the request will use: the URL's explicit port, otherwise the
    /// secure port for `https` and the plain port for anything else.
    pub fn port_for(&self, url: &Url) -> u16 {
        url.port().unwrap_or(if url.scheme() == "https" {
            self.secure_port
        } else {
            self.plain_port
        })
    }
}

/// A form POST described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub port: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpRequest {
    /// Build a form-encoded POST to `endpoint`.
    pub fn form_post(
        endpoint: &str,
        fields: &[(&str, &str)],
        options: &TransportOptions,
    ) -> Result<Self, UspsError> {
        let url = parse_endpoint(endpoint)?;
        Ok(Self {
            port: options.port_for(&url),
            url: url.into(),
            headers: vec![
                ("content-type".to_string(), FORM_CONTENT_TYPE.to_string()),
                ("user-agent".to_string(), options.user_agent.clone()),
            ],
            body: form_encode(fields),
        })
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// What one exchange produced: a response, a transport error, or both when
/// the connection failed after the status line arrived.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpExchange {
    pub response: Option<HttpResponse>,
    pub error: Option<TransportError>,
}

impl HttpExchange {
    pub fn completed(response: HttpResponse) -> Self {
        Self {
            response: Some(response),
            error: None,
        }
    }

    pub fn failed(error: TransportError) -> Self {
        Self {
            response: None,
            error: Some(error),
        }
    }

    /// A response whose body was cut short by `error`.
    pub fn partial(response: HttpResponse, error: TransportError) -> Self {
        Self {
            response: Some(response),
            error: Some(error),
        }
    }
}

impl From<Result<HttpResponse, TransportError>> for HttpExchange {
    fn from(result: Result<HttpResponse, TransportError>) -> Self {
        match result {
            Ok(response) => Self::completed(response),
            Err(error) => Self::failed(error),
        }
    }
}

/// Executes one blocking HTTP exchange.
///
/// Non-2xx statuses are responses, not errors. A transport error is
/// reported next to whatever part of the response was received.
pub trait Transport {
    fn send(&self, request: &HttpRequest, options: &TransportOptions) -> HttpExchange;
}

/// Blocking transport backed by a `ureq` agent.
///
/// Without an agent of its own, a fresh one is configured from the options
/// for each call and dropped on return.
#[derive(Clone, Default)]
pub struct UreqTransport {
    agent: Option<ureq::Agent>,
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport")
            .field("shared_agent", &self.agent.is_some())
            .finish()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a caller-supplied agent; its own timeout settings apply.
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent: Some(agent) }
    }

    fn agent_for(options: &TransportOptions) -> ureq::Agent {
        let max_redirects = if options.follow_redirects {
            options.max_redirects
        } else {
            0
        };
        ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(options.connect_timeout))
            .timeout_global(Some(options.timeout))
            .max_redirects(max_redirects)
            .build()
            .new_agent()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest, options: &TransportOptions) -> HttpExchange {
        let agent = match &self.agent {
            Some(agent) => agent.clone(),
            None => Self::agent_for(options),
        };
        debug!(url = %request.url, port = request.port, "posting form");

        let mut builder = agent.post(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let mut response = match builder.send(request.body.as_bytes()) {
            Ok(response) => response,
            Err(err) => return HttpExchange::failed(transport_error(err)),
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        // read_to_end keeps the bytes received before a failure.
        let mut bytes = Vec::new();
        let read = response.body_mut().as_reader().read_to_end(&mut bytes);
        let response = HttpResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        };
        match read {
            Ok(_) => HttpExchange::completed(response),
            Err(err) => {
                debug!(status, received = bytes.len(), error = %err, "body read failed");
                HttpExchange::partial(response, body_error(err))
            }
        }
    }
}

fn transport_error(err: ureq::Error) -> TransportError {
    let kind = match &err {
        ureq::Error::HostNotFound => TransportErrorKind::HostNotFound,
        ureq::Error::ConnectionFailed => TransportErrorKind::ConnectionFailed,
        ureq::Error::Timeout(_) => TransportErrorKind::Timeout,
        ureq::Error::Io(_) => TransportErrorKind::Io,
        _ => TransportErrorKind::Other,
    };
    TransportError::new(kind, err.to_string())
}

/// Body reads surface `ureq` failures wrapped in `io::Error`.
fn body_error(err: std::io::Error) -> TransportError {
    let kind = match err.kind() {
        std::io::ErrorKind::TimedOut => TransportErrorKind::Timeout,
        _ => TransportErrorKind::Io,
    };
    let fallback = err.kind().to_string();
    match err.into_inner().map(|inner| inner.downcast::<ureq::Error>()) {
        Some(Ok(inner)) => transport_error(*inner),
        Some(Err(inner)) => TransportError::new(kind, inner.to_string()),
        None => TransportError::new(kind, fallback),
    }
}

/// Validate an endpoint before any network activity.
pub fn parse_endpoint(endpoint: &str) -> Result<Url, UspsError> {
    let url = Url::parse(endpoint).map_err(|e| UspsError::InvalidEndpoint {
        url: endpoint.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(UspsError::InvalidEndpoint {
            url: endpoint.to_string(),
            reason: format!("unsupported scheme `{other}`"),
        }),
    }
}

/// `application/x-www-form-urlencoded` body for `fields`.
pub fn form_encode(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
