// Transport layer: the only place that performs network I/O.
//
// Operations talk to the server through the `Transport` trait so they can be
// driven by an in-memory transport in tests. `HttpsTransport` is the real
// implementation: a blocking reqwest client that trusts a single CA
// certificate loaded from a PEM file.

use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Certificate;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to read trust anchor {}", .path.display())]
    TrustAnchorRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("trust anchor {} is not a PEM certificate", .path.display())]
    TrustAnchorParse {
        path: PathBuf,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTPS client")]
    Build(#[source] reqwest::Error),

    #[error("invalid request url `{url}`")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("token cannot be sent as a header value")]
    InvalidToken,

    #[error("no response from server")]
    Send(#[source] reqwest::Error),

    #[error("failed to read response body")]
    Read(#[source] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single request as seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub query: Vec<(&'static str, String)>,
    pub body: Option<String>,
    /// Sent verbatim in the `authorization` header when present.
    pub token: Option<String>,
}

impl Request {
    pub fn get(url: &str) -> Self {
        Request {
            method: Method::Get,
            url: url.to_string(),
            query: Vec::new(),
            body: None,
            token: None,
        }
    }

    pub fn post(url: &str, body: String) -> Self {
        Request {
            method: Method::Post,
            url: url.to_string(),
            query: Vec::new(),
            body: Some(body),
            token: None,
        }
    }

    pub fn param(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    pub fn authorized(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }
}

/// Status code and raw body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

pub trait Transport {
    fn send(&self, request: &Request) -> Result<Response, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        (**self).send(request)
    }
}

/// Blocking HTTPS transport backed by reqwest.
#[derive(Clone)]
pub struct HttpsTransport {
    client: Client,
}

impl HttpsTransport {
    /// Build a client that verifies the server against the CA certificate
    /// stored in `trust_anchor` (PEM).
    pub fn new(trust_anchor: &Path) -> Result<Self, TransportError> {
        let pem = std::fs::read(trust_anchor).map_err(|source| TransportError::TrustAnchorRead {
            path: trust_anchor.to_path_buf(),
            source,
        })?;
        let certificate =
            Certificate::from_pem(&pem).map_err(|source| TransportError::TrustAnchorParse {
                path: trust_anchor.to_path_buf(),
                source,
            })?;
        let client = Client::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(TransportError::Build)?;
        Ok(HttpsTransport { client })
    }

    /// Wrap an already configured client.
    pub fn with_client(client: Client) -> Self {
        HttpsTransport { client }
    }
}

impl Transport for HttpsTransport {
    fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let url = if request.query.is_empty() {
            Url::parse(&request.url)
        } else {
            Url::parse_with_params(&request.url, &request.query)
        }
        .map_err(|source| TransportError::InvalidUrl {
            url: request.url.clone(),
            source,
        })?;

        let mut builder = match request.method {
            Method::Get => self.client.get(url.clone()),
            Method::Post => self.client.post(url.clone()),
        };
        if let Some(token) = &request.token {
            let value = HeaderValue::from_str(token).map_err(|_| TransportError::InvalidToken)?;
            builder = builder.header(AUTHORIZATION, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        debug!(method = ?request.method, %url, "sending request");
        let res = builder.send().map_err(TransportError::Send)?;
        let status = res.status().as_u16();
        let body = res.bytes().map_err(TransportError::Read)?.to_vec();
        debug!(status, bytes = body.len(), "response received");

        Ok(Response { status, body })
    }
}
