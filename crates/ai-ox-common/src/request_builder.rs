use crate::error::{self, CommonRequestError};
use reqwest::{Method, RequestBuilder as ReqwestRequestBuilder, Response};
use serde::Serialize;
use std::collections::HashMap;

/// One upstream call target: path, method, and the headers and query string
/// that change per call (signatures, request ids)
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub path: String,
    pub method: Method,
    pub headers: HashMap<String, String>,
    pub query: Vec<(String, String)>,
}

impl Endpoint {
    pub fn new(path: impl Into<String>, method: Method) -> Self {
        Self {
            path: path.into(),
            method,
            headers: HashMap::new(),
            query: Vec::new(),
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(path, Method::POST)
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    #[must_use]
    pub fn with_query(mut self, params: Vec<(String, String)>) -> Self {
        self.query.extend(params);
        self
    }
}

/// Settings shared by every call to one upstream
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub base_url: String,
    pub default_headers: HashMap<String, String>,
}

impl RequestConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            default_headers: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }
}

/// Thin request builder over a shared `reqwest::Client`
pub struct RequestBuilder {
    /// Shared connection pool
    client: reqwest::Client,
    /// Base URL and default headers
    config: RequestConfig,
}

impl RequestBuilder {
    pub fn new(client: reqwest::Client, config: RequestConfig) -> Self {
        Self { client, config }
    }

    /// Full URL for an endpoint, joined without doubled slashes
    #[must_use]
    pub fn url(&self, endpoint: &Endpoint) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.path.trim_start_matches('/')
        )
    }

    /// An endpoint header replaces a default header of the same name,
    /// compared case-insensitively.
    pub fn build_request(&self, endpoint: &Endpoint) -> ReqwestRequestBuilder {
        let mut req = self
            .client
            .request(endpoint.method.clone(), self.url(endpoint));

        if !endpoint.query.is_empty() {
            req = req.query(&endpoint.query);
        }

        let defaults = self.config.default_headers.iter().filter(|(key, _)| {
            !endpoint
                .headers
                .keys()
                .any(|name| name.eq_ignore_ascii_case(key))
        });
        for (key, value) in defaults.chain(&endpoint.headers) {
            req = req.header(key, value);
        }

        req
    }

    /// Send a JSON body and hand back the raw response once the status is a success.
    ///
    /// The body is not read, so callers can consume it as a stream.
    pub async fn send_json<B: Serialize + ?Sized>(
        &self,
        endpoint: &Endpoint,
        body: &B,
    ) -> Result<Response, CommonRequestError> {
        let res = self.build_request(endpoint).json(body).send().await?;
        let status = res.status();

        if status.is_success() {
            return Ok(res);
        }

        let bytes = res.bytes().await?;
        Err(error::parse_error_response(status, &bytes))
    }
}
