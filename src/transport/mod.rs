//! Delivery of vendor-shaped requests.
//!
//! Platforms never talk to the network directly. They build an [`OutboundRequest`] in the
//! shape their vendor's ingestion API expects and hand it to a [`Transport`]. The default
//! [`HttpTransport`] performs a blocking HTTP call; tests swap in a recording transport.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;

use crate::analytics::error::{internal_error, network_error, AnalyticsResult};

/// Payload of an outbound request.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A `POST` bound for a vendor ingestion endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundRequest {
    pub platform: String,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl OutboundRequest {
    pub fn post(platform: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn with_form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(fields);
        self
    }

    /// The JSON body, if this request carries one.
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            RequestBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// Sink that delivers requests to a vendor.
pub trait Transport: Send + Sync {
    fn send(&self, request: &OutboundRequest) -> AnalyticsResult<()>;
}

/// Blocking HTTP transport backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> AnalyticsResult<Self> {
        Self::with_timeout(Duration::from_secs(10))
    }

    pub fn with_timeout(timeout: Duration) -> AnalyticsResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| internal_error(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &OutboundRequest) -> AnalyticsResult<()> {
        let mut builder = self.client.post(&request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form(fields) => builder.form(fields),
        };

        let response = builder.send().map_err(|err| {
            network_error(format!(
                "failed to send {} request to {}: {err}",
                request.platform, request.url
            ))
        })?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response
            .text()
            .unwrap_or_else(|_| "<unavailable response body>".to_string());

        let message = match status {
            StatusCode::BAD_REQUEST => format!(
                "{} rejected the request (400). Response: {body}",
                request.platform
            ),
            _ => format!(
                "{} request failed with status {status}. Response: {body}",
                request.platform
            ),
        };

        Err(network_error(message))
    }
}
