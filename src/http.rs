//! HTTP seam used by login, setup resolution and room actions.
//!
//! The client only needs three things from HTTP: send a GET or a form POST
//! with headers, read the body as text, and learn the final URL after
//! redirects. [`HttpClient`] captures that; [`ReqwestClient`] is the
//! production implementation.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::RobinError;

/// Request method. Only the two the chat API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Form fields, sent `application/x-www-form-urlencoded` on POST.
    pub form: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            form: Vec::new(),
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(url)
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.form.push((name.to_string(), value.into()));
        self
    }

    /// Look up a header value by case-insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Look up a form field value.
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A completed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// URL the response was served from after following redirects.
    pub final_url: String,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into [`RobinError::Status`].
    pub fn error_for_status(self) -> Result<Self, RobinError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RobinError::Status {
                status: self.status,
                url: self.final_url,
            })
        }
    }

    /// Path component of [`HttpResponse::final_url`], if it parses.
    pub fn final_path(&self) -> Option<String> {
        reqwest::Url::parse(&self.final_url)
            .ok()
            .map(|u| u.path().to_string())
    }
}

/// Minimal HTTP client contract.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform `request`, following redirects. Any response, whatever its
    /// status, is `Ok`; only failures to get a response are errors.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, RobinError>;
}

/// [`HttpClient`] backed by `reqwest`.
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(user_agent: &str) -> Result<Self, RobinError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| RobinError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, RobinError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url).form(&request.form),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| RobinError::transport(&request.url, e))?;
        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let body = resp
            .text()
            .await
            .map_err(|e| RobinError::transport(&final_url, e))?;

        Ok(HttpResponse {
            status,
            final_url,
            body,
        })
    }
}
