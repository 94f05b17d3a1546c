//! Web utils
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::{str::FromStr, time::Duration};
use url::form_urlencoded;

use crate::{ApiError, Result};

#[derive(Clone, Debug)]
pub enum WebAuth {
    Bearer(String),
    /// Arbitrary header, e.g. connector api key or a raw `Authorization` value.
    Header { name: String, value: String },
}

/// Convenient wrapper for the [`reqwest::Client`] with builder.
#[derive(Clone, Debug)]
pub struct WebClient {
    base_url: String,
    inner: reqwest::Client,
}

pub struct WebRequest {
    inner: RequestBuilder,
    url: String,
}

impl WebClient {
    pub fn builder() -> WebClientBuilder {
        WebClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute urls are used as they are, other paths are appended to the base url.
    fn url(&self, path: &str) -> Result<String> {
        let url = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.is_empty() {
            self.base_url.clone()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        };
        url::Url::parse(&url)?;
        Ok(url)
    }

    pub fn request(&self, method: Method, path: &str) -> Result<WebRequest> {
        let url = self.url(path)?;
        log::debug!("doing {} on {}", method, url);
        Ok(WebRequest {
            inner: self.inner.request(method, url.as_str()),
            url,
        })
    }

    pub fn get(&self, path: &str) -> Result<WebRequest> {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> Result<WebRequest> {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> Result<WebRequest> {
        self.request(Method::PUT, path)
    }

    pub fn delete(&self, path: &str) -> Result<WebRequest> {
        self.request(Method::DELETE, path)
    }
}

impl WebRequest {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn send_json<T: Serialize + ?Sized>(self, value: &T) -> WebRequest {
        WebRequest {
            inner: self.inner.json(value),
            url: self.url,
        }
    }

    pub fn header(self, name: &str, value: &str) -> WebRequest {
        WebRequest {
            inner: self.inner.header(name, value),
            url: self.url,
        }
    }

    /// Sends request and turns every non 2xx response into an error
    /// carrying the remote body.
    pub async fn send(self) -> Result<Response> {
        let url = self.url;
        let response = self
            .inner
            .send()
            .await
            .map_err(|e| ApiError::transport(&url, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        log::debug!("{} responded with {}: {}", url, status, body);
        Err(ApiError::from_status(status.as_u16(), &url, body))
    }

    pub async fn body(self) -> Result<String> {
        let url = self.url.clone();
        self.send()
            .await?
            .text()
            .await
            .map_err(|e| ApiError::transport(&url, e))
    }

    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let url = self.url.clone();
        let body = self.body().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            url,
            msg: e.to_string(),
        })
    }

    /// Same as [`json`](Self::json), but 404 means no value.
    pub async fn optional_json<T: DeserializeOwned>(self) -> Result<Option<T>> {
        match self.json().await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct WebClientBuilder {
    base_url: Option<String>,
    api_root: Option<String>,
    auth: Option<WebAuth>,
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl WebClientBuilder {
    pub fn auth(mut self, auth: WebAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn base_url<T: Into<String>>(mut self, base_url: T) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn api_root<T: Into<String>>(mut self, api_root: T) -> Self {
        self.api_root = Some(api_root.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn build(self) -> Result<WebClient> {
        let mut headers = self.headers;
        match &self.auth {
            Some(WebAuth::Bearer(token)) => {
                let (_, value) = parse_header(AUTHORIZATION.as_str(), &format!("Bearer {}", token))?;
                headers.insert(AUTHORIZATION, value);
            }
            Some(WebAuth::Header { name, value }) => {
                let (name, value) = parse_header(name, value)?;
                headers.insert(name, value);
            }
            None => {}
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let base_url = format!(
            "{}{}",
            self.base_url.unwrap_or_default().trim_end_matches('/'),
            self.api_root.unwrap_or_default()
        );
        Ok(WebClient {
            base_url,
            inner: builder.build().map_err(|e| ApiError::Transport {
                url: String::new(),
                msg: e.to_string(),
            })?,
        })
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_str(name).map_err(|e| ApiError::InvalidHeader(e.to_string()))?;
    let value = HeaderValue::from_str(value).map_err(|e| ApiError::InvalidHeader(e.to_string()))?;
    Ok((name, value))
}

/// Builder for the query part of the URLs.
pub struct QueryParamsBuilder<'a> {
    serializer: form_urlencoded::Serializer<'a, String>,
}

impl<'a> Default for QueryParamsBuilder<'a> {
    fn default() -> Self {
        QueryParamsBuilder::new()
    }
}

impl<'a> QueryParamsBuilder<'a> {
    pub fn new() -> Self {
        let serializer = form_urlencoded::Serializer::new(String::new());
        QueryParamsBuilder { serializer }
    }

    /// Parameters without value are skipped.
    pub fn put<N: ToString, V: ToString>(mut self, name: N, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.serializer
                .append_pair(name.to_string().as_str(), value.to_string().as_str());
        }
        self
    }

    pub fn build(mut self) -> String {
        self.serializer.finish()
    }
}

/// Appends query to the path, if there is any.
pub fn with_query(path: &str, query: String) -> String {
    if query.is_empty() {
        path.to_string()
    } else if path.contains('?') {
        format!("{}&{}", path, query)
    } else {
        format!("{}?{}", path, query)
    }
}
