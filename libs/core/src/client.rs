//! Authenticated client for the control API.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};

/// Content type of the form-encoded bodies (unit removal, notifications).
pub(crate) const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Headers that declare a form-encoded body.
pub(crate) fn form_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
    headers
}

/// Request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    /// No body.
    #[default]
    Empty,
    /// Sent verbatim (form-encoded bodies).
    Raw(String),
    /// Serialized to JSON unless it is an empty object or array.
    Json(Value),
}

impl Payload {
    fn into_body(self) -> Result<Option<String>> {
        match self {
            Self::Empty => Ok(None),
            Self::Raw(body) => Ok(Some(body)),
            Self::Json(Value::Object(map)) if map.is_empty() => Ok(None),
            Self::Json(Value::Array(items)) if items.is_empty() => Ok(None),
            Self::Json(Value::Null) => Ok(None),
            Self::Json(value) => Ok(Some(serde_json::to_string(&value)?)),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for Payload {
    fn from(body: String) -> Self {
        Self::Raw(body)
    }
}

/// API client that authenticates every request with the session token.
#[derive(Debug, Clone)]
pub struct ApiClient<T> {
    transport: T,
    base_url: Url,
    token: String,
}

impl<T: Transport> ApiClient<T> {
    /// Create a new client for `base_url`, which must end in `/`.
    pub fn new(transport: T, base_url: Url, token: impl Into<String>) -> Self {
        Self {
            transport,
            base_url,
            token: token.into(),
        }
    }

    /// Resolve an endpoint path against the base URL.
    pub fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::invalid_url(path, e))
    }

    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("bearer {}", self.token)).map_err(|_| {
                Error::InvalidHeader {
                    name: AUTHORIZATION.to_string(),
                }
            })?,
        );
        Ok(headers)
    }

    /// Send one request to an absolute URL.
    ///
    /// Default headers are merged with `headers`; caller headers win.
    pub fn request(
        &self,
        method: Method,
        url: &str,
        payload: Payload,
        headers: HeaderMap,
    ) -> Result<HttpResponse> {
        let url = Url::parse(url).map_err(|e| Error::invalid_url(url, e))?;
        self.send(method, url, payload, headers)
    }

    pub(crate) fn send(
        &self,
        method: Method,
        url: Url,
        payload: Payload,
        headers: HeaderMap,
    ) -> Result<HttpResponse> {
        let mut merged = self.default_headers()?;
        merged.extend(headers);

        let request = HttpRequest {
            method,
            url,
            headers: merged,
            body: payload.into_body()?,
        };

        debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.transport.send(request)?;
        debug!(status = response.status, "received response");

        Ok(response)
    }

    pub(crate) fn get(&self, url: Url) -> Result<HttpResponse> {
        self.send(Method::Get, url, Payload::Empty, HeaderMap::new())
    }

    /// GET and decode a JSON body, rejecting non-2xx responses.
    pub(crate) fn get_json<D: serde::de::DeserializeOwned>(&self, url: Url) -> Result<D> {
        let response = self.get(url.clone())?;
        if !response.is_success() {
            return Err(Error::UnexpectedStatus {
                status: response.status,
                url: url.to_string(),
            });
        }

        Ok(serde_json::from_str(&response.body)?)
    }
}
