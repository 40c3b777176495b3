//! Request descriptions handed to [`ApiClient::invoke`](super::ApiClient::invoke)

use std::path::Path;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;

use super::errors::ApiError;
use crate::http::TransportError;

/// One logical API call: method, endpoint path, extra headers and body.
///
/// An invocation is replayed as-is for every transport attempt and for the
/// single retry after a session refresh, so it owns everything it needs.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/reservations`
    pub endpoint: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

/// Body of an [`Invocation`]
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    /// Single-field multipart form; the transport picks the boundary.
    Multipart { field_name: String, file: UploadFile },
}

/// File content buffered in memory for multipart upload
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { file_name: file_name.into(), mime_type: None, bytes: bytes.into() }
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Read a file from disk, naming the part after the file.
    ///
    /// # Errors
    /// Returns `ApiError::Request` if the file cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ApiError::Request(format!("Failed to read upload '{}': {}", path.display(), e))
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(file_name, bytes))
    }

    fn to_part(&self) -> Result<Part, TransportError> {
        let part = Part::bytes(self.bytes.clone()).file_name(self.file_name.clone());
        match &self.mime_type {
            Some(mime) => part
                .mime_str(mime)
                .map_err(|e| TransportError::Request(format!("Invalid MIME type '{}': {}", mime, e))),
            None => Ok(part),
        }
    }
}

impl Invocation {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self { method, endpoint: endpoint.into(), headers: HeaderMap::new(), body: RequestBody::Empty }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PUT, endpoint)
    }

    pub fn patch(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PATCH, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    /// Serialize `body` as the JSON payload.
    ///
    /// # Errors
    /// Returns `ApiError::Request` if `body` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::Request(format!("Failed to serialize body: {}", e)))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    #[must_use]
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Attach a multipart form with `file` under `field_name`.
    #[must_use]
    pub fn multipart(self, field_name: impl Into<String>, file: UploadFile) -> Self {
        self.body(RequestBody::Multipart { field_name: field_name.into(), file })
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Apply headers and body to `builder`.
    ///
    /// `Authorization` is owned by the session, so any caller-supplied value
    /// is dropped here.
    pub(crate) fn apply(&self, builder: RequestBuilder) -> Result<RequestBuilder, TransportError> {
        let mut headers = self.headers.clone();
        headers.remove(AUTHORIZATION);
        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        }
        let builder = builder.headers(headers);

        match &self.body {
            RequestBody::Empty => Ok(builder),
            RequestBody::Json(value) => Ok(builder.json(value)),
            RequestBody::Multipart { field_name, file } => {
                let form = Form::new().part(field_name.clone(), file.to_part()?);
                Ok(builder.multipart(form))
            }
        }
    }
}
