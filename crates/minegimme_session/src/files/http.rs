//! HTTP implementation of [`FileBackend`] against the MineGimme REST API.
//!
//! Every route lives under `{api_base}/{server}/files/` and is authorized with
//! the session's bearer token.

use super::backend::FileBackend;
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
struct ReadResponse {
    data: String,
}

/// REST client for one server's files.
#[derive(Debug, Clone)]
pub struct HttpFileBackend {
    client: Client,
    api_base: Url,
    server: String,
    token: String,
}

impl HttpFileBackend {
    /// Creates a backend for `server` rooted at `api_base`
    /// (e.g. `http://127.0.0.1:25401/api/v1/servers`).
    ///
    /// # Errors
    ///
    /// Returns an error when `api_base` is not a usable http(s) URL or the
    /// HTTP client cannot be built.
    pub fn new(
        api_base: &str,
        server: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let api_base = Url::parse(api_base)?;
        if api_base.cannot_be_a_base() {
            return Err(BackendError::Other(format!(
                "API base '{api_base}' cannot carry a path"
            )));
        }
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_base,
            server: server.into(),
            token: token.into(),
        })
    }

    /// Builds `{api_base}/{server}/files/{route}[/{path...}]`.
    ///
    /// Each path segment is percent-encoded on its own so names with spaces or
    /// `#` survive intact.
    pub fn route_url(&self, route: &str, path: Option<&str>) -> Result<Url, BackendError> {
        let mut url = self.api_base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| BackendError::Other("API base cannot carry a path".to_string()))?;
            segments.pop_if_empty();
            segments.push(&self.server).push("files").push(route);
            if let Some(path) = path {
                segments.extend(super::node::segments(path));
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = self.authorized(request).send().await?;
        check_status(response).await
    }
}

/// Turns a non-2xx response into [`BackendError::Status`], preferring the
/// API's `detail` message over the raw body.
async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| {
            value.get("detail").map(|detail| match detail {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        })
        .unwrap_or(body);

    Err(BackendError::Status {
        status: status.as_u16(),
        detail,
    })
}

#[async_trait]
impl FileBackend for HttpFileBackend {
    async fn read(&self, path: &str) -> Result<String, BackendError> {
        let url = self.route_url("get", Some(path))?;
        debug!("📄 GET {}", url);
        let response = self.send(self.client.get(url)).await?;
        let body: ReadResponse = response.json().await?;
        Ok(body.data)
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), BackendError> {
        let url = self.route_url("write", Some(path))?;
        debug!("💾 POST {}", url);
        self.send(self.client.post(url).json(&json!({ "data": content })))
            .await?;
        Ok(())
    }

    async fn upload(&self, target: &str, file_name: &str, bytes: Vec<u8>) -> Result<(), BackendError> {
        // The target is the root sentinel or a directory path
        let mut url = self.route_url("upload", None)?;
        url.path_segments_mut()
            .map_err(|_| BackendError::Other("API base cannot carry a path".to_string()))?
            .extend(super::node::segments(target));
        debug!("⬆️ POST {} ({} bytes)", url, bytes.len());

        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("file", part);
        self.send(self.client.post(url).multipart(form)).await?;
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, BackendError> {
        let url = self.route_url("download", Some(path))?;
        debug!("⬇️ GET {}", url);
        let response = self.send(self.client.get(url)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn delete(&self, path: &str) -> Result<(), BackendError> {
        let url = self.route_url("delete", Some(path))?;
        debug!("🗑️ DELETE {}", url);
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn copy(&self, source: &str, destination: &str) -> Result<(), BackendError> {
        let url = self.route_url("copy", None)?;
        self.send(
            self.client
                .post(url)
                .json(&json!({ "source": source, "destination": destination })),
        )
        .await?;
        Ok(())
    }

    async fn move_entry(&self, source: &str, destination: &str) -> Result<(), BackendError> {
        let url = self.route_url("move", None)?;
        self.send(
            self.client
                .post(url)
                .json(&json!({ "source": source, "destination": destination })),
        )
        .await?;
        Ok(())
    }

    async fn archive(&self, paths: &[String], name: &str) -> Result<(), BackendError> {
        let url = self.route_url("zip", None)?;
        self.send(
            self.client
                .post(url)
                .json(&json!({ "paths": paths, "name": name })),
        )
        .await?;
        Ok(())
    }

    async fn unarchive(&self, path: &str) -> Result<(), BackendError> {
        let url = self.route_url("unzip", None)?;
        self.send(self.client.post(url).json(&json!({ "path": path })))
            .await?;
        Ok(())
    }
}
