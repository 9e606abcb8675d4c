//! HTTP client for the Odin document, search, and auth endpoints.
//!
//! Every call is a plain request/response round trip. Authenticated calls
//! carry `Authorization: Bearer <token>` when the client was built with a
//! token; without one the request goes out as-is and the backend decides.
//! There is no retry: a failed call is reported once, to the caller.
//!
//! Non-2xx responses become [`ApiError::Status`] carrying FastAPI's
//! `detail` message when the body has one.

use anyhow::{Context, Result};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ApiConfig;
use crate::models::{
    BulkUploadResponse, FileInfo, FileMetadata, LoginRequest, MessageResponse, SearchResult,
    TokenResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("backend returned {status}: {detail}")]
    Status { status: StatusCode, detail: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Status { status, .. } => *status,
        }
    }
}

/// A downloaded file.
#[derive(Debug, Clone)]
pub struct Download {
    /// From `Content-Disposition`, when the backend sent one.
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let base_url = Url::parse(config.url.trim())
            .with_context(|| format!("Invalid api.url: {}", config.url))?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("api.url cannot be a base URL: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        tracing::debug!(url = %response.url(), %status, "backend response");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let mut detail = error_detail(&body);
        if status == StatusCode::UNAUTHORIZED && !self.is_authenticated() {
            detail.push_str(" (not signed in; run `odin login`)");
        }
        Err(ApiError::Status {
            status,
            detail,
        }
        .into())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.send(self.client.get(url)).await?;
        Ok(response.json().await?)
    }

    /// `GET /files`
    pub async fn list_files(&self) -> Result<Vec<FileInfo>> {
        self.get_json(self.endpoint(&["files"])?).await
    }

    /// `GET /files/{id}/metadata`
    pub async fn file_metadata(&self, file_id: &str) -> Result<FileMetadata> {
        self.get_json(self.endpoint(&["files", file_id, "metadata"])?)
            .await
    }

    /// `GET /files/{id}`
    pub async fn download_file(&self, file_id: &str) -> Result<Download> {
        let response = self
            .send(self.client.get(self.endpoint(&["files", file_id])?))
            .await?;
        let filename = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_filename);
        let bytes = response.bytes().await?.to_vec();
        Ok(Download { filename, bytes })
    }

    /// `DELETE /files/{id}`
    pub async fn delete_file(&self, file_id: &str) -> Result<MessageResponse> {
        let response = self
            .send(self.client.delete(self.endpoint(&["files", file_id])?))
            .await?;
        Ok(response.json().await?)
    }

    /// `POST /upload/bulk` with one `files` part per path.
    pub async fn upload_files(&self, paths: &[PathBuf]) -> Result<BulkUploadResponse> {
        if paths.is_empty() {
            anyhow::bail!("no files to upload");
        }

        let mut form = reqwest::multipart::Form::new();
        for path in paths {
            form = form.part("files", file_part(path).await?);
        }

        let response = self
            .send(
                self.client
                    .post(self.endpoint(&["upload", "bulk"])?)
                    .multipart(form),
            )
            .await?;
        Ok(response.json().await?)
    }

    /// `GET /contextualsearch?query=...[&context_range=N]`
    pub async fn search(&self, query: &str, context_range: Option<u32>) -> Result<Vec<SearchResult>> {
        let mut url = self.endpoint(&["contextualsearch"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("query", query);
            if let Some(range) = context_range {
                pairs.append_pair("context_range", &range.to_string());
            }
        }
        self.get_json(url).await
    }

    /// `GET /categories`
    pub async fn categories(&self) -> Result<Vec<String>> {
        self.get_json(self.endpoint(&["categories"])?).await
    }

    /// `POST /auth/login`
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self
            .send(self.client.post(self.endpoint(&["auth", "login"])?).json(&body))
            .await?;
        Ok(response.json().await?)
    }

    /// `POST /auth/refresh?refresh_token=...`
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let response = self
            .send(
                self.client
                    .post(self.endpoint(&["auth", "refresh"])?)
                    .query(&[("refresh_token", refresh_token)]),
            )
            .await?;
        Ok(response.json().await?)
    }

    /// `POST /auth/logout?refresh_token=...`
    pub async fn logout(&self, refresh_token: &str) -> Result<MessageResponse> {
        let response = self
            .send(
                self.client
                    .post(self.endpoint(&["auth", "logout"])?)
                    .query(&[("refresh_token", refresh_token)]),
            )
            .await?;
        Ok(response.json().await?)
    }
}

async fn file_part(path: &Path) -> Result<reqwest::multipart::Part> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let part = reqwest::multipart::Part::bytes(data)
        .file_name(filename)
        .mime_str(mime.essence_str())?;
    Ok(part)
}

/// Pulls FastAPI's `detail` out of an error body, falling back to the raw
/// text.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => match json.get("detail") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        Err(_) if body.trim().is_empty() => "(empty body)".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

fn disposition_filename(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}
