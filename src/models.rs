//! Wire types exchanged with the Odin backend.
//!
//! Field names follow the backend's JSON exactly; a few are renamed to
//! Rust conventions with `#[serde(rename)]`.

use serde::{Deserialize, Serialize};

/// One entry of `GET /files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(rename = "fileId")]
    pub file_id: String,
    pub filename: String,
    pub size: u64,
    /// `YYYY-MM-DD HH:MM:SS`, server local time.
    pub last_modified: String,
}

/// `GET /files/{id}/metadata`: extracted content plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_id: String,
    pub filename: String,
    pub content_type: String,
    #[serde(default)]
    pub file_metadata: serde_json::Value,
    /// Markdown produced by the backend's document extraction.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// One hit of `GET /contextualsearch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub file_id: String,
    pub filename: String,
    pub content_type: String,
    pub content_preview: String,
    #[serde(default)]
    pub categories: Vec<String>,
    pub rank: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub total_files: u64,
    pub successful_uploads: u64,
    pub failed_uploads: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    pub filename: String,
    #[serde(default)]
    pub file_id: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub docling_processed: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// `POST /upload/bulk` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkUploadResponse {
    pub message: String,
    pub summary: UploadSummary,
    pub results: Vec<UploadResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Token set returned by `/auth/login` and `/auth/refresh`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
    pub token_type: String,
}
