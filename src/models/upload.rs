use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One catalog entry. Immutable once written.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    #[schema(example = "6f1c2a9e-3d7b-4f8e-9a41-0c5d2e7b8a13")]
    pub id: String,
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "/uploads/0b8e1f52-7c44-4a0d-b1f2-5e9a3c6d7e80.jpg")]
    pub image_url: String,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadRecord {
    /// Extension of the stored file, without the dot.
    pub fn extension(&self) -> &str {
        self.image_url
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.contains('/'))
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    #[serde(default)]
    pub upload_ids: Vec<String>,
    #[serde(default)]
    pub add_names: bool,
    #[serde(default)]
    pub download_all: bool,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub upload_ids: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UploadList {
    pub uploads: Vec<UploadRecord>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UploadCreated {
    pub success: bool,
    pub upload: UploadRecord,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Deleted {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<usize>,
}

/// Multipart form accepted by `POST /api/upload` (documentation only).
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ErrorBody {
    #[schema(example = "No uploads to download")]
    pub error: String,
}
