use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Failed(&'static str),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let msg = self.to_string();
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": msg }))
    }
}

/// Catalog / asset store failures. Never shown to the client as-is.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("catalog is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no uploads selected")]
    EmptySelection,
    #[error("source file missing for upload {id}")]
    SourceFileMissing { id: String },
    #[error("encoding failed for upload {id}: {msg}")]
    Encoding { id: String, msg: String },
    #[error("archive failed: {0}")]
    Archive(String),
    #[error("filesystem failure while {stage}: {source}")]
    Filesystem {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl From<ExportError> for ApiError {
    fn from(e: ExportError) -> Self {
        match e {
            ExportError::EmptySelection => ApiError::BadRequest("No uploads to download".into()),
            ExportError::SourceFileMissing { id } => {
                tracing::warn!(upload_id = %id, "export source file missing");
                ApiError::NotFound("File not found")
            }
            other => {
                tracing::error!(error = %other, "export failed");
                ApiError::Failed("Failed to download images")
            }
        }
    }
}
