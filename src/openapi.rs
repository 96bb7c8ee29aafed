use crate::models::upload::{
    BulkDeleteRequest, Deleted, ErrorBody, ExportRequest, UploadCreated, UploadForm, UploadList,
    UploadRecord,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::uploads::upload_image,
        crate::routes::uploads::list_uploads,
        crate::routes::uploads::delete_upload,
        crate::routes::uploads::bulk_delete_uploads,
        crate::routes::uploads::download_uploads,
    ),
    components(
        schemas(
            UploadRecord,
            UploadForm,
            UploadCreated,
            UploadList,
            Deleted,
            BulkDeleteRequest,
            ExportRequest,
            ErrorBody
        )
    ),
    tags(
        (name = "Uploads", description = "Member photo uploads and bulk export")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<_> = doc.paths.paths.keys().cloned().collect();
        for p in [
            "/api/upload",
            "/api/uploads",
            "/api/uploads/{id}",
            "/api/uploads/bulk-delete",
            "/api/uploads/download",
        ] {
            assert!(paths.iter().any(|k| k == p), "missing {p}");
        }
    }

    #[test]
    fn document_carries_form_and_error_schemas() {
        let doc = ApiDoc::openapi();
        let schemas = &doc.components.expect("components").schemas;
        for name in ["UploadForm", "ErrorBody", "ExportRequest", "UploadRecord"] {
            assert!(schemas.contains_key(name), "missing schema {name}");
        }
    }
}
