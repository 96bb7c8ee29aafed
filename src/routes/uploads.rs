use actix_multipart::{Field, Multipart};
use actix_web::{
    delete, get,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    post, web, HttpResponse,
};
use chrono::Utc;
use futures_util::TryStreamExt as _;
use uuid::Uuid;

use crate::{
    assets::AssetStore,
    catalog::Catalog,
    config::Settings,
    errors::{ApiError, StoreError},
    export::{self, ExportOptions},
    models::upload::{
        BulkDeleteRequest, Deleted, ExportRequest, UploadCreated, UploadList, UploadRecord,
    },
    util,
};

fn store_failure(what: &'static str) -> impl FnOnce(StoreError) -> ApiError {
    move |e| {
        tracing::error!("{what}: {e}");
        ApiError::Failed(what)
    }
}

async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, ApiError> {
    let mut data = Vec::new();
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|_| ApiError::BadRequest("upload read error".into()))?
    {
        data.extend_from_slice(&chunk);
        if data.len() > limit {
            return Err(ApiError::BadRequest("file too large".into()));
        }
    }
    Ok(data)
}

#[utoipa::path(
    post,
    tag = "Uploads",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "stored", body = UploadCreated),
        (status = 400, description = "missing or invalid image/name", body = ErrorBody),
        (status = 500, description = "storage failure", body = ErrorBody)
    )
)]
#[post("/api/upload")]
pub async fn upload_image(
    mut payload: Multipart,
    catalog: web::Data<Catalog>,
    assets: web::Data<AssetStore>,
    settings: web::Data<Settings>,
) -> Result<HttpResponse, ApiError> {
    let mut file: Option<(Vec<u8>, Option<String>)> = None;
    let mut name: Option<String> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|_| ApiError::BadRequest("invalid multipart".into()))?
    {
        let cd = field.content_disposition().cloned();
        let field_name = cd.as_ref().and_then(|cd| cd.get_name()).unwrap_or("");
        match field_name {
            "image" => {
                let file_name = cd.as_ref().and_then(|cd| cd.get_filename()).map(str::to_string);
                let data = read_field(&mut field, settings.max_upload_size).await?;
                file = Some((data, file_name));
            }
            "name" => {
                let data = read_field(&mut field, 4096).await?;
                name = Some(String::from_utf8_lossy(&data).trim().to_string());
            }
            _ => {
                // чужие поля просто вычитываем
                read_field(&mut field, settings.max_upload_size).await?;
            }
        }
    }

    let (data, file_name) = match (file, name.as_deref()) {
        (Some((data, file_name)), Some(n)) if !data.is_empty() && !n.is_empty() => (data, file_name),
        _ => return Err(ApiError::BadRequest("Image and name are required".into())),
    };
    let name = name.unwrap_or_default();

    if image::guess_format(&data).is_err() {
        return Err(ApiError::BadRequest("unsupported image format".into()));
    }

    let ext = util::upload_extension(file_name.as_deref());
    let image_url = assets
        .store(&data, &ext)
        .await
        .map_err(store_failure("Failed to upload image"))?;

    let record = UploadRecord {
        id: Uuid::new_v4().to_string(),
        name,
        image_url,
        uploaded_at: Utc::now(),
    };
    catalog
        .insert(record.clone())
        .await
        .map_err(store_failure("Failed to upload image"))?;

    tracing::info!(upload_id = %record.id, "stored upload {}", record.image_url);
    Ok(HttpResponse::Ok().json(UploadCreated {
        success: true,
        upload: record,
    }))
}

#[utoipa::path(
    get,
    tag = "Uploads",
    responses((status = 200, description = "all uploads, newest first", body = UploadList))
)]
#[get("/api/uploads")]
pub async fn list_uploads(catalog: web::Data<Catalog>) -> HttpResponse {
    let mut uploads = catalog.snapshot().await;
    uploads.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
    HttpResponse::Ok().json(UploadList { uploads })
}

#[utoipa::path(
    delete,
    tag = "Uploads",
    params(("id" = String, Path, description = "upload id")),
    responses(
        (status = 200, description = "deleted", body = Deleted),
        (status = 404, description = "unknown id", body = ErrorBody)
    )
)]
#[delete("/api/uploads/{id}")]
pub async fn delete_upload(
    path: web::Path<String>,
    catalog: web::Data<Catalog>,
    assets: web::Data<AssetStore>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let record = catalog
        .get(&id)
        .await
        .ok_or(ApiError::NotFound("Upload not found"))?;

    assets
        .delete(&record)
        .await
        .map_err(store_failure("Failed to delete upload"))?;
    catalog
        .remove(&[id])
        .await
        .map_err(store_failure("Failed to delete upload"))?;

    Ok(HttpResponse::Ok().json(Deleted {
        success: true,
        deleted: None,
    }))
}

#[utoipa::path(
    post,
    tag = "Uploads",
    request_body = BulkDeleteRequest,
    responses(
        (status = 200, description = "deleted", body = Deleted),
        (status = 400, description = "no ids", body = ErrorBody)
    )
)]
#[post("/api/uploads/bulk-delete")]
pub async fn bulk_delete_uploads(
    body: web::Json<BulkDeleteRequest>,
    catalog: web::Data<Catalog>,
    assets: web::Data<AssetStore>,
) -> Result<HttpResponse, ApiError> {
    let ids = body.into_inner().upload_ids;
    if ids.is_empty() {
        return Err(ApiError::BadRequest("Upload IDs are required".into()));
    }

    let targets: Vec<UploadRecord> = catalog
        .snapshot()
        .await
        .into_iter()
        .filter(|r| ids.contains(&r.id))
        .collect();
    for record in &targets {
        assets
            .delete(record)
            .await
            .map_err(store_failure("Failed to delete uploads"))?;
    }
    let removed = catalog
        .remove(&ids)
        .await
        .map_err(store_failure("Failed to delete uploads"))?;

    Ok(HttpResponse::Ok().json(Deleted {
        success: true,
        deleted: Some(removed.len()),
    }))
}

#[utoipa::path(
    post,
    tag = "Uploads",
    request_body = ExportRequest,
    responses(
        (status = 200, description = "one image (image/*) or a zip of several", content_type = "application/octet-stream"),
        (status = 400, description = "nothing selected", body = ErrorBody),
        (status = 404, description = "single image file missing", body = ErrorBody),
        (status = 500, description = "export failed", body = ErrorBody)
    )
)]
#[post("/api/uploads/download")]
pub async fn download_uploads(
    body: web::Json<ExportRequest>,
    catalog: web::Data<Catalog>,
    assets: web::Data<AssetStore>,
    settings: web::Data<Settings>,
) -> Result<HttpResponse, ApiError> {
    let req = body.into_inner();
    let opts = ExportOptions {
        scratch_root: settings.scratch_dir.clone(),
        archive_name: settings.archive_name.clone(),
    };
    let started = std::time::Instant::now();
    let records = catalog.snapshot().await;
    let payload = export::export(&records, &req, &assets, &opts).await?;

    if !settings.production_mode {
        tracing::info!(
            "download_uploads took {}ms",
            started.elapsed().as_millis()
        );
    }

    Ok(HttpResponse::Ok()
        .content_type(payload.content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(payload.file_name)],
        })
        .body(payload.body))
}
