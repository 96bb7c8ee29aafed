use crate::{
    assets::AssetStore,
    errors::ExportError,
    imaging::{self, LABELED_CONTENT_TYPE, LABELED_EXT},
    models::upload::{ExportRequest, UploadRecord},
    util,
};
use std::{
    collections::HashSet,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use uuid::Uuid;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// What an export hands back to the HTTP layer.
#[derive(Debug)]
pub struct ExportPayload {
    pub body: Vec<u8>,
    pub content_type: String,
    pub file_name: String,
}

/// Where batch exports stage files and what the archive is called.
#[derive(Clone, Debug)]
pub struct ExportOptions {
    pub scratch_root: PathBuf,
    pub archive_name: String,
}

/// Records matching `req`, in catalog order.
pub fn select(catalog: &[UploadRecord], req: &ExportRequest) -> Result<Vec<UploadRecord>, ExportError> {
    let selected: Vec<UploadRecord> = if req.download_all {
        catalog.to_vec()
    } else {
        let wanted: HashSet<&str> = req.upload_ids.iter().map(String::as_str).collect();
        catalog
            .iter()
            .filter(|r| wanted.contains(r.id.as_str()))
            .cloned()
            .collect()
    };
    if selected.is_empty() {
        return Err(ExportError::EmptySelection);
    }
    Ok(selected)
}

/// Selector → (labeler) → archiver for one request.
pub async fn export(
    catalog: &[UploadRecord],
    req: &ExportRequest,
    assets: &AssetStore,
    opts: &ExportOptions,
) -> Result<ExportPayload, ExportError> {
    let selected = select(catalog, req)?;
    match selected.as_slice() {
        [single] if !req.download_all => export_single(single, req.add_names, assets).await,
        records => export_batch(records, req.add_names, assets, opts).await,
    }
}

async fn read_source(record: &UploadRecord, assets: &AssetStore) -> Result<Vec<u8>, ExportError> {
    match assets.read(record).await {
        Ok(Some(bytes)) => Ok(bytes),
        Ok(None) => Err(ExportError::SourceFileMissing {
            id: record.id.clone(),
        }),
        Err(e) => {
            tracing::warn!(upload_id = %record.id, "source file unreadable: {e}");
            Err(ExportError::SourceFileMissing {
                id: record.id.clone(),
            })
        }
    }
}

async fn label(record: &UploadRecord, bytes: Vec<u8>) -> Result<Vec<u8>, ExportError> {
    let name = record.name.clone();
    imaging::run_blocking(move || imaging::label_image(&bytes, &name))
        .await
        .map_err(|e| ExportError::Encoding {
            id: record.id.clone(),
            msg: e.to_string(),
        })?
        .map_err(|e| ExportError::Encoding {
            id: record.id.clone(),
            msg: e.to_string(),
        })
}

async fn export_single(
    record: &UploadRecord,
    add_names: bool,
    assets: &AssetStore,
) -> Result<ExportPayload, ExportError> {
    let bytes = read_source(record, assets).await?;
    if add_names {
        let body = label(record, bytes).await?;
        return Ok(ExportPayload {
            body,
            content_type: LABELED_CONTENT_TYPE.into(),
            file_name: util::export_file_name(&record.name, &record.id, LABELED_EXT),
        });
    }
    let ext = record.extension();
    Ok(ExportPayload {
        body: bytes,
        content_type: imaging::content_type_for_ext(ext),
        file_name: util::export_file_name(&record.name, &record.id, ext),
    })
}

/// Uniquely named staging directory, removed when dropped.
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn create(root: &Path) -> std::io::Result<Self> {
        let path = root.join(Uuid::new_v4().to_string());
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::error!("failed to remove scratch dir {}: {e}", self.path.display());
            }
        }
    }
}

// Весь батч живёт в одной blocking-задаче вместе со ScratchDir: если клиент
// отвалился и future дропнут, задача всё равно доходит до конца и чистит за собой.
async fn export_batch(
    records: &[UploadRecord],
    add_names: bool,
    assets: &AssetStore,
    opts: &ExportOptions,
) -> Result<ExportPayload, ExportError> {
    let records = records.to_vec();
    let assets = assets.clone();
    let scratch_root = opts.scratch_root.clone();
    let archive_name = opts.archive_name.clone();

    let body = imaging::run_blocking(move || {
        build_archive(&records, add_names, &assets, &scratch_root, &archive_name)
    })
    .await
    .map_err(|e| ExportError::Archive(e.to_string()))??;

    Ok(ExportPayload {
        body,
        content_type: ARCHIVE_CONTENT_TYPE.into(),
        file_name: opts.archive_name.clone(),
    })
}

/// Stages every record into a fresh scratch dir, zips it and returns the bytes.
/// The scratch dir is gone by the time this returns, on every path.
fn build_archive(
    records: &[UploadRecord],
    add_names: bool,
    assets: &AssetStore,
    scratch_root: &Path,
    archive_name: &str,
) -> Result<Vec<u8>, ExportError> {
    let scratch = ScratchDir::create(scratch_root).map_err(|source| ExportError::Filesystem {
        stage: "creating scratch dir",
        source,
    })?;

    let mut staged = Vec::with_capacity(records.len());
    for record in records {
        match stage_record(record, add_names, assets, scratch.path()) {
            Ok(name) => staged.push(name),
            Err(ExportError::SourceFileMissing { id }) => {
                tracing::debug!(upload_id = %id, "skipping upload without source file");
            }
            Err(e) => return Err(e),
        }
    }

    let archive_path = scratch.path().join(archive_name);
    write_archive(scratch.path(), &staged, &archive_path)?;
    std::fs::read(&archive_path).map_err(|source| ExportError::Filesystem {
        stage: "reading archive",
        source,
    })
}

/// Copies (or labels) one record into `dir`; returns the staged file name.
fn stage_record(
    record: &UploadRecord,
    add_names: bool,
    assets: &AssetStore,
    dir: &Path,
) -> Result<String, ExportError> {
    let bytes = match assets.read_blocking(record) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            return Err(ExportError::SourceFileMissing {
                id: record.id.clone(),
            })
        }
        Err(e) => {
            tracing::warn!(upload_id = %record.id, "source file unreadable: {e}");
            return Err(ExportError::SourceFileMissing {
                id: record.id.clone(),
            });
        }
    };
    let (name, body) = if add_names {
        let labeled = imaging::label_image(&bytes, &record.name).map_err(|e| ExportError::Encoding {
            id: record.id.clone(),
            msg: e.to_string(),
        })?;
        (
            util::export_file_name(&record.name, &record.id, LABELED_EXT),
            labeled,
        )
    } else {
        (
            util::export_file_name(&record.name, &record.id, record.extension()),
            bytes,
        )
    };
    std::fs::write(dir.join(&name), &body).map_err(|source| ExportError::Filesystem {
        stage: "staging file",
        source,
    })?;
    Ok(name)
}

fn write_archive(dir: &Path, entries: &[String], archive_path: &Path) -> Result<(), ExportError> {
    let archive_err = |e: zip::result::ZipError| ExportError::Archive(e.to_string());
    let file = File::create(archive_path).map_err(|source| ExportError::Filesystem {
        stage: "creating archive",
        source,
    })?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    for name in entries {
        let data = std::fs::read(dir.join(name)).map_err(|source| ExportError::Filesystem {
            stage: "reading staged file",
            source,
        })?;
        zip.start_file(name.as_str(), options).map_err(archive_err)?;
        zip.write_all(&data).map_err(|source| ExportError::Filesystem {
            stage: "writing archive entry",
            source,
        })?;
    }

    let mut writer = zip.finish().map_err(archive_err)?;
    writer.flush().map_err(|source| ExportError::Filesystem {
        stage: "flushing archive",
        source,
    })?;
    Ok(())
}
