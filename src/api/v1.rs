use std::path::PathBuf;
use std::time::SystemTime;

use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse};
use futures::{StreamExt, TryStreamExt};
use log::info;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::api::{FormatInfo, FormatsResponse, HealthResponse};
use crate::batch::{ConversionRequest, UploadedFile};
use crate::errors::{AudioResult, ConvertError};
use crate::formats::{self, MAX_CUSTOM_EXTENSION_LEN};
use crate::state::AppState;

/// Longest accepted value for a scalar form field.
const MAX_TEXT_FIELD_BYTES: usize = 1024;

const DOWNLOAD_CHUNK_BYTES: usize = 64 * 1024;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/formats", web::get().to(list_formats))
        .route("/convert", web::post().to(convert))
        // Must be registered before the generic filename route.
        .route("/download/batch/{batch_id}/zip", web::get().to(download_zip))
        .route("/download/batch/{batch_id}/{filename}", web::get().to(download_file));
}

async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let uptime = SystemTime::now()
        .duration_since(state.started_at)
        .unwrap_or_default()
        .as_secs();

    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
    })
}

async fn list_formats() -> HttpResponse {
    let formats = formats::registered_formats()
        .iter()
        .map(|(name, profile)| FormatInfo::from_profile(name, profile))
        .collect();

    HttpResponse::Ok().json(FormatsResponse {
        formats,
        custom_max_length: MAX_CUSTOM_EXTENSION_LEN,
    })
}

async fn convert(state: web::Data<AppState>, payload: Multipart) -> AudioResult<HttpResponse> {
    let request = read_convert_form(payload, state.max_file_bytes).await?;
    info!(
        "Convert request: {} file(s), format={:?}, zip={}, links={}",
        request.files.len(),
        request.format,
        request.bundle_zip,
        request.individual_links
    );

    // Encoding shells out and blocks; keep it off the async workers.
    let pipeline = state.pipeline.clone();
    let result = web::block(move || pipeline.convert(request)).await??;

    Ok(HttpResponse::Ok().json(result))
}

async fn download_file(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> AudioResult<HttpResponse> {
    let (batch_id, filename) = path.into_inner();
    let resolved = state.artifacts.resolve_file(&batch_id, &filename)?;
    attachment(resolved).await
}

async fn download_zip(state: web::Data<AppState>, batch_id: web::Path<String>) -> AudioResult<HttpResponse> {
    let resolved = state.artifacts.resolve_zip(&batch_id)?;
    attachment(resolved).await
}

async fn attachment(path: PathBuf) -> AudioResult<HttpResponse> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download")
        .to_string();

    let file = File::open(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConvertError::not_found(),
        _ => ConvertError::Io(e),
    })?;
    let len = file.metadata().await?.len();

    Ok(HttpResponse::Ok()
        .content_type(content_type_for(&filename))
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename)],
        })
        .no_chunking(len)
        .streaming(futures::stream::try_unfold(file, next_chunk)))
}

async fn next_chunk(mut file: File) -> std::io::Result<Option<(web::Bytes, File)>> {
    let mut buf = vec![0u8; DOWNLOAD_CHUNK_BYTES];
    let n = file.read(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    buf.truncate(n);
    Ok(Some((web::Bytes::from(buf), file)))
}

fn content_type_for(filename: &str) -> &'static str {
    match crate::utils::extension_of(filename).as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        Some("ogg") => "audio/ogg",
        Some("opus") => "audio/opus",
        Some("m4a") => "audio/mp4",
        Some("aiff") => "audio/aiff",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Presence flags: any value except an explicit negative turns them on.
fn flag_value(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "false" | "0" | "off" | "no"
    )
}

fn is_file_field(name: &str) -> bool {
    matches!(name, "files" | "files[]" | "audio_files")
}

async fn read_convert_form(mut payload: Multipart, max_file_bytes: usize) -> AudioResult<ConversionRequest> {
    let mut request = ConversionRequest::default();

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ConvertError::InvalidRequest(format!("malformed multipart body: {}", e)))?
    {
        let (name, filename) = match field.content_disposition() {
            Some(cd) => (
                cd.get_name().unwrap_or_default().to_string(),
                cd.get_filename().map(str::to_string),
            ),
            None => continue,
        };

        if is_file_field(&name) {
            let content_type = field.content_type().map(|m| m.essence_str().to_string());
            let mut bytes = Vec::new();
            while let Some(chunk) = field.next().await {
                let data = chunk.map_err(|e| ConvertError::InvalidRequest(e.to_string()))?;
                if bytes.len() + data.len() > max_file_bytes {
                    return Err(ConvertError::PayloadTooLarge(format!(
                        "{} exceeds the upload limit of {} bytes",
                        filename.as_deref().unwrap_or("upload"),
                        max_file_bytes
                    )));
                }
                bytes.extend_from_slice(&data);
            }

            // Browsers send an empty, nameless part when nothing was picked.
            let empty_placeholder = filename.as_deref().map_or(true, str::is_empty) && bytes.is_empty();
            if !empty_placeholder {
                request.files.push(UploadedFile {
                    filename,
                    content_type,
                    bytes,
                });
            }
            continue;
        }

        match name.as_str() {
            "format" => request.format = Some(read_text_field(&mut field, &name).await?),
            "bundle_zip" => request.bundle_zip = flag_value(&read_text_field(&mut field, &name).await?),
            "individual_links" => {
                request.individual_links = flag_value(&read_text_field(&mut field, &name).await?)
            }
            _ => drain_field(&mut field).await?,
        }
    }

    Ok(request)
}

/// Consume a part nobody asked for, without size or encoding checks.
async fn drain_field(field: &mut actix_multipart::Field) -> AudioResult<()> {
    while let Some(chunk) = field.next().await {
        chunk.map_err(|e| ConvertError::InvalidRequest(e.to_string()))?;
    }
    Ok(())
}

async fn read_text_field(field: &mut actix_multipart::Field, name: &str) -> AudioResult<String> {
    let mut raw = Vec::new();
    while let Some(chunk) = field.next().await {
        let data = chunk.map_err(|e| ConvertError::InvalidRequest(e.to_string()))?;
        if raw.len() + data.len() > MAX_TEXT_FIELD_BYTES {
            return Err(ConvertError::InvalidRequest(format!("field '{}' is too long", name)));
        }
        raw.extend_from_slice(&data);
    }
    String::from_utf8(raw)
        .map_err(|_| ConvertError::InvalidRequest(format!("field '{}' is not valid UTF-8", name)))
}
