//! Study and photo upload endpoints.
//!
//! `POST /estudios` and `POST /fotos` take `multipart/form-data` with a
//! single `archivo` file part plus link fields. The file goes to the local
//! upload store; the row records the provider URL and storage key. Deletion
//! only flips the `visible` flag.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository as repo;
use crate::models::{FileKind, StudyFile};

/// 10 MB cap per uploaded file.
const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

struct UploadForm {
    file_name: String,
    bytes: Vec<u8>,
    patient_id: Option<Uuid>,
    request_id: Option<Uuid>,
    kind: Option<FileKind>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm {
        file_name: String::new(),
        bytes: Vec::new(),
        patient_id: None,
        request_id: None,
        kind: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "archivo" => {
                form.file_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "archivo".to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid file part: {e}")))?;
                if data.len() > MAX_FILE_BYTES {
                    return Err(ApiError::BadRequest("File exceeds the 10 MB limit".into()));
                }
                form.bytes = data.to_vec();
            }
            "pacienteId" => {
                let text = field.text().await.map_err(bad_field)?;
                form.patient_id =
                    Some(Uuid::parse_str(&text).map_err(|_| {
                        ApiError::BadRequest("pacienteId is not a valid id".into())
                    })?);
            }
            "solicitudId" => {
                let text = field.text().await.map_err(bad_field)?;
                form.request_id =
                    Some(Uuid::parse_str(&text).map_err(|_| {
                        ApiError::BadRequest("solicitudId is not a valid id".into())
                    })?);
            }
            "tipo" => {
                let text = field.text().await.map_err(bad_field)?;
                form.kind = Some(FileKind::from_str(&text)?);
            }
            _ => {}
        }
    }

    if form.bytes.is_empty() {
        return Err(ApiError::BadRequest("archivo field is required".into()));
    }
    Ok(form)
}

fn bad_field(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Invalid form field: {e}"))
}

fn check_content_type(file_name: &str) -> Result<(), ApiError> {
    let mime = mime_guess::from_path(file_name).first_or_octet_stream();
    let ok = mime.type_() == mime_guess::mime::IMAGE
        || (mime.type_() == mime_guess::mime::APPLICATION
            && mime.subtype() == mime_guess::mime::PDF);
    if ok {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Unsupported file type: {mime}"
        )))
    }
}

async fn upload_with_kind(
    ctx: ApiContext,
    multipart: Multipart,
    allowed: &[FileKind],
    default_kind: FileKind,
) -> Result<(StatusCode, Json<StudyFile>), ApiError> {
    let form = read_form(multipart).await?;
    let kind = form.kind.unwrap_or(default_kind);
    if !allowed.contains(&kind) {
        return Err(ApiError::BadRequest(format!(
            "tipo {} is not valid for this endpoint",
            kind.as_str()
        )));
    }
    check_content_type(&form.file_name)?;

    let conn = ctx.conn()?;
    if let Some(patient_id) = form.patient_id {
        if !repo::patient_exists(&conn, &patient_id)? {
            return Err(ApiError::NotFound("Patient not found".into()));
        }
    }
    if let Some(request_id) = form.request_id {
        repo::get_request(&conn, &request_id)?;
    }

    let mut study = StudyFile {
        id: Uuid::new_v4(),
        patient_id: form.patient_id,
        request_id: form.request_id,
        kind,
        file_name: form.file_name.clone(),
        url: String::new(),
        storage_key: String::new(),
        visible: true,
        uploaded_at: Utc::now(),
    };
    if !study.is_well_linked() {
        return Err(ApiError::BadRequest(
            "pacienteId or solicitudId is required for this tipo".into(),
        ));
    }

    // Nothing touches disk until the upload is known to be linkable.
    let stored = ctx.uploads.store(&form.file_name, &form.bytes)?;
    study.file_name = stored.file_name;
    study.url = stored.url;
    study.storage_key = stored.storage_key;

    repo::insert_study(&conn, &study)?;
    tracing::info!(study = %study.id, kind = kind.as_str(), "file uploaded");
    Ok((StatusCode::CREATED, Json(study)))
}

/// `POST /estudios` — lab result files.
pub async fn upload_study(
    State(ctx): State<ApiContext>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<StudyFile>), ApiError> {
    upload_with_kind(ctx, multipart, &[FileKind::Estudio], FileKind::Estudio).await
}

/// `POST /fotos` — before/after clinical photos.
pub async fn upload_photo(
    State(ctx): State<ApiContext>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<StudyFile>), ApiError> {
    upload_with_kind(
        ctx,
        multipart,
        &[FileKind::FotoAntes, FileKind::FotoDespues],
        FileKind::FotoAntes,
    )
    .await
}

#[derive(Deserialize)]
pub struct StudyListQuery {
    pub tipo: Option<FileKind>,
}

/// `GET /estudios/paciente/:patient_id`
pub async fn list_by_patient(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<StudyListQuery>,
) -> Result<Json<Vec<StudyFile>>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(repo::list_studies_by_patient(
        &conn,
        &patient_id,
        query.tipo,
    )?))
}

/// `GET /fotos/paciente/:patient_id` — photo kinds only, lab study files
/// never appear here even without a `tipo` filter.
pub async fn list_photos_by_patient(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<Uuid>,
    Query(query): Query<StudyListQuery>,
) -> Result<Json<Vec<StudyFile>>, ApiError> {
    let conn = ctx.conn()?;
    match query.tipo {
        None => Ok(Json(repo::list_photos_by_patient(&conn, &patient_id)?)),
        Some(kind @ (FileKind::FotoAntes | FileKind::FotoDespues)) => Ok(Json(
            repo::list_studies_by_patient(&conn, &patient_id, Some(kind))?,
        )),
        Some(FileKind::Estudio) => Err(ApiError::BadRequest(
            "tipo estudio is not valid for this endpoint".into(),
        )),
    }
}

/// `GET /estudios/solicitud/:request_id`
pub async fn list_by_request(
    State(ctx): State<ApiContext>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<Vec<StudyFile>>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(repo::list_studies_by_request(&conn, &request_id)?))
}

/// `DELETE /estudios/:id` — soft delete, the stored file stays.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.conn()?;
    repo::soft_delete_study(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
