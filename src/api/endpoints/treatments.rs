//! Treatment record endpoints under `/tratamientos`.
//!
//! `PUT /tratamientos/:id/administracion` flips one per-day entry; the
//! write and the record timestamp move together in one transaction.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository as repo;
use crate::models::{TreatmentDetail, TreatmentRecord};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTreatmentRequest {
    pub patient_id: Uuid,
    pub history_id: Option<Uuid>,
    #[serde(flatten)]
    pub detail: TreatmentDetail,
}

fn validate_detail(detail: &TreatmentDetail) -> Result<(), ApiError> {
    let treatments = detail.treatments();
    if treatments.is_empty() {
        return Err(ApiError::BadRequest(
            "at least one treatment is required".into(),
        ));
    }
    if treatments.iter().any(|t| t.name.trim().is_empty()) {
        return Err(ApiError::BadRequest("treatment name is required".into()));
    }
    Ok(())
}

/// `POST /tratamientos`
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(payload): Json<CreateTreatmentRequest>,
) -> Result<(StatusCode, Json<TreatmentRecord>), ApiError> {
    validate_detail(&payload.detail)?;

    let mut conn = ctx.conn()?;
    if !repo::patient_exists(&conn, &payload.patient_id)? {
        return Err(ApiError::NotFound("Patient not found".into()));
    }
    if let Some(history_id) = payload.history_id {
        // Surfaces 404 if the referenced history is gone.
        repo::get_history(&conn, &history_id)?;
    }

    let now = Utc::now();
    let record = TreatmentRecord {
        id: Uuid::new_v4(),
        patient_id: payload.patient_id,
        history_id: payload.history_id,
        detail: payload.detail,
        created_at: now,
        updated_at: now,
    };
    repo::insert_record(&mut conn, &record)?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /tratamientos/paciente/:patient_id`
pub async fn list_by_patient(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Vec<TreatmentRecord>>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(repo::list_records_by_patient(&conn, &patient_id)?))
}

/// `GET /tratamientos/:id`
pub async fn get_by_id(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TreatmentRecord>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(repo::get_record(&conn, &id)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTreatmentRequest {
    #[serde(flatten)]
    pub detail: TreatmentDetail,
}

/// `PUT /tratamientos/:id` — replace the treatments wholesale.
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTreatmentRequest>,
) -> Result<Json<TreatmentRecord>, ApiError> {
    validate_detail(&payload.detail)?;

    let mut conn = ctx.conn()?;
    repo::update_detail(&mut conn, &id, &payload.detail, Utc::now())?;
    Ok(Json(repo::get_record(&conn, &id)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAdministrationRequest {
    pub item_id: Uuid,
    pub day: NaiveDate,
    pub administered: bool,
    pub note: Option<String>,
}

/// `PUT /tratamientos/:id/administracion` — mark one day as given/skipped.
pub async fn mark_administration(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MarkAdministrationRequest>,
) -> Result<Json<TreatmentRecord>, ApiError> {
    let mut conn = ctx.conn()?;
    repo::mark_administration(
        &mut conn,
        &id,
        &payload.item_id,
        payload.day,
        payload.administered,
        payload.note.as_deref(),
        Utc::now(),
    )?;
    Ok(Json(repo::get_record(&conn, &id)?))
}

/// `DELETE /tratamientos/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.conn()?;
    repo::delete_record(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
