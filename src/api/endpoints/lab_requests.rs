//! Lab request endpoints under `/solicitudes`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository as repo;
use crate::models::{Analysis, LabRequest, LabRequestStatus};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLabRequestRequest {
    pub patient_id: Uuid,
    pub analyses: Vec<AnalysisFields>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisFields {
    pub name: String,
    pub unit: Option<String>,
}

/// `POST /solicitudes`
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(payload): Json<CreateLabRequestRequest>,
) -> Result<(StatusCode, Json<LabRequest>), ApiError> {
    if payload.analyses.is_empty() {
        return Err(ApiError::BadRequest(
            "at least one analysis is required".into(),
        ));
    }
    if payload.analyses.iter().any(|a| a.name.trim().is_empty()) {
        return Err(ApiError::BadRequest("analysis name is required".into()));
    }

    let mut conn = ctx.conn()?;
    if !repo::patient_exists(&conn, &payload.patient_id)? {
        return Err(ApiError::NotFound("Patient not found".into()));
    }

    let request = LabRequest {
        id: Uuid::new_v4(),
        patient_id: payload.patient_id,
        status: LabRequestStatus::Pendiente,
        analyses: payload
            .analyses
            .into_iter()
            .map(|a| Analysis {
                id: Uuid::new_v4(),
                name: a.name.trim().to_string(),
                value: None,
                unit: a.unit,
            })
            .collect(),
        requested_at: Utc::now(),
    };
    repo::insert_request(&mut conn, &request)?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// `GET /solicitudes/paciente/:patient_id`
pub async fn list_by_patient(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Vec<LabRequest>>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(repo::list_requests_by_patient(&conn, &patient_id)?))
}

/// `GET /solicitudes/:id`
pub async fn get_by_id(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<LabRequest>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(repo::get_request(&conn, &id)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: LabRequestStatus,
}

/// `PUT /solicitudes/:id/estado`
pub async fn update_request_status(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<LabRequest>, ApiError> {
    let conn = ctx.conn()?;
    repo::update_request_status(&conn, &id, payload.status)?;
    Ok(Json(repo::get_request(&conn, &id)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterResultsRequest {
    pub results: Vec<ResultEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub analysis_id: Uuid,
    pub value: String,
}

/// `PUT /solicitudes/:id/resultados` — fill analysis values. Once every
/// analysis has a value the request flips to completed.
pub async fn enter_results(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<EnterResultsRequest>,
) -> Result<Json<LabRequest>, ApiError> {
    if payload.results.is_empty() {
        return Err(ApiError::BadRequest("results cannot be empty".into()));
    }

    let conn = ctx.conn()?;
    for entry in &payload.results {
        repo::set_analysis_result(&conn, &id, &entry.analysis_id, &entry.value)?;
    }

    let request = repo::get_request(&conn, &id)?;
    if request.all_results_in() && request.status != LabRequestStatus::Completada {
        repo::update_request_status(&conn, &id, LabRequestStatus::Completada)?;
        return Ok(Json(repo::get_request(&conn, &id)?));
    }
    Ok(Json(request))
}

/// `DELETE /solicitudes/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.conn()?;
    repo::delete_request(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
