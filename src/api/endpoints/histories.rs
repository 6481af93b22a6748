//! Clinical history endpoints under `/historial`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository as repo;
use crate::models::{AlopeciaType, ClinicalHistory, ScalpType, WashFrequency};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHistoryRequest {
    pub patient_id: Uuid,
    pub scalp_type: ScalpType,
    pub wash_frequency: WashFrequency,
    pub trichoscopy: Option<String>,
    pub alopecia_type: AlopeciaType,
    pub observations: Option<String>,
}

/// Merge-style update: absent and `null` fields both mean "leave as is".
/// Optional fields can be overwritten but not cleared back to null.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHistoryRequest {
    pub scalp_type: Option<ScalpType>,
    pub wash_frequency: Option<WashFrequency>,
    pub trichoscopy: Option<String>,
    pub alopecia_type: Option<AlopeciaType>,
    pub observations: Option<String>,
}

/// `POST /historial`
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(payload): Json<CreateHistoryRequest>,
) -> Result<(StatusCode, Json<ClinicalHistory>), ApiError> {
    let conn = ctx.conn()?;
    if !repo::patient_exists(&conn, &payload.patient_id)? {
        return Err(ApiError::NotFound("Patient not found".into()));
    }

    let history = ClinicalHistory {
        id: Uuid::new_v4(),
        patient_id: payload.patient_id,
        scalp_type: payload.scalp_type,
        wash_frequency: payload.wash_frequency,
        trichoscopy: payload.trichoscopy,
        alopecia_type: payload.alopecia_type,
        observations: payload.observations,
        created_at: Utc::now(),
    };
    repo::insert_history(&conn, &history)?;
    Ok((StatusCode::CREATED, Json(history)))
}

/// `GET /historial/paciente/:patient_id`
pub async fn list_by_patient(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Vec<ClinicalHistory>>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(repo::list_histories_by_patient(&conn, &patient_id)?))
}

/// `GET /historial/:id`
pub async fn get_by_id(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ClinicalHistory>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(repo::get_history(&conn, &id)?))
}

/// `PUT /historial/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateHistoryRequest>,
) -> Result<Json<ClinicalHistory>, ApiError> {
    let conn = ctx.conn()?;
    let mut history = repo::get_history(&conn, &id)?;

    if let Some(scalp_type) = payload.scalp_type {
        history.scalp_type = scalp_type;
    }
    if let Some(wash_frequency) = payload.wash_frequency {
        history.wash_frequency = wash_frequency;
    }
    if payload.trichoscopy.is_some() {
        history.trichoscopy = payload.trichoscopy;
    }
    if let Some(alopecia_type) = payload.alopecia_type {
        history.alopecia_type = alopecia_type;
    }
    if payload.observations.is_some() {
        history.observations = payload.observations;
    }

    repo::update_history(&conn, &history)?;
    Ok(Json(history))
}

/// `DELETE /historial/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.conn()?;
    repo::delete_history(&conn, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
