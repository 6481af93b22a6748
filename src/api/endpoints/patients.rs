//! Patient endpoints.
//!
//! CRUD under `/pacientes`, plus `POST /pacientes/completo` which creates a
//! patient together with their first clinical history in one transaction.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository as repo;
use crate::models::{AlopeciaType, ClinicalHistory, Patient, ScalpType, WashFrequency};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatientRequest {
    pub full_name: String,
    pub dni: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub allergies: Option<String>,
    pub sleep_hours: Option<i32>,
    pub insurance: Option<String>,
    pub shampoo_type: Option<String>,
}

impl CreatePatientRequest {
    fn into_patient(self) -> Result<Patient, ApiError> {
        if self.full_name.trim().is_empty() {
            return Err(ApiError::BadRequest("fullName is required".into()));
        }
        if self.dni.trim().is_empty() {
            return Err(ApiError::BadRequest("dni is required".into()));
        }
        Ok(Patient {
            id: Uuid::new_v4(),
            full_name: self.full_name.trim().to_string(),
            dni: self.dni.trim().to_string(),
            email: self.email,
            phone: self.phone,
            birth_date: self.birth_date,
            address: self.address,
            allergies: self.allergies,
            sleep_hours: self.sleep_hours,
            insurance: self.insurance,
            shampoo_type: self.shampoo_type,
            created_at: Utc::now(),
        })
    }
}

/// Merge-style update: absent and `null` fields both mean "leave as is".
/// Optional fields can be overwritten but not cleared back to null.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePatientRequest {
    pub full_name: Option<String>,
    pub dni: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub allergies: Option<String>,
    pub sleep_hours: Option<i32>,
    pub insurance: Option<String>,
    pub shampoo_type: Option<String>,
}

/// `POST /pacientes` — intake form submit.
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(payload): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let patient = payload.into_patient()?;
    let conn = ctx.conn()?;
    repo::insert_patient(&conn, &patient)?;
    tracing::info!(patient = %patient.id, "patient created");
    Ok((StatusCode::CREATED, Json(patient)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFullRequest {
    #[serde(flatten)]
    pub patient: CreatePatientRequest,
    pub history: HistoryFields,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryFields {
    pub scalp_type: ScalpType,
    pub wash_frequency: WashFrequency,
    pub trichoscopy: Option<String>,
    pub alopecia_type: AlopeciaType,
    pub observations: Option<String>,
}

/// `POST /pacientes/completo` — patient plus first clinical history,
/// atomically.
pub async fn create_full(
    State(ctx): State<ApiContext>,
    Json(payload): Json<CreateFullRequest>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let patient = payload.patient.into_patient()?;
    let history = ClinicalHistory {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        scalp_type: payload.history.scalp_type,
        wash_frequency: payload.history.wash_frequency,
        trichoscopy: payload.history.trichoscopy,
        alopecia_type: payload.history.alopecia_type,
        observations: payload.history.observations,
        created_at: patient.created_at,
    };

    let mut conn = ctx.conn()?;
    repo::insert_patient_with_history(&mut conn, &patient, &history)?;
    tracing::info!(patient = %patient.id, "patient created with initial history");
    Ok((StatusCode::CREATED, Json(patient)))
}

/// `GET /pacientes`
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<Patient>>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(repo::list_patients(&conn)?))
}

/// `GET /pacientes/:id`
pub async fn get_by_id(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Patient>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(repo::get_patient(&conn, &id)?))
}

/// `PUT /pacientes/:id` — partial update over the stored document.
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePatientRequest>,
) -> Result<Json<Patient>, ApiError> {
    let conn = ctx.conn()?;
    let mut patient = repo::get_patient(&conn, &id)?;

    if let Some(full_name) = payload.full_name {
        if full_name.trim().is_empty() {
            return Err(ApiError::BadRequest("fullName cannot be empty".into()));
        }
        patient.full_name = full_name.trim().to_string();
    }
    if let Some(dni) = payload.dni {
        if dni.trim().is_empty() {
            return Err(ApiError::BadRequest("dni cannot be empty".into()));
        }
        patient.dni = dni.trim().to_string();
    }
    if payload.email.is_some() {
        patient.email = payload.email;
    }
    if payload.phone.is_some() {
        patient.phone = payload.phone;
    }
    if payload.birth_date.is_some() {
        patient.birth_date = payload.birth_date;
    }
    if payload.address.is_some() {
        patient.address = payload.address;
    }
    if payload.allergies.is_some() {
        patient.allergies = payload.allergies;
    }
    if payload.sleep_hours.is_some() {
        patient.sleep_hours = payload.sleep_hours;
    }
    if payload.insurance.is_some() {
        patient.insurance = payload.insurance;
    }
    if payload.shampoo_type.is_some() {
        patient.shampoo_type = payload.shampoo_type;
    }

    repo::update_patient(&conn, &patient)?;
    Ok(Json(patient))
}

/// `DELETE /pacientes/:id` — hard delete, child records stay behind.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.conn()?;
    repo::delete_patient(&conn, &id)?;
    tracing::info!(patient = %id, "patient deleted");
    Ok(StatusCode::NO_CONTENT)
}
