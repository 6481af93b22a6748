//! Appointment endpoints under `/citas`.
//!
//! Availability is a set difference against the fixed half-hour grid,
//! recomputed on every call. DELETE cancels the appointment instead of
//! removing it, which frees the slot while keeping the visit on record.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository as repo;
use crate::models::{free_slots, is_valid_slot, Appointment, AppointmentStatus, ConsultType};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub slot: String,
    pub consult_type: ConsultType,
    pub duration_minutes: Option<i32>,
    pub notes: Option<String>,
}

/// `POST /citas`
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(payload): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    if !is_valid_slot(&payload.slot) {
        return Err(ApiError::BadRequest(format!(
            "{} is not a bookable slot",
            payload.slot
        )));
    }

    let conn = ctx.conn()?;
    if !repo::patient_exists(&conn, &payload.patient_id)? {
        return Err(ApiError::NotFound("Patient not found".into()));
    }
    let booked = repo::booked_slots(&conn, payload.date)?;
    if booked.iter().any(|b| b == &payload.slot) {
        return Err(ApiError::BadRequest(format!(
            "slot {} on {} is already booked",
            payload.slot, payload.date
        )));
    }

    let now = Utc::now();
    let appointment = Appointment {
        id: Uuid::new_v4(),
        patient_id: payload.patient_id,
        date: payload.date,
        slot: payload.slot,
        duration_minutes: payload.duration_minutes.unwrap_or(30),
        consult_type: payload.consult_type,
        status: AppointmentStatus::Programada,
        payment_id: None,
        notes: payload.notes,
        created_at: now,
        updated_at: now,
    };
    repo::insert_appointment(&conn, &appointment)?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub fecha: NaiveDate,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub date: NaiveDate,
    pub free: Vec<&'static str>,
}

/// `GET /citas/disponibilidad?fecha=YYYY-MM-DD`
pub async fn availability(
    State(ctx): State<ApiContext>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let conn = ctx.conn()?;
    let booked = repo::booked_slots(&conn, query.fecha)?;
    Ok(Json(AvailabilityResponse {
        date: query.fecha,
        free: free_slots(&booked),
    }))
}

/// `GET /citas/paciente/:patient_id`
pub async fn list_by_patient(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Vec<Appointment>>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(repo::list_appointments_by_patient(&conn, &patient_id)?))
}

/// `GET /citas/:id`
pub async fn get_by_id(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(repo::get_appointment(&conn, &id)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentRequest {
    pub date: Option<NaiveDate>,
    pub slot: Option<String>,
    pub consult_type: Option<ConsultType>,
    pub status: Option<AppointmentStatus>,
    pub duration_minutes: Option<i32>,
    pub notes: Option<String>,
}

/// `PUT /citas/:id` — reschedule or change status. A new slot must be free
/// on the target date.
pub async fn update(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAppointmentRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let conn = ctx.conn()?;
    let original = repo::get_appointment(&conn, &id)?;
    let mut appointment = original.clone();

    if let Some(date) = payload.date {
        appointment.date = date;
    }
    if let Some(slot) = payload.slot {
        if !is_valid_slot(&slot) {
            return Err(ApiError::BadRequest(format!("{slot} is not a bookable slot")));
        }
        appointment.slot = slot;
    }
    let moved = appointment.date != original.date || appointment.slot != original.slot;
    if moved {
        let booked = repo::booked_slots(&conn, appointment.date)?;
        if booked.iter().any(|b| b == &appointment.slot) {
            return Err(ApiError::BadRequest(format!(
                "slot {} on {} is already booked",
                appointment.slot, appointment.date
            )));
        }
    }
    if let Some(consult_type) = payload.consult_type {
        appointment.consult_type = consult_type;
    }
    if let Some(status) = payload.status {
        appointment.status = status;
    }
    if let Some(duration) = payload.duration_minutes {
        appointment.duration_minutes = duration;
    }
    if let Some(notes) = payload.notes {
        appointment.notes = Some(notes);
    }

    repo::update_appointment(&conn, &appointment, Utc::now())?;
    Ok(Json(repo::get_appointment(&conn, &id)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPaymentRequest {
    pub payment_id: Uuid,
}

/// `PUT /citas/:id/pago` — link both directions so either record can reach
/// the other.
pub async fn link_payment(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LinkPaymentRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let conn = ctx.conn()?;
    repo::get_payment(&conn, &payload.payment_id)?;
    repo::link_payment(&conn, &id, &payload.payment_id, Utc::now())?;
    repo::link_appointment(&conn, &payload.payment_id, &id)?;
    Ok(Json(repo::get_appointment(&conn, &id)?))
}

/// `DELETE /citas/:id` — cancellation, the row stays.
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Appointment>, ApiError> {
    let conn = ctx.conn()?;
    repo::cancel_appointment(&conn, &id, Utc::now())?;
    Ok(Json(repo::get_appointment(&conn, &id)?))
}
