//! Payment endpoints under `/pagos`.
//!
//! The Mercado Pago preference endpoint is a stub: it fabricates a
//! preference id and checkout URL locally and never talks to the gateway.
//! The data shape matches what the real integration would return, so the
//! swap stays contained to `create_preference`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository as repo;
use crate::db::repository::PaymentStatistics;
use crate::models::{Payment, PaymentMethod, PaymentStatus, TreatmentPlan};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub patient_id: Uuid,
    pub plan: TreatmentPlan,
    pub amount: f64,
    pub appointment_id: Option<Uuid>,
}

/// `POST /pagos`
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(payload): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), ApiError> {
    if payload.amount <= 0.0 {
        return Err(ApiError::BadRequest("amount must be positive".into()));
    }

    let mut conn = ctx.conn()?;
    if !repo::patient_exists(&conn, &payload.patient_id)? {
        return Err(ApiError::NotFound("Patient not found".into()));
    }

    let mut payment = Payment::new(payload.patient_id, payload.plan, payload.amount, Utc::now());
    if let Some(appointment_id) = payload.appointment_id {
        repo::get_appointment(&conn, &appointment_id)?;
        payment.appointment_id = Some(appointment_id);
    }
    repo::insert_payment_with_link(&mut conn, &payment)?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// `GET /pagos/:id`
pub async fn get_by_id(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(repo::get_payment(&conn, &id)?))
}

/// `GET /pagos/paciente/:patient_id`
pub async fn list_by_patient(
    State(ctx): State<ApiContext>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(repo::list_payments_by_patient(&conn, &patient_id)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: PaymentStatus,
}

/// `PUT /pagos/:id/estado` — the due date stays as issued, status changes
/// never recompute it.
pub async fn update_payment_status(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Payment>, ApiError> {
    let conn = ctx.conn()?;
    repo::update_payment_status(&conn, &id, payload.status)?;
    Ok(Json(repo::get_payment(&conn, &id)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMethodRequest {
    #[serde(flatten)]
    pub method: PaymentMethod,
}

/// `PUT /pagos/:id/metodo` — record how the payment was settled.
pub async fn set_method(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetMethodRequest>,
) -> Result<Json<Payment>, ApiError> {
    let conn = ctx.conn()?;
    repo::set_method(&conn, &id, &payload.method)?;
    Ok(Json(repo::get_payment(&conn, &id)?))
}

/// `POST /pagos/:id/usar-sesion` — consume one session off a paid payment.
pub async fn use_session(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>, ApiError> {
    let mut conn = ctx.conn()?;
    Ok(Json(repo::use_session(&mut conn, &id)?))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceResponse {
    pub preference_id: String,
    pub init_point: String,
    pub success_url: String,
    pub failure_url: String,
}

/// `POST /pagos/:id/preferencia` — fabricate a checkout preference for the
/// payment and persist it as the payment method.
pub async fn create_preference(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<PreferenceResponse>), ApiError> {
    let conn = ctx.conn()?;
    repo::get_payment(&conn, &id)?;

    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    let preference_id = format!("PREF-{token}");
    let init_point = format!("{}/checkout/{preference_id}", ctx.config.base_url);

    repo::set_method(
        &conn,
        &id,
        &PaymentMethod::MercadoPago {
            preference_id: preference_id.clone(),
            init_point: init_point.clone(),
        },
    )?;

    Ok((
        StatusCode::CREATED,
        Json(PreferenceResponse {
            preference_id,
            init_point,
            success_url: format!("{}/pagos/exito", ctx.config.frontend_url),
            failure_url: format!("{}/pagos/error", ctx.config.frontend_url),
        }),
    ))
}

/// `GET /pagos/alertas` — pending payments whose due-date alert should go
/// out now.
pub async fn alerts(State(ctx): State<ApiContext>) -> Result<Json<Vec<Payment>>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(repo::alertable_payments(&conn, Utc::now())?))
}

/// `POST /pagos/alertas/:id/enviada` — record that the alert went out.
/// Terminal: the payment never becomes alertable again.
pub async fn mark_alert_sent(
    State(ctx): State<ApiContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>, ApiError> {
    let conn = ctx.conn()?;
    repo::mark_alert_sent(&conn, &id)?;
    Ok(Json(repo::get_payment(&conn, &id)?))
}

/// `GET /pagos/estadisticas`
pub async fn statistics(
    State(ctx): State<ApiContext>,
) -> Result<Json<PaymentStatistics>, ApiError> {
    let conn = ctx.conn()?;
    Ok(Json(repo::statistics(&conn, Utc::now())?))
}
