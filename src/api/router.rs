//! Clinic API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Handlers use `State<ApiContext>`; uploaded files are served statically
//! under `/uploads`.
//!
//! NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::api::endpoints::{
    appointments, histories, lab_requests, patients, payments, studies, treatments,
};
use crate::api::types::ApiContext;

/// Request bodies above this size are rejected before the handler runs.
/// Slightly above the per-file upload cap to leave room for form overhead.
const BODY_LIMIT_BYTES: usize = 12 * 1024 * 1024;

/// Build the clinic API router with all routes mounted at the root.
pub fn clinic_router(ctx: ApiContext) -> Router {
    let cors = match ctx.config.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => CorsLayer::permissive(),
    };

    let uploads_dir = ctx.uploads.dir().to_path_buf();

    let api = Router::new()
        .route("/pacientes", post(patients::create).get(patients::list))
        .route("/pacientes/completo", post(patients::create_full))
        .route(
            "/pacientes/:id",
            get(patients::get_by_id)
                .put(patients::update)
                .delete(patients::delete),
        )
        .route("/historial", post(histories::create))
        .route("/historial/paciente/:patient_id", get(histories::list_by_patient))
        .route(
            "/historial/:id",
            get(histories::get_by_id)
                .put(histories::update)
                .delete(histories::delete),
        )
        .route("/tratamientos", post(treatments::create))
        .route(
            "/tratamientos/paciente/:patient_id",
            get(treatments::list_by_patient),
        )
        .route(
            "/tratamientos/:id",
            get(treatments::get_by_id)
                .put(treatments::update)
                .delete(treatments::delete),
        )
        .route(
            "/tratamientos/:id/administracion",
            put(treatments::mark_administration),
        )
        .route("/solicitudes", post(lab_requests::create))
        .route(
            "/solicitudes/paciente/:patient_id",
            get(lab_requests::list_by_patient),
        )
        .route(
            "/solicitudes/:id",
            get(lab_requests::get_by_id).delete(lab_requests::delete),
        )
        .route("/solicitudes/:id/estado", put(lab_requests::update_request_status))
        .route("/solicitudes/:id/resultados", put(lab_requests::enter_results))
        .route("/estudios", post(studies::upload_study))
        .route("/estudios/paciente/:patient_id", get(studies::list_by_patient))
        .route("/estudios/solicitud/:request_id", get(studies::list_by_request))
        .route("/estudios/:id", delete(studies::delete))
        .route("/fotos", post(studies::upload_photo))
        .route(
            "/fotos/paciente/:patient_id",
            get(studies::list_photos_by_patient),
        )
        .route("/citas", post(appointments::create))
        .route("/citas/disponibilidad", get(appointments::availability))
        .route("/citas/paciente/:patient_id", get(appointments::list_by_patient))
        .route(
            "/citas/:id",
            get(appointments::get_by_id)
                .put(appointments::update)
                .delete(appointments::cancel),
        )
        .route("/citas/:id/pago", put(appointments::link_payment))
        .route("/pagos", post(payments::create))
        .route("/pagos/estadisticas", get(payments::statistics))
        .route("/pagos/alertas", get(payments::alerts))
        .route("/pagos/alertas/:id/enviada", post(payments::mark_alert_sent))
        .route("/pagos/paciente/:patient_id", get(payments::list_by_patient))
        .route("/pagos/:id", get(payments::get_by_id))
        .route("/pagos/:id/estado", put(payments::update_payment_status))
        .route("/pagos/:id/metodo", put(payments::set_method))
        .route("/pagos/:id/usar-sesion", post(payments::use_session))
        .route("/pagos/:id/preferencia", post(payments::create_preference))
        .with_state(ctx);

    Router::new()
        .merge(api)
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors)
}
