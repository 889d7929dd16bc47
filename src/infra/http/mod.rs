//! JSON API over the record repositories.

mod error;
mod handlers;
mod middleware;
mod models;
mod state;

pub use error::{ApiError, ApiErrorBody};
pub use handlers::Resource;
pub use models::{HealthResponse, NewPatient, NewPrescription};
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::application::error::ErrorReport;
use crate::application::repos::Database;
use crate::domain::entities::{PatientRecord, PrescriptionRecord};
use crate::infra::error::InfraError;

use handlers::{create, list, patient_prescriptions, remove, show, update};
use middleware::{log_responses, set_request_context};

pub fn build_router<D: Database>(state: AppState<D>) -> Router {
    Router::new()
        .route("/health", get(health::<D>))
        .route(
            "/api/patients",
            get(list::<D, PatientRecord>).post(create::<D, PatientRecord>),
        )
        .route(
            "/api/patients/{id}",
            get(show::<D, PatientRecord>)
                .patch(update::<D, PatientRecord>)
                .delete(remove::<D, PatientRecord>),
        )
        .route(
            "/api/patients/{id}/prescriptions",
            get(patient_prescriptions::<D>),
        )
        .route(
            "/api/prescriptions",
            get(list::<D, PrescriptionRecord>).post(create::<D, PrescriptionRecord>),
        )
        .route(
            "/api/prescriptions/{id}",
            get(show::<D, PrescriptionRecord>)
                .patch(update::<D, PrescriptionRecord>)
                .delete(remove::<D, PrescriptionRecord>),
        )
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn health<D: Database>(State(state): State<AppState<D>>) -> Response {
    match state.db.health_check().await {
        Ok(()) => Json(HealthResponse { status: "ok" }).into_response(),
        Err(err) => {
            let body = ApiErrorBody {
                error: err.to_string(),
            };
            let mut response = (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response();
            ErrorReport::from_error(
                "infra::http::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "not found")
}

async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
}

/// Serve `router` on `addr` until `shutdown` resolves.
///
/// In-flight requests get `grace` to finish once shutdown starts; after that
/// the server is dropped.
pub async fn serve<F>(
    addr: SocketAddr,
    router: Router,
    shutdown: F,
    grace: Duration,
) -> Result<(), InfraError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
    let signal = async move {
        shutdown.await;
        let _ = started_tx.send(());
        info!("shutdown requested; draining connections");
    };

    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(signal);
    let server = std::pin::pin!(server.into_future());

    tokio::select! {
        result = server => result.map_err(InfraError::from),
        () = async {
            if started_rx.await.is_ok() {
                tokio::time::sleep(grace).await;
            } else {
                std::future::pending::<()>().await;
            }
        } => {
            warn!(grace_secs = grace.as_secs(), "graceful shutdown timed out");
            Ok(())
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
