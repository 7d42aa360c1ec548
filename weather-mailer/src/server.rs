//! HTTP surface: `POST /subscribe`, the optional signup page, 404 for the rest.

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    handler::HandlerWithoutStateExt,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, sync::Arc};
use tower_http::{services::ServeDir, trace::TraceLayer};

use weather_mailer_core::{
    BroadcastKind, Config, NotificationScheduler, ValidationError,
    model::{DEFAULT_LAT, DEFAULT_LON, coordinate_from_json, validate_email},
};

use crate::{app, jobs};

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<NotificationScheduler>,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    #[serde(default)]
    email: Option<serde_json::Value>,
    #[serde(default)]
    lat: Option<serde_json::Value>,
    #[serde(default)]
    lon: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: &'static str,
}

#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    Internal(weather_mailer_core::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(_) => {
                (StatusCode::BAD_REQUEST, Json(MessageBody { message: "Invalid email" }))
                    .into_response()
            }
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "error subscribing");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(MessageBody { message: "Server error" }))
                    .into_response()
            }
        }
    }
}

pub fn build_app(state: AppState, static_dir: Option<&Path>) -> Router {
    let router = Router::new().route("/subscribe", post(subscribe).fallback(not_found));

    let router = match static_dir {
        Some(dir) => {
            router.fallback_service(ServeDir::new(dir).not_found_service(not_found.into_service()))
        }
        None => router.fallback(not_found),
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn subscribe(
    State(state): State<AppState>,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Json<MessageBody>, ApiError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::info!(error = %rejection, "unreadable subscription request");
            return Err(ApiError::Validation(ValidationError::InvalidEmail));
        }
    };
    tracing::info!(?request, "received subscription request");

    let email = validate_email(request.email.as_ref().and_then(serde_json::Value::as_str))
        .map_err(|e| {
            tracing::info!(email = ?request.email, "invalid email provided");
            ApiError::Validation(e)
        })?;

    let lat = request.lat.as_ref().map_or(DEFAULT_LAT, coordinate_from_json);
    let lon = request.lon.as_ref().map_or(DEFAULT_LON, coordinate_from_json);

    let scheduler = &state.scheduler;
    scheduler
        .subscribers()
        .subscribe(email)
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;

    tracing::info!(email, lat, lon, "sending initial email");
    scheduler.send_now(lat, lon, BroadcastKind::Regular).await;

    tracing::info!(email, "scheduling follow-up email");
    scheduler.schedule_follow_up(lat, lon);

    Ok(Json(MessageBody { message: "Subscribed! You’ll get your updates soon." }))
}

async fn not_found(uri: Uri) -> (StatusCode, &'static str) {
    tracing::info!(%uri, "requested unknown route");
    (StatusCode::NOT_FOUND, "Not Found")
}

/// Run the HTTP server and the daily job until a shutdown signal arrives.
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let mailer = app::smtp_mailer(config)?;
    let scheduler = Arc::new(app::build_scheduler(config, mailer.clone())?);

    tokio::spawn(async move {
        match mailer.verify().await {
            Ok(true) => tracing::info!("email configuration verified successfully"),
            Ok(false) => tracing::warn!("mail relay refused the connection test"),
            Err(e) => tracing::error!(error = %e, "email configuration error"),
        }
    });

    let mut jobs = jobs::build_job_scheduler(Arc::clone(&scheduler), &config.schedule).await?;

    let app = build_app(
        AppState { scheduler: Arc::clone(&scheduler) },
        config.server.static_dir.as_deref(),
    );

    let port = config.server.port;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| {
        format!("Port {port} is in use or unavailable. Try a different port via PORT or server.port")
    })?;

    tracing::info!("server ready at http://localhost:{port}");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    scheduler.shutdown();
    jobs.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
