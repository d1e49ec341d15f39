use crate::{
    digest::subject_for,
    event::Event,
    mailer::SharedNotifier,
    store::{SharedStore, load_events_or_empty},
    summary::{is_no_events_text, summarize},
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use thiserror::Error;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

const TEST_EMAIL_SUBJECT: &str = "Test Email - Eat-Poop-Sleep Tracker";

#[derive(Clone)]
pub struct ServiceState {
    pub store: SharedStore,
    pub notifier: SharedNotifier,
    pub recipients: Arc<Vec<String>>,
    /// Human readable send time mentioned in the test email, e.g. `23:59`.
    pub schedule_label: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    fn success(message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::OK,
            Json(Self {
                status: "success".to_string(),
                message: message.into(),
            }),
        )
    }

    fn error(code: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            code,
            Json(Self {
                status: "error".to_string(),
                message: message.into(),
            }),
        )
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
struct SendSummaryRequest {
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SaveEventsRequest {
    #[serde(default)]
    events: Vec<Event>,
}

/// Malformed request input, answered with 400.
#[derive(Debug, Error)]
enum RequestError {
    #[error("invalid JSON body: {0}")]
    Body(#[from] serde_json::Error),
    #[error("invalid date `{0}`, expected YYYY-MM-DD")]
    Date(String),
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        StatusResponse::error(StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

pub fn router(state: ServiceState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/test-email", post(test_email))
        .route("/send-summary", post(send_summary))
        .route("/save-events", post(save_events))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

pub struct ServerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<Result<()>>,
}

pub async fn spawn(listen_addr: &str, state: ServiceState) -> Result<ServerHandle> {
    let addr: SocketAddr = listen_addr
        .parse()
        .with_context(|| "failed to parse listen_addr")?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| "failed to bind http listener")?;
    let router = router(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let join = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .map_err(|err| anyhow!(err))
    });

    tracing::info!(listen = %addr, "http service started");

    Ok(ServerHandle {
        shutdown: Some(shutdown_tx),
        join,
    })
}

impl ServerHandle {
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.join.await {
            Ok(result) => result,
            Err(err) => Err(anyhow!(err)),
        }
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
    })
}

async fn test_email(State(state): State<Arc<ServiceState>>) -> impl IntoResponse {
    let schedule = match &state.schedule_label {
        Some(at) => format!("The daily summary emails will be sent automatically at {at} each day."),
        None => "Automatic daily summary emails are disabled on this service.".to_string(),
    };
    let body = format!(
        "This is a test email from the Eat-Poop-Sleep tracker backend service.\n\n\
         If you're receiving this, the email configuration is working correctly!\n\n\
         {schedule}\n"
    );

    if state
        .notifier
        .send(TEST_EMAIL_SUBJECT, &body, &state.recipients)
        .await
    {
        StatusResponse::success("Test email sent successfully")
    } else {
        StatusResponse::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to send test email. Check server logs.",
        )
    }
}

async fn send_summary(
    State(state): State<Arc<ServiceState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<StatusResponse>), RequestError> {
    let request = parse_summary_request(&body)?;
    let date = match request.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| RequestError::Date(raw.to_string()))?,
        None => Local::now().date_naive(),
    };

    let events = load_events_or_empty(state.store.as_ref()).await;
    let text = summarize(&events, date).to_string();
    tracing::info!(%date, empty_day = is_no_events_text(&text), "manual summary requested");

    let sent = state
        .notifier
        .send(&subject_for(date), &text, &state.recipients)
        .await;

    Ok(if sent {
        StatusResponse::success("Summary sent successfully")
    } else {
        StatusResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to send summary")
    })
}

fn parse_summary_request(body: &[u8]) -> Result<SendSummaryRequest, RequestError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SendSummaryRequest::default());
    }
    let request: Option<SendSummaryRequest> = serde_json::from_slice(body)?;
    Ok(request.unwrap_or_default())
}

async fn save_events(
    State(state): State<Arc<ServiceState>>,
    Json(request): Json<SaveEventsRequest>,
) -> impl IntoResponse {
    match state.store.save(&request.events).await {
        Ok(()) => StatusResponse::success("Events saved"),
        Err(err) => {
            tracing::error!(error = %err, "failed to save events");
            StatusResponse::error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}
