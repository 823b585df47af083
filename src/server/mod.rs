//! HTTP front end for the calendar filter.
//!
//! Routes:
//! - `GET /filter?url=<feed>&months=<n>`: fetch `url` through the shared
//!   [`FetchCache`], drop events older than `n` months, return `text/calendar`.
//! - `GET /healthcheck`: liveness probe, answers `ok`.
//!
//! Error bodies are JSON. Fetch failures carry the upstream status and body
//! so a broken feed can be diagnosed from the response alone.

pub mod config;

use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::calendar::{Calendar, cutoff_for_months};
use crate::error::FetchError;
use crate::fetch::{FetchCache, FetchContext};
use config::Config;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: FetchCache,
    /// Deadline budget for one upstream fetch; `None` waits indefinitely.
    pub fetch_timeout: Option<Duration>,
    /// Months of history kept when the request does not say.
    pub default_months: u32,
}

impl AppState {
    pub fn new(fetcher: FetchCache, config: &Config) -> Self {
        Self {
            fetcher,
            fetch_timeout: config.fetch_timeout(),
            default_months: config.filter.default_months,
        }
    }
}

/// Build the daemon's router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/filter", get(filter))
        .route("/healthcheck", get(healthcheck))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Query string of `/filter`. Both fields are validated by hand so that
/// bad input gets the JSON error body rather than axum's plain-text one.
#[derive(Debug, Deserialize)]
pub struct FilterParams {
    url: Option<String>,
    months: Option<String>,
}

async fn filter(State(state): State<AppState>, Query(params): Query<FilterParams>) -> Response {
    let Some(url) = params.url.filter(|url| !url.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "url is required");
    };

    let months = match params.months.as_deref().filter(|m| !m.is_empty()) {
        None => state.default_months,
        Some(raw) => match raw.parse::<i64>() {
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("invalid months {raw:?}: {e}"),
                );
            }
            Ok(m) if m < 0 => {
                return error_response(StatusCode::BAD_REQUEST, "months must be positive");
            }
            Ok(m) => u32::try_from(m).unwrap_or(u32::MAX),
        },
    };

    let ctx = match state.fetch_timeout {
        Some(timeout) => FetchContext::new().timeout(timeout),
        None => FetchContext::new(),
    };
    let payload = match state.fetcher.fetch(&ctx, &url).await {
        Ok(payload) => payload,
        Err(e) => return fetch_error_response(&url, &e),
    };

    let mut calendar = match Calendar::parse(&String::from_utf8_lossy(&payload.body)) {
        Ok(calendar) => calendar,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    let stats = calendar.filter_before(cutoff_for_months(Utc::now(), months));
    debug!(%url, months, removed = stats.removed, kept = stats.kept, "serving filtered calendar");

    (
        [(header::CONTENT_TYPE, "text/calendar; charset=UTF-8")],
        calendar.to_ics(),
    )
        .into_response()
}

async fn healthcheck() -> &'static str {
    "ok\n"
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn fetch_error_response(url: &str, error: &FetchError) -> Response {
    warn!(%url, %error, "fetch failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "message": error.to_string(),
            "status": error.status().unwrap_or(0),
            "response": String::from_utf8_lossy(error.body()),
        })),
    )
        .into_response()
}
