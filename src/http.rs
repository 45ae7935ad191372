use crate::format::format_memory;
use crate::metrics::Metrics;
use crate::monitor::Monitor;
use crate::network::NetworkCheck;
use crate::preferences::{
    validate_background_alpha, validate_update_interval, ColorTheme, EnabledMetrics, Preferences,
    PreferencesError, PreferencesStore, Rgba,
};
use crate::state::{PanelView, Readings, State as AgentState};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct HttpAppState {
    pub metrics: Arc<Metrics>,
    pub state: Arc<RwLock<AgentState>>,
    pub monitor: Arc<Monitor>,
    pub prefs: Arc<PreferencesStore>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ApiState {
    pub started_at: String,
    pub last_collect_at: Option<String>,
    pub readings: Readings,
    pub memory_total: Option<String>,
    pub panel: PanelView,
    pub keep_awake: bool,
    pub failed_collectors: Vec<&'static str>,
    pub network: Option<NetworkCheck>,
    pub network_error: Option<String>,
}

impl From<&AgentState> for ApiState {
    fn from(value: &AgentState) -> Self {
        Self {
            started_at: rfc3339(value.started_at_unix),
            last_collect_at: (value.last_collect_timestamp_seconds > 0)
                .then(|| rfc3339(value.last_collect_timestamp_seconds)),
            readings: value.readings,
            memory_total: value.readings.memory.map(|m| format_memory(m.total_bytes)),
            panel: value.panel.clone(),
            keep_awake: value.keep_awake,
            failed_collectors: value.failed_collectors.clone(),
            network: value.network.clone(),
            network_error: value.network_error.clone(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct ThemeInfo {
    id: ColorTheme,
    name: &'static str,
    color: Rgba,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct PreferencesPatch {
    update_interval_secs: Option<f64>,
    background_alpha: Option<f64>,
    color_theme: Option<ColorTheme>,
    enabled_metrics: Option<EnabledMetrics>,
    auto_start: Option<bool>,
    window_always_on_top: Option<bool>,
}

impl PreferencesPatch {
    // Ranges are checked up front so a bad field leaves the others untouched.
    fn apply(self, store: &PreferencesStore) -> Result<(), PreferencesError> {
        if let Some(secs) = self.update_interval_secs {
            validate_update_interval(secs)?;
        }
        if let Some(alpha) = self.background_alpha {
            validate_background_alpha(alpha)?;
        }
        if let Some(secs) = self.update_interval_secs {
            store.update_interval(secs)?;
        }
        if let Some(alpha) = self.background_alpha {
            store.update_background_alpha(alpha)?;
        }
        if let Some(theme) = self.color_theme {
            store.update_color_theme(theme)?;
        }
        if let Some(metrics) = self.enabled_metrics {
            store.update_enabled_metrics(metrics)?;
        }
        if let Some(enabled) = self.auto_start {
            store.update_auto_start(enabled)?;
        }
        if let Some(enabled) = self.window_always_on_top {
            store.update_window_always_on_top(enabled)?;
        }
        Ok(())
    }
}

#[derive(Debug, serde::Serialize)]
struct NetworkResponse {
    status: Option<String>,
    check: Option<NetworkCheck>,
    error: Option<String>,
}

pub fn build_router(
    metrics: Arc<Metrics>,
    state: Arc<RwLock<AgentState>>,
    monitor: Arc<Monitor>,
    prefs: Arc<PreferencesStore>,
) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route("/api/state", get(state_handler))
        .route("/api/panel", get(panel_handler))
        .route(
            "/api/preferences",
            get(preferences_handler)
                .put(update_preferences_handler)
                .patch(patch_preferences_handler),
        )
        .route("/api/preferences/reset", post(reset_preferences_handler))
        .route("/api/themes", get(themes_handler))
        .route("/api/network", get(network_handler))
        .route("/api/network/reset-speed", post(reset_speed_handler))
        .route("/api/keep-awake/toggle", post(keep_awake_handler))
        .with_state(HttpAppState {
            metrics,
            state,
            monitor,
            prefs,
        })
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler(State(state): State<HttpAppState>) -> Response {
    state.metrics.inc_scrape_count();
    match state.metrics.encode_metrics() {
        Ok(encoded) => {
            let mut response = Response::new(Body::from(encoded));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("ошибка кодирования метрик: {err}"),
        )
            .into_response(),
    }
}

async fn state_handler(State(state): State<HttpAppState>) -> impl IntoResponse {
    let guard = state.state.read().await;
    Json(ApiState::from(&*guard))
}

async fn panel_handler(State(state): State<HttpAppState>) -> impl IntoResponse {
    let guard = state.state.read().await;
    Json(guard.panel.clone())
}

async fn preferences_handler(State(state): State<HttpAppState>) -> impl IntoResponse {
    Json(state.prefs.current())
}

async fn update_preferences_handler(
    State(state): State<HttpAppState>,
    body: Result<Json<Preferences>, JsonRejection>,
) -> Response {
    let Json(prefs) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    preferences_result(&state, state.prefs.save(prefs))
}

async fn patch_preferences_handler(
    State(state): State<HttpAppState>,
    body: Result<Json<PreferencesPatch>, JsonRejection>,
) -> Response {
    let Json(patch) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    preferences_result(&state, patch.apply(&state.prefs))
}

async fn reset_preferences_handler(State(state): State<HttpAppState>) -> Response {
    preferences_result(&state, state.prefs.reset_to_defaults())
}

fn preferences_result(state: &HttpAppState, result: Result<(), PreferencesError>) -> Response {
    match result {
        Ok(()) => {
            tracing::info!("настройки обновлены через HTTP");
            Json(state.prefs.current()).into_response()
        }
        Err(err @ PreferencesError::Validation(_)) => {
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "не удалось сохранить настройки");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

fn bad_body(rejection: JsonRejection) -> Response {
    (
        StatusCode::BAD_REQUEST,
        format!("некорректное тело запроса: {}", rejection.body_text()),
    )
        .into_response()
}

async fn themes_handler() -> impl IntoResponse {
    let themes: Vec<ThemeInfo> = ColorTheme::ALL
        .iter()
        .map(|t| ThemeInfo {
            id: *t,
            name: t.display_name(),
            color: t.primary_color(),
        })
        .collect();
    Json(themes)
}

async fn network_handler(State(state): State<HttpAppState>) -> impl IntoResponse {
    let guard = state.state.read().await;
    Json(NetworkResponse {
        status: guard.network.as_ref().map(|c| c.report.status_text()),
        check: guard.network.clone(),
        error: guard.network_error.clone(),
    })
}

async fn reset_speed_handler(State(state): State<HttpAppState>) -> impl IntoResponse {
    state.monitor.reset_speed().await;
    StatusCode::NO_CONTENT
}

async fn keep_awake_handler(State(state): State<HttpAppState>) -> Response {
    match state.monitor.toggle_keep_awake().await {
        Ok(enabled) => Json(serde_json::json!({ "keep_awake": enabled })).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "не удалось переключить режим бодрствования");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

fn rfc3339(unix: i64) -> String {
    let st = UNIX_EPOCH + Duration::from_secs(unix.max(0) as u64);
    humantime::format_rfc3339_seconds(st).to_string()
}
