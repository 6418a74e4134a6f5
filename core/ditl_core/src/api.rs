use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::activity::{parse_ts, ActivityUpdate};
use crate::calendar::{parse_date, Calendar, Scope};
use crate::clock::Clock;
use crate::error::StoreError;
use crate::quick_start::quick_start_titles;
use crate::running::{EndOutcome, RunningActivityGuard, StartOutcome};
use crate::settings::{
    normalize_tz_offset_minutes, tz_offset_from_minutes, Settings, SettingsUpdate,
};
use crate::stats::PeriodAggregator;
use crate::store::ActivityStore;
use crate::timeline::day_timeline;

/// Tolerance used by the clip collaborator when it does not send one.
const DEFAULT_TOLERANCE_SECONDS: i64 = 120;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<ActivityStore>>,
    pub settings: Arc<Mutex<Settings>>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(mut store: ActivityStore, settings: Settings, clock: Arc<dyn Clock>) -> Self {
        store.set_missing_id_policy(settings.missing_ids);
        Self {
            store: Arc::new(Mutex::new(store)),
            settings: Arc::new(Mutex::new(settings)),
            clock,
        }
    }
}

#[derive(Serialize)]
struct OkResponse<T: Serialize> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

#[derive(Serialize)]
struct ErrResponse {
    ok: bool,
    error: &'static str,
}

#[derive(Deserialize)]
struct DayQuery {
    /// Date in YYYY-MM-DD; defaults to today.
    date: Option<String>,
    /// Client local offset minutes, e.g. 480 for UTC+8.
    tz_offset_minutes: Option<i32>,
}

#[derive(Deserialize)]
struct StatsQuery {
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    offset: Option<i64>,
    tz_offset_minutes: Option<i32>,
}

#[derive(Deserialize)]
struct StartRequest {
    title: String,
}

#[derive(Deserialize)]
struct CreateRequest {
    title: String,
    start_ts: String,
    #[serde(default)]
    end_ts: Option<String>,
    #[serde(default)]
    duration_minutes: Option<i64>,
}

#[derive(Deserialize, Default)]
struct UpdateRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    start_ts: Option<String>,
    #[serde(default)]
    end_ts: Option<String>,
    #[serde(default)]
    duration_minutes: Option<i64>,
}

#[derive(Deserialize)]
struct FindOrCreateRequest {
    title: String,
    approx_start_ts: String,
    #[serde(default)]
    tolerance_seconds: Option<i64>,
}

#[derive(Serialize)]
struct CreatedResult {
    id: i64,
}

#[derive(Serialize)]
struct WipeResult {
    activities_deleted: i64,
}

#[derive(Serialize)]
struct HealthInfo {
    service: &'static str,
    version: &'static str,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/timeline/day", get(get_timeline_day))
        .route("/running", get(get_running))
        .route("/running/start", post(post_running_start).options(options_ok))
        .route("/running/end", post(post_running_end).options(options_ok))
        .route("/activities", post(post_activity).options(options_ok))
        .route(
            "/activities/find_or_create",
            post(post_find_or_create).options(options_ok),
        )
        .route(
            "/activities/:id",
            get(get_activity)
                .patch(patch_activity)
                .post(patch_activity)
                .delete(delete_activity)
                .options(options_ok),
        )
        .route("/stats", get(get_stats))
        .route("/quick_start", get(get_quick_start))
        .route(
            "/settings",
            get(get_settings).post(post_settings).options(options_ok),
        )
        .route("/data/wipe", post(post_data_wipe).options(options_ok))
        .with_state(state)
        .layer(cors)
}

fn ok_data<T: Serialize>(data: T) -> Response {
    Json(OkResponse {
        ok: true,
        data: Some(data),
    })
    .into_response()
}

fn ok_empty() -> Response {
    Json(OkResponse::<Value> { ok: true, data: None }).into_response()
}

fn error_response(status: StatusCode, error: &'static str) -> Response {
    (status, Json(ErrResponse { ok: false, error })).into_response()
}

fn store_error_response(op: &str, err: StoreError) -> Response {
    match err {
        StoreError::Validation(v) => error_response(StatusCode::BAD_REQUEST, v.code()),
        StoreError::NotFound(_) => error_response(StatusCode::NOT_FOUND, "not_found"),
        StoreError::AlreadyRunning(_) => error_response(StatusCode::CONFLICT, "already_running"),
        StoreError::Sqlite(err) => {
            error!("{op} failed: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "db_error")
        }
    }
}

fn calendar_for(settings: &Settings, tz_offset_minutes: Option<i32>) -> Calendar {
    match tz_offset_minutes {
        Some(m) => Calendar::new(tz_offset_from_minutes(normalize_tz_offset_minutes(Some(m)))),
        None => settings.calendar(),
    }
}

/// Parses an optional RFC 3339 field; `Err` means present but unparseable.
fn parse_opt_ts(raw: Option<&str>) -> Result<Option<time::OffsetDateTime>, ()> {
    match raw {
        None => Ok(None),
        Some(s) => parse_ts(s).map(Some).ok_or(()),
    }
}

async fn options_ok() -> impl IntoResponse {
    StatusCode::OK
}

async fn health() -> Response {
    ok_data(HealthInfo {
        service: "ditl_core",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn get_timeline_day(State(state): State<AppState>, Query(q): Query<DayQuery>) -> Response {
    let now = state.clock.now();
    let calendar = {
        let settings = state.settings.lock().await;
        calendar_for(&settings, q.tz_offset_minutes)
    };

    let date = match q.date {
        Some(s) => match parse_date(&s) {
            Ok(d) => d,
            Err(_) => return error_response(StatusCode::BAD_REQUEST, "invalid_date"),
        },
        None => calendar.local_date(now),
    };

    let store = state.store.lock().await;
    ok_data(day_timeline(&store, &calendar, date, now))
}

async fn get_running(State(state): State<AppState>) -> Response {
    let mut store = state.store.lock().await;
    match RunningActivityGuard::new(&mut store).state() {
        Ok(s) => ok_data(s),
        Err(err) => store_error_response("running state", err),
    }
}

async fn post_running_start(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Response {
    let now = state.clock.now();
    let mut store = state.store.lock().await;
    match RunningActivityGuard::new(&mut store).start(&req.title, now) {
        Ok(StartOutcome::Started(activity)) => ok_data(activity),
        Ok(StartOutcome::Rejected(_)) => error_response(StatusCode::CONFLICT, "already_running"),
        Err(err) => store_error_response("start", err),
    }
}

async fn post_running_end(State(state): State<AppState>) -> Response {
    let now = state.clock.now();
    let mut store = state.store.lock().await;
    match RunningActivityGuard::new(&mut store).end(now) {
        Ok(EndOutcome::Ended(activity)) => ok_data(activity),
        Ok(EndOutcome::NotRunning) => error_response(StatusCode::CONFLICT, "not_running"),
        Err(err) => store_error_response("end", err),
    }
}

async fn post_activity(State(state): State<AppState>, Json(req): Json<CreateRequest>) -> Response {
    let Some(start) = parse_ts(&req.start_ts) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid_ts");
    };
    let Ok(end) = parse_opt_ts(req.end_ts.as_deref()) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid_ts");
    };

    let mut store = state.store.lock().await;
    match store.create(&req.title, start, end, req.duration_minutes) {
        Ok(id) => ok_data(CreatedResult { id }),
        Err(err) => store_error_response("create", err),
    }
}

async fn get_activity(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let store = state.store.lock().await;
    match store.read(id) {
        Ok(Some(activity)) => ok_data(activity),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "not_found"),
        Err(err) => store_error_response("read", err),
    }
}

async fn patch_activity(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRequest>,
) -> Response {
    let (Ok(start_time), Ok(end_time)) = (
        parse_opt_ts(req.start_ts.as_deref()),
        parse_opt_ts(req.end_ts.as_deref()),
    ) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid_ts");
    };
    let changes = ActivityUpdate {
        title: req.title,
        start_time,
        end_time,
        duration_minutes: req.duration_minutes,
    };

    let mut store = state.store.lock().await;
    if let Err(err) = store.update(id, &changes) {
        return store_error_response("update", err);
    }
    match store.read(id) {
        Ok(Some(activity)) => ok_data(activity),
        Ok(None) => ok_empty(),
        Err(err) => store_error_response("read", err),
    }
}

async fn delete_activity(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let mut store = state.store.lock().await;
    match store.delete(id) {
        Ok(()) => ok_empty(),
        Err(err) => store_error_response("delete", err),
    }
}

async fn post_find_or_create(
    State(state): State<AppState>,
    Json(req): Json<FindOrCreateRequest>,
) -> Response {
    let Some(approx_start) = parse_ts(&req.approx_start_ts) else {
        return error_response(StatusCode::BAD_REQUEST, "invalid_ts");
    };
    let tolerance = req.tolerance_seconds.unwrap_or(DEFAULT_TOLERANCE_SECONDS);

    let mut store = state.store.lock().await;
    match store.find_or_create(&req.title, approx_start, tolerance) {
        Ok(activity) => ok_data(activity),
        Err(err) => store_error_response("find_or_create", err),
    }
}

async fn get_stats(State(state): State<AppState>, Query(q): Query<StatsQuery>) -> Response {
    let scope = match q.scope.as_deref() {
        None => Scope::Week,
        Some(name) => match Scope::from_name(name) {
            Some(scope) => scope,
            None => return error_response(StatusCode::BAD_REQUEST, "invalid_scope"),
        },
    };
    let offset = match q.offset.map(u32::try_from) {
        None => 0,
        Some(Ok(offset)) => offset,
        Some(Err(_)) => return error_response(StatusCode::BAD_REQUEST, "invalid_offset"),
    };

    let now = state.clock.now();
    let calendar = {
        let settings = state.settings.lock().await;
        calendar_for(&settings, q.tz_offset_minutes)
    };

    let store = state.store.lock().await;
    ok_data(PeriodAggregator::new(&store, calendar).stats(scope, offset, now))
}

async fn get_quick_start(State(state): State<AppState>) -> Response {
    let defaults = { state.settings.lock().await.quick_start_defaults.clone() };
    let store = state.store.lock().await;
    ok_data(quick_start_titles(&store, &defaults))
}

async fn get_settings(State(state): State<AppState>) -> Response {
    let settings = { state.settings.lock().await.clone() };
    ok_data(settings)
}

async fn post_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Response {
    let mut store = state.store.lock().await;
    let mut settings = state.settings.lock().await;
    let next = settings.apply(update);

    if let Err(err) = store.save_settings(&next) {
        return store_error_response("save settings", err);
    }
    store.set_missing_id_policy(next.missing_ids);
    *settings = next.clone();
    info!(
        tz_offset_minutes = next.tz_offset_minutes,
        missing_ids = next.missing_ids.as_str(),
        "settings updated"
    );
    ok_data(next)
}

async fn post_data_wipe(State(state): State<AppState>) -> Response {
    let mut store = state.store.lock().await;
    match store.wipe() {
        Ok(n) => ok_data(WipeResult {
            activities_deleted: n as i64,
        }),
        Err(err) => store_error_response("wipe", err),
    }
}
