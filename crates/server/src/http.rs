use serde::Serialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tv_cron::{check_bearer_token, CronScheduler, ScheduleName};
use tv_storage::TaskStore;
use warp::{Filter, Rejection, Reply};

/// Shared state behind the admin HTTP surface (spec §6).
pub struct AppState {
    pub cron: Arc<CronScheduler>,
    pub task_store: Arc<TaskStore>,
    pub cron_api_key: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    service: &'static str,
}

#[derive(Debug, Serialize)]
struct DetailedHealthResponse {
    status: &'static str,
    timestamp: String,
    service: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    latest_completed_report_time: Option<String>,
}

#[derive(Debug)]
struct Unauthorized;
impl warp::reject::Reject for Unauthorized {}

type Boxed = Box<dyn Reply>;

fn with_state(state: Arc<AppState>) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn require_bearer(state: Arc<AppState>) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(|auth: Option<String>, state: Arc<AppState>| async move {
            match check_bearer_token(auth.as_deref(), &state.cron_api_key) {
                Ok(()) => Ok(()),
                Err(_) => Err(warp::reject::custom(Unauthorized)),
            }
        })
        .untuple_one()
}

async fn health() -> Result<Boxed, Rejection> {
    Ok(Box::new(warp::reply::json(&HealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
        service: "tv-server",
    })))
}

async fn health_detailed(state: Arc<AppState>) -> Result<Boxed, Rejection> {
    let latest_completed_report_time =
        state.task_store.get_latest_completed_task().await.ok().flatten().map(|t| t.to_rfc3339());
    Ok(Box::new(warp::reply::json(&DetailedHealthResponse {
        status: "ok",
        timestamp: chrono::Utc::now().to_rfc3339(),
        service: "tv-server",
        latest_completed_report_time,
    })))
}

async fn cron_action(action: String, name: String, state: Arc<AppState>) -> Result<Boxed, Rejection> {
    let schedule = match ScheduleName::parse(&name) {
        Some(s) => s,
        None => {
            return Ok(Box::new(warp::reply::with_status(
                warp::reply::json(&json!({"error": "unknown schedule"})),
                warp::http::StatusCode::NOT_FOUND,
            )))
        }
    };

    let result = match action.as_str() {
        "start" => state.cron.start(schedule).await,
        "stop" => state.cron.stop(schedule).await,
        "trigger" => state.cron.trigger(schedule).await,
        _ => {
            return Ok(Box::new(warp::reply::with_status(
                warp::reply::json(&json!({"error": "unknown action"})),
                warp::http::StatusCode::NOT_FOUND,
            )))
        }
    };

    match result {
        Ok(()) => Ok(Box::new(warp::reply::json(&json!({"ok": true})))),
        Err(e) => Ok(Box::new(warp::reply::with_status(
            warp::reply::json(&json!({"error": e.to_string()})),
            warp::http::StatusCode::INTERNAL_SERVER_ERROR,
        ))),
    }
}

async fn cron_start_all(state: Arc<AppState>) -> Result<Boxed, Rejection> {
    match state.cron.start_all().await {
        Ok(()) => Ok(Box::new(warp::reply::json(&json!({"ok": true})))),
        Err(e) => Ok(Box::new(warp::reply::json(&json!({"error": e.to_string()})))),
    }
}

async fn cron_stop_all(state: Arc<AppState>) -> Result<Boxed, Rejection> {
    match state.cron.stop_all().await {
        Ok(()) => Ok(Box::new(warp::reply::json(&json!({"ok": true})))),
        Err(e) => Ok(Box::new(warp::reply::json(&json!({"error": e.to_string()})))),
    }
}

async fn cron_force_refresh(state: Arc<AppState>) -> Result<Boxed, Rejection> {
    match state.cron.force_refresh_apps().await {
        Ok(count) => Ok(Box::new(warp::reply::json(&json!({"enqueued": count})))),
        Err(e) => Ok(Box::new(warp::reply::json(&json!({"error": e.to_string()})))),
    }
}

async fn cron_status(state: Arc<AppState>) -> Result<Boxed, Rejection> {
    Ok(Box::new(warp::reply::json(&state.cron.status().await)))
}

/// Assembles the full admin surface (spec §6): two open health routes and
/// a bearer-gated cron admin plane.
pub fn routes(state: Arc<AppState>) -> impl Filter<Extract = (Boxed,), Error = Rejection> + Clone {
    let health_route = warp::path("health").and(warp::path::end()).and(warp::get()).and_then(health);

    let health_detailed_route = warp::path!("health" / "detailed")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(health_detailed);

    let cron_action_route = warp::path!("cron" / String / String)
        .and(warp::post())
        .and(require_bearer(state.clone()))
        .and(with_state(state.clone()))
        .and_then(|action: String, name: String, state: Arc<AppState>| cron_action(action, name, state));

    let cron_start_all_route = warp::path!("cron" / "start-all")
        .and(warp::post())
        .and(require_bearer(state.clone()))
        .and(with_state(state.clone()))
        .and_then(cron_start_all);

    let cron_stop_all_route = warp::path!("cron" / "stop-all")
        .and(warp::post())
        .and(require_bearer(state.clone()))
        .and(with_state(state.clone()))
        .and_then(cron_stop_all);

    let cron_force_refresh_route = warp::path!("cron" / "force-refresh-apps")
        .and(warp::post())
        .and(require_bearer(state.clone()))
        .and(with_state(state.clone()))
        .and_then(cron_force_refresh);

    let cron_status_route = warp::path!("cron" / "status")
        .and(warp::get())
        .and(require_bearer(state.clone()))
        .and(with_state(state))
        .and_then(cron_status);

    health_route
        .or(health_detailed_route)
        .unify()
        .or(cron_action_route)
        .unify()
        .or(cron_start_all_route)
        .unify()
        .or(cron_stop_all_route)
        .unify()
        .or(cron_force_refresh_route)
        .unify()
        .or(cron_status_route)
        .unify()
}
