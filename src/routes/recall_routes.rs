// src/routes/recall_routes.rs

use axum::{Json, Router, extract::State, routing::get};
use chrono::Utc;

use crate::{
    error::ApiError,
    middleware::trigger_auth::CronTrigger,
    models::{ApiOk, AppState, BatchReport},
};

pub fn router() -> Router<AppState> {
    // Cron services differ on GET vs POST; both run the same pass.
    Router::new().route("/cron/recalls", get(run_recall_pass).post(run_recall_pass))
}

/* ============================================================
   GET|POST /api/v1/cron/recalls
   ============================================================ */

pub async fn run_recall_pass(
    State(state): State<AppState>,
    trigger: CronTrigger,
) -> Result<Json<ApiOk<BatchReport>>, ApiError> {
    if !trigger.authenticated {
        tracing::warn!("recall pass started without a trigger secret (permissive mode)");
    }

    let report = state.runner.run(Utc::now(), state.batch_size).await?;

    Ok(Json(ApiOk { data: report }))
}
