use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::error::AppResult;
use crate::state::AppState;

async fn health(State(state): State<AppState>) -> AppResult<Response> {
    let conn = state.db.get()?;
    conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))?;

    Ok(Json(json!({
        "success": true,
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
