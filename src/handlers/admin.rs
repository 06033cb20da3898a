use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use tracing::{error, info, instrument};

use super::responses::{error_response, HandlerResult};
use crate::app::AppState;

#[derive(Debug, Serialize)]
pub struct SetupTablesResponse {
    pub message: String,
    pub tables_created: Vec<String>,
    pub timestamp: String,
}

/// Create whichever of the five tables are missing. Safe to repeat.
#[instrument(name = "setup_tables", skip(state))]
pub async fn setup_tables(
    State(state): State<AppState>,
) -> HandlerResult<Json<SetupTablesResponse>> {
    info!("Setting up tables");

    let tables_created = state.provisioner.ensure_tables().await.map_err(|err| {
        error!("Failed to create tables: {}", err);
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create tables")
    })?;

    info!("Created tables: {:?}", tables_created);

    Ok(Json(SetupTablesResponse {
        message: format!("Created {} tables", tables_created.len()),
        tables_created,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}
