use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::Json,
    Extension,
};
use tracing::instrument;

use super::responses::{json_rejection, path_rejection, service_error_to_response, HandlerResult};
use crate::app::AppState;
use crate::auth::AuthenticatedUser;
use crate::models::{ActionResponse, CreateDraftRequest, Draft};

#[instrument(name = "create_draft", skip(state, caller, payload))]
pub async fn create_draft(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    payload: Result<Json<CreateDraftRequest>, JsonRejection>,
) -> HandlerResult<(StatusCode, Json<ActionResponse>)> {
    let Json(request) = payload.map_err(json_rejection)?;
    caller
        .ensure_is(&request.author)
        .map_err(service_error_to_response)?;

    let result = state.drafts.store_draft(request).await;
    state
        .metrics
        .record_content_operation("draft", "store", result.is_ok());
    let id = result.map_err(service_error_to_response)?;

    Ok((
        StatusCode::CREATED,
        Json(ActionResponse::created("Draft stored successfully", id)),
    ))
}

/// Drafts are private to their author
#[instrument(name = "drafts_by_author", skip(state, caller))]
pub async fn drafts_by_author(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(author): Path<String>,
) -> HandlerResult<Json<Vec<Draft>>> {
    caller.ensure_is(&author).map_err(service_error_to_response)?;

    state
        .drafts
        .get_drafts_by_author(&author)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "publish_draft", skip(state, caller, id))]
pub async fn publish_draft(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    id: Result<Path<u64>, PathRejection>,
) -> HandlerResult<(StatusCode, Json<ActionResponse>)> {
    let Path(id) = id.map_err(path_rejection)?;
    let result = state.drafts.publish_draft(id, &caller.user_id).await;
    state
        .metrics
        .record_content_operation("draft", "publish", result.is_ok());
    let review_id = result.map_err(service_error_to_response)?;

    Ok((
        StatusCode::CREATED,
        Json(ActionResponse::created("Draft published", review_id)),
    ))
}
