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
use crate::models::{ActionResponse, Comment, CreateCommentRequest};

#[instrument(name = "list_comments", skip(state))]
pub async fn list_comments(State(state): State<AppState>) -> HandlerResult<Json<Vec<Comment>>> {
    state
        .comments
        .get_all_comments()
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "comments_for_review", skip(state, review_id))]
pub async fn comments_for_review(
    State(state): State<AppState>,
    review_id: Result<Path<u64>, PathRejection>,
) -> HandlerResult<Json<Vec<Comment>>> {
    let Path(review_id) = review_id.map_err(path_rejection)?;
    state
        .comments
        .get_comments_by_review_id(review_id)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "create_comment", skip(state, caller, payload))]
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> HandlerResult<(StatusCode, Json<ActionResponse>)> {
    let Json(request) = payload.map_err(json_rejection)?;
    caller
        .ensure_is(&request.author)
        .map_err(service_error_to_response)?;

    let result = state.comments.add_comment(request).await;
    state
        .metrics
        .record_content_operation("comment", "add", result.is_ok());
    let id = result.map_err(service_error_to_response)?;

    Ok((
        StatusCode::CREATED,
        Json(ActionResponse::created("Comment added successfully", id)),
    ))
}
