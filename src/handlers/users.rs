use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde_json::{json, Value};
use tracing::instrument;

use super::responses::{json_rejection, service_error_to_response, HandlerResult};
use crate::app::AppState;
use crate::auth::AuthenticatedUser;
use crate::models::{
    ActionResponse, ConfirmRegistrationRequest, CredentialsRequest, LoginResponse,
    ResendConfirmationRequest, SaveReviewRequest, SavedReviewsRequest, SavedReviewsResponse,
    ServiceResult, UserSummary,
};

fn record<T>(state: &AppState, operation: &str, result: &ServiceResult<T>) {
    state.metrics.record_user_operation(operation, result.is_ok());
}

#[instrument(name = "list_users", skip(state))]
pub async fn list_users(State(state): State<AppState>) -> HandlerResult<Json<Vec<UserSummary>>> {
    state
        .users
        .get_all_users()
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "user_exists", skip(state))]
pub async fn user_exists(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> HandlerResult<Json<Value>> {
    let exists = state
        .users
        .check_user_exists(&user_id)
        .await
        .map_err(service_error_to_response)?;

    Ok(Json(json!({ "UserId": user_id, "exists": exists })))
}

#[instrument(name = "register", skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> HandlerResult<(StatusCode, Json<ActionResponse>)> {
    let Json(request) = payload.map_err(json_rejection)?;

    let result = state.users.register_user(request).await;
    record(&state, "register", &result);
    result.map_err(service_error_to_response)?;

    Ok((
        StatusCode::CREATED,
        Json(ActionResponse::ok("User registered successfully")),
    ))
}

#[instrument(name = "confirm_registration", skip(state, payload))]
pub async fn confirm_registration(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmRegistrationRequest>, JsonRejection>,
) -> HandlerResult<Json<ActionResponse>> {
    let Json(request) = payload.map_err(json_rejection)?;

    let result = state
        .users
        .confirm_registration(&request.user_id, &request.code)
        .await;
    record(&state, "confirm", &result);
    result.map_err(service_error_to_response)?;

    Ok(Json(ActionResponse::ok("User confirmed successfully")))
}

#[instrument(name = "resend_confirmation", skip(state, payload))]
pub async fn resend_confirmation(
    State(state): State<AppState>,
    payload: Result<Json<ResendConfirmationRequest>, JsonRejection>,
) -> HandlerResult<Json<ActionResponse>> {
    let Json(request) = payload.map_err(json_rejection)?;

    let result = state.users.resend_confirmation(&request.user_id).await;
    record(&state, "resend_confirmation", &result);
    result.map_err(service_error_to_response)?;

    Ok(Json(ActionResponse::ok("Confirmation code sent")))
}

#[instrument(name = "login", skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> HandlerResult<Json<LoginResponse>> {
    let Json(request) = payload.map_err(json_rejection)?;

    let result = state.users.login_user(request).await;
    record(&state, "login", &result);
    let token = result.map_err(service_error_to_response)?;

    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        token,
    }))
}

#[instrument(name = "save_review", skip(state, caller, payload))]
pub async fn save_review(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    payload: Result<Json<SaveReviewRequest>, JsonRejection>,
) -> HandlerResult<Json<SavedReviewsResponse>> {
    let Json(request) = payload.map_err(json_rejection)?;
    caller
        .ensure_is(&request.username)
        .map_err(service_error_to_response)?;

    let result = state
        .profiles
        .save_review(&request.username, request.review_id)
        .await;
    state
        .metrics
        .record_content_operation("saved", "save", result.is_ok());
    let saved = result.map_err(service_error_to_response)?;

    Ok(Json(SavedReviewsResponse { saved }))
}

#[instrument(name = "unsave_review", skip(state, caller, payload))]
pub async fn unsave_review(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    payload: Result<Json<SaveReviewRequest>, JsonRejection>,
) -> HandlerResult<Json<ActionResponse>> {
    let Json(request) = payload.map_err(json_rejection)?;
    caller
        .ensure_is(&request.username)
        .map_err(service_error_to_response)?;

    let result = state
        .profiles
        .unsave_review(&request.username, request.review_id)
        .await;
    state
        .metrics
        .record_content_operation("saved", "unsave", result.is_ok());
    result.map_err(service_error_to_response)?;

    Ok(Json(ActionResponse::ok("Review removed from saved list")))
}

#[instrument(name = "saved_reviews", skip(state, caller, payload))]
pub async fn saved_reviews(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    payload: Result<Json<SavedReviewsRequest>, JsonRejection>,
) -> HandlerResult<Json<SavedReviewsResponse>> {
    let Json(request) = payload.map_err(json_rejection)?;
    caller
        .ensure_is(&request.username)
        .map_err(service_error_to_response)?;

    let saved = state
        .profiles
        .get_user_saved_reviews(&request.username)
        .await
        .map_err(service_error_to_response)?;

    Ok(Json(SavedReviewsResponse { saved }))
}

pub async fn protected(Extension(caller): Extension<AuthenticatedUser>) -> Json<Value> {
    Json(json!({ "message": "Protected data", "user": caller.user_id }))
}
