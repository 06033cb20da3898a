use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Json,
    Extension,
};
use tracing::instrument;

use super::responses::{
    json_rejection, path_rejection, query_rejection, service_error_to_response, HandlerResult,
};
use crate::app::AppState;
use crate::auth::AuthenticatedUser;
use crate::models::{
    ActionResponse, AuthorQuery, CreateReviewRequest, PaginationQuery, Review, ReviewPage,
    SearchQuery,
};

#[instrument(name = "list_reviews", skip(state))]
pub async fn list_reviews(State(state): State<AppState>) -> HandlerResult<Json<Vec<Review>>> {
    state
        .reviews
        .get_all_reviews()
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "list_reviews_paginated", skip(state, query))]
pub async fn list_reviews_paginated(
    State(state): State<AppState>,
    query: Result<Query<PaginationQuery>, QueryRejection>,
) -> HandlerResult<Json<ReviewPage>> {
    let Query(query) = query.map_err(query_rejection)?;
    state
        .reviews
        .fetch_reviews_with_pagination(query.limit, query.cursor.as_deref())
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "search_reviews", skip(state, query))]
pub async fn search_reviews(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> HandlerResult<Json<Vec<Review>>> {
    let Query(query) = query.map_err(query_rejection)?;
    let result = state.reviews.search_reviews(&query.q).await;
    state
        .metrics
        .record_content_operation("review", "search", result.is_ok());
    result.map(Json).map_err(service_error_to_response)
}

#[instrument(name = "get_review", skip(state, id))]
pub async fn get_review(
    State(state): State<AppState>,
    id: Result<Path<u64>, PathRejection>,
) -> HandlerResult<Json<Review>> {
    let Path(id) = id.map_err(path_rejection)?;
    state
        .reviews
        .get_review_by_id(id)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

#[instrument(name = "reviews_by_author", skip(state, query))]
pub async fn reviews_by_author(
    State(state): State<AppState>,
    Path(author): Path<String>,
    query: Result<Query<AuthorQuery>, QueryRejection>,
) -> HandlerResult<Json<Vec<Review>>> {
    let Query(query) = query.map_err(query_rejection)?;
    state
        .reviews
        .get_reviews_by_author(&author, query.exclude)
        .await
        .map(Json)
        .map_err(service_error_to_response)
}

/// The body's `author` must be the caller
#[instrument(name = "create_review", skip(state, caller, payload))]
pub async fn create_review(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    payload: Result<Json<CreateReviewRequest>, JsonRejection>,
) -> HandlerResult<(StatusCode, Json<ActionResponse>)> {
    let Json(request) = payload.map_err(json_rejection)?;
    caller
        .ensure_is(&request.author)
        .map_err(service_error_to_response)?;

    let result = state.reviews.add_review(request).await;
    state
        .metrics
        .record_content_operation("review", "add", result.is_ok());
    let id = result.map_err(service_error_to_response)?;

    Ok((
        StatusCode::CREATED,
        Json(ActionResponse::created("Review added successfully", id)),
    ))
}

#[instrument(name = "delete_review", skip(state, caller, id))]
pub async fn delete_review(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedUser>,
    id: Result<Path<u64>, PathRejection>,
) -> HandlerResult<Json<ActionResponse>> {
    let Path(id) = id.map_err(path_rejection)?;
    let result = state.reviews.delete_review(id, &caller.user_id).await;
    state
        .metrics
        .record_content_operation("review", "delete", result.is_ok());
    result.map_err(service_error_to_response)?;

    Ok(Json(ActionResponse::ok("Review deleted successfully")))
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::{body_json, json_request, test_app};
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    fn review_body(author: &str, title: &str) -> serde_json::Value {
        json!({
            "author": author,
            "title": title,
            "content": "Worth the trip",
            "rate": 4.5
        })
    }

    #[tokio::test]
    async fn test_create_then_fetch_review() {
        let (app, tokens) = test_app();
        let token = tokens.issue("alice").unwrap();

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/reviews",
                Some(&token),
                &review_body("alice", "Tapas bar"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["id"], 1);

        let response = app
            .oneshot(json_request(Method::GET, "/reviews/1", None, &json!(null)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let review = body_json(response).await;
        assert_eq!(review["title"], "Tapas bar");
        assert_eq!(review["like"], 0);
    }

    #[tokio::test]
    async fn test_create_review_as_someone_else_is_forbidden() {
        let (app, tokens) = test_app();
        let token = tokens.issue("mallory").unwrap();

        let response = app
            .oneshot(json_request(
                Method::POST,
                "/reviews",
                Some(&token),
                &review_body("alice", "Fake"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_missing_review_is_404() {
        let (app, _) = test_app();

        let response = app
            .oneshot(json_request(Method::GET, "/reviews/99", None, &json!(null)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_bad_cursor_is_400() {
        let (app, _) = test_app();

        let response = app
            .oneshot(json_request(
                Method::GET,
                "/reviews/paginated?cursor=not-a-cursor",
                None,
                &json!(null),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_non_numeric_ids_get_the_failure_envelope() {
        let (app, tokens) = test_app();
        let token = tokens.issue("alice").unwrap();

        for (method, uri, token) in [
            (Method::GET, "/reviews/abc", None),
            (Method::GET, "/reviews/abc/comments", None),
            (Method::DELETE, "/reviews/abc", Some(token.as_str())),
            (Method::GET, "/reviews/paginated?limit=lots", None),
            (Method::GET, "/reviews/author/alice?exclude=x", None),
        ] {
            let response = app
                .clone()
                .oneshot(json_request(method, uri, token, &json!(null)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);

            let body = body_json(response).await;
            assert_eq!(body["success"], false, "{}", uri);
            assert_eq!(body["error"], "Bad Request");
            assert!(body["timestamp"].is_string());
        }
    }

    #[tokio::test]
    async fn test_search_matches_case_insensitively() {
        let (app, tokens) = test_app();
        let token = tokens.issue("alice").unwrap();

        for title in ["Cat Cafe", "Dog park"] {
            app.clone()
                .oneshot(json_request(
                    Method::POST,
                    "/reviews",
                    Some(&token),
                    &review_body("alice", title),
                ))
                .await
                .unwrap();
        }

        let response = app
            .oneshot(json_request(Method::GET, "/reviews/search?q=cAT", None, &json!(null)))
            .await
            .unwrap();
        let found = body_json(response).await;
        assert_eq!(found.as_array().map(Vec::len), Some(1));
        assert_eq!(found[0]["title"], "Cat Cafe");
    }
}
