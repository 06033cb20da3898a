use aws_sdk_dynamodb::Client as DynamoDbClient;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    http::{header, Method},
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};

use crate::auth::{require_auth, CodeDelivery, TokenIssuer};
use crate::handlers::{
    admin, comments, drafts, health_check, metrics_handler, request_validation_middleware,
    reviews, security_headers_middleware, users, RequestLimits,
};
use crate::observability::{observability_middleware, Metrics};
use crate::repositories::{
    CommentRepository, DraftRepository, DynamoDbCommentRepository, DynamoDbDraftRepository,
    DynamoDbProfileRepository, DynamoDbReviewRepository, DynamoDbUserRepository, InMemoryStore,
    ProfileRepository, ReviewRepository, TableManager, TableNames, TableProvisioner,
    UserRepository,
};
use crate::services::{
    CommentService, DraftService, ProfileService, ReviewService, UserService, UserServiceSettings,
};

/// The repositories one storage backend provides
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub drafts: Arc<dyn DraftRepository>,
    pub provisioner: Arc<dyn TableProvisioner>,
}

impl Repositories {
    /// Every repository backed by one shared in-memory store
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            users: store.clone(),
            profiles: store.clone(),
            reviews: store.clone(),
            comments: store.clone(),
            drafts: store.clone(),
            provisioner: store,
        }
    }

    pub fn dynamodb(client: Arc<DynamoDbClient>, tables: TableNames, region: String) -> Self {
        Self {
            users: Arc::new(DynamoDbUserRepository::new(
                client.clone(),
                tables.users.clone(),
                tables.profiles.clone(),
                region.clone(),
            )),
            profiles: Arc::new(DynamoDbProfileRepository::new(
                client.clone(),
                tables.profiles.clone(),
                region.clone(),
            )),
            reviews: Arc::new(DynamoDbReviewRepository::new(
                client.clone(),
                tables.reviews.clone(),
                region.clone(),
            )),
            comments: Arc::new(DynamoDbCommentRepository::new(
                client.clone(),
                tables.comments.clone(),
                region.clone(),
            )),
            drafts: Arc::new(DynamoDbDraftRepository::new(
                client.clone(),
                tables.drafts.clone(),
                tables.reviews.clone(),
                region,
            )),
            provisioner: Arc::new(TableManager::new(client, tables)),
        }
    }
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub profiles: Arc<ProfileService>,
    pub reviews: Arc<ReviewService>,
    pub comments: Arc<CommentService>,
    pub drafts: Arc<DraftService>,
    pub provisioner: Arc<dyn TableProvisioner>,
    pub tokens: Arc<TokenIssuer>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        repositories: Repositories,
        tokens: Arc<TokenIssuer>,
        code_delivery: Arc<dyn CodeDelivery>,
        settings: UserServiceSettings,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            users: Arc::new(UserService::new(
                repositories.users,
                tokens.clone(),
                code_delivery,
                settings,
            )),
            profiles: Arc::new(ProfileService::new(repositories.profiles)),
            reviews: Arc::new(ReviewService::new(repositories.reviews.clone())),
            comments: Arc::new(CommentService::new(repositories.comments)),
            drafts: Arc::new(DraftService::new(repositories.drafts, repositories.reviews)),
            provisioner: repositories.provisioner,
            tokens,
            metrics,
        }
    }
}

impl FromRef<AppState> for Arc<Metrics> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

impl FromRef<AppState> for Arc<TokenIssuer> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

/// Build the router with every route and middleware layer
pub fn create_app(state: AppState, request_timeout: Duration, max_request_size: usize) -> Router {
    let metrics_for_middleware = state.metrics.clone();
    let limits = RequestLimits { max_request_size };

    let public = Router::new()
        .route("/health/status", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/users", get(users::list_users))
        .route("/users/exists/:user_id", get(users::user_exists))
        .route("/users/register", post(users::register))
        .route("/users/registerconfirm", post(users::confirm_registration))
        .route("/users/resendconfirm", post(users::resend_confirmation))
        .route("/users/login", post(users::login))
        .route("/reviews", get(reviews::list_reviews))
        .route("/reviews/paginated", get(reviews::list_reviews_paginated))
        .route("/reviews/search", get(reviews::search_reviews))
        .route("/reviews/author/:author", get(reviews::reviews_by_author))
        .route("/reviews/:id", get(reviews::get_review))
        .route("/reviews/:id/comments", get(comments::comments_for_review))
        .route("/comments", get(comments::list_comments))
        .route("/admin/setup-tables", post(admin::setup_tables));

    let protected = Router::new()
        .route("/users/save", post(users::save_review))
        .route("/users/unsave", post(users::unsave_review))
        .route("/users/saved", post(users::saved_reviews))
        .route("/users/protected", get(users::protected))
        .route("/reviews", post(reviews::create_review))
        .route("/reviews/:id", delete(reviews::delete_review))
        .route("/comments", post(comments::create_comment))
        .route("/drafts", post(drafts::create_draft))
        .route("/drafts/author/:author", get(drafts::drafts_by_author))
        .route("/drafts/:id/publish", post(drafts::publish_draft))
        .route_layer(middleware::from_fn_with_state(
            state.tokens.clone(),
            require_auth,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(86400));

    // Outermost layer last
    public
        .merge(protected)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_request_size))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn_with_state(
            limits,
            request_validation_middleware,
        ))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .layer(middleware::from_fn(move |req, next| {
            observability_middleware(metrics_for_middleware.clone(), req, next)
        }))
}
