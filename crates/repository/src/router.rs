//! Route table of the repository API.

use axum::{
    routing::{get, post, put},
    Router,
};
use sio_core::protocol::API_PREFIX;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{self, auth, documents, files, organizations, sessions};
use crate::state::AppState;

/// Build the application router with all routes.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Health check routes
    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/health", get(handlers::api_health));

    // Anonymous routes: signed or public responses
    let anonymous_routes = Router::new()
        .route("/auth/organization", post(auth::create_organization))
        .route("/auth/session", post(auth::create_session))
        .route("/files/", get(files::get_file))
        .route("/organizations/", get(organizations::list));

    // Session routes: encrypted envelopes
    let session_routes = Router::new()
        .route(
            "/sessions/roles",
            get(sessions::list_roles)
                .post(sessions::assume_role)
                .delete(sessions::drop_role),
        )
        .route(
            "/organizations/subjects/state",
            get(organizations::subject_states).put(organizations::set_subject_state),
        )
        .route("/organizations/subjects", post(organizations::add_subject))
        .route(
            "/organizations/subjects/roles",
            get(organizations::subject_roles),
        )
        .route(
            "/organizations/roles/subjects",
            get(organizations::role_subjects)
                .post(organizations::add_role_subject)
                .delete(organizations::remove_role_subject),
        )
        .route(
            "/organizations/roles/permissions",
            get(organizations::role_permissions)
                .post(organizations::grant_permission)
                .delete(organizations::revoke_permission),
        )
        .route(
            "/organizations/permissions/roles",
            get(organizations::permission_roles),
        )
        .route("/organizations/roles", post(organizations::add_role))
        .route(
            "/organizations/roles/suspend",
            put(organizations::suspend_role),
        )
        .route(
            "/organizations/roles/reactivate",
            put(organizations::reactivate_role),
        )
        .route(
            "/organizations/documents",
            get(documents::list).post(documents::add),
        )
        .route(
            "/organizations/documents/metadata",
            get(documents::metadata),
        )
        .route(
            "/organizations/documents/",
            axum::routing::delete(documents::delete),
        )
        .route("/organizations/documents/acl", post(documents::change_acl));

    Router::new()
        .merge(health_routes)
        .nest(API_PREFIX, anonymous_routes.merge(session_routes))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
