//! HTTP router: routes, their access flags, and the layers around them.

use std::sync::Arc;

use axum::{
    Router,
    http::Method,
    middleware::from_fn_with_state,
    routing::{delete, get},
};
use tower_http::trace::TraceLayer;

use crate::{
    handlers,
    middleware::{
        access::{Access, AccessPolicy},
        auth::{GateState, auth_middleware},
    },
    state::AppState,
};

/// Which operations skip the gate. Everything else is private.
pub fn access_policy() -> AccessPolicy {
    AccessPolicy::default()
        .group("/health", Access::Public)
        .operation(Method::GET, "/api/v1/classifications", Access::Public)
}

pub fn build_router(state: AppState) -> Router {
    let gate = GateState {
        api_keys: state.api_keys.clone(),
        access: Arc::new(access_policy()),
    };

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/v1/classifications",
            get(handlers::classifications::list_classifications),
        )
        .route("/api/v1/tenant", get(handlers::tenant::get_tenant))
        .route(
            "/api/v1/tenant/settings/{name}",
            get(handlers::tenant::get_setting).put(handlers::tenant::put_setting),
        )
        .route(
            "/api/v1/api-keys",
            get(handlers::api_keys::list_api_keys).post(handlers::api_keys::create_api_key),
        )
        .route(
            "/api/v1/api-keys/{id}",
            delete(handlers::api_keys::revoke_api_key),
        )
        // Added with `layer` so the gate sees MatchedPath and also guards the fallback
        .layer(from_fn_with_state(gate, auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
