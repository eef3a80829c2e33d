//! API key authentication middleware.
//!
//! This middleware intercepts every routed request to:
//! 1. Resolve whether the matched operation is public
//! 2. Extract the API key from the Authorization header
//! 3. Validate it through the [`ApiKeyManager`]
//! 4. Inject the [`TenantContext`] into the request
//! 5. Reject unauthenticated requests with HTTP 401
//!
//! Each request ends either authenticated or rejected; nothing is retried.

use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    middleware::{
        access::{Access, AccessPolicy},
        tenant_context::TenantContext,
    },
    services::api_key_service::{ApiKeyManager, KEY_PREFIX_LEN},
};

/// State the gate needs: the key manager and the registered access flags.
#[derive(Debug, Clone)]
pub struct GateState {
    pub api_keys: ApiKeyManager,
    pub access: Arc<AccessPolicy>,
}

/// What the Authorization header contained.
#[derive(Debug, PartialEq, Eq)]
enum Credential {
    Missing,
    Unreadable,
    Present(String),
}

/// API key authentication middleware function.
///
/// # Headers
///
/// Both forms are accepted:
/// ```text
/// Authorization: Bearer sk_1a2b3c4d_...
/// Authorization: sk_1a2b3c4d_...
/// ```
///
/// # Returns
///
/// - the downstream response for public operations and valid keys
/// - `AuthenticationRequired` (401) when no key was sent
/// - `AuthenticationInvalid` (401) when the key did not validate
/// - `Database` (500) when the credential store failed
pub async fn auth_middleware(
    State(gate): State<GateState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    if gate.access.resolve(&method, &route) == Access::Public {
        return Ok(next.run(request).await);
    }

    let api_key = match extract_credential(&request) {
        Credential::Present(key) => key,
        Credential::Missing => {
            tracing::debug!(%method, route = %route, "No API key provided in request");
            return Err(AppError::AuthenticationRequired);
        }
        Credential::Unreadable => {
            tracing::warn!(%method, route = %route, "Unreadable Authorization header");
            return Err(AppError::AuthenticationInvalid);
        }
    };

    let Some(validated) = gate.api_keys.validate(Some(&api_key)).await? else {
        tracing::warn!(
            %method,
            route = %route,
            key_prefix = %display_prefix(&api_key),
            "Invalid API key attempt"
        );
        return Err(AppError::AuthenticationInvalid);
    };

    let context = TenantContext::from(validated);
    tracing::debug!(
        tenant_id = %context.tenant_id,
        api_key_id = %context.api_key_id,
        route = %route,
        "Request authenticated"
    );

    // Handlers read this through the tenant_context extractors
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

fn extract_credential(request: &Request) -> Credential {
    let Some(header) = request.headers().get(AUTHORIZATION) else {
        return Credential::Missing;
    };
    let Ok(value) = header.to_str() else {
        return Credential::Unreadable;
    };

    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() {
        Credential::Missing
    } else {
        Credential::Present(token.to_string())
    }
}

/// Only the non-secret lookup prefix is ever logged.
fn display_prefix(api_key: &str) -> String {
    api_key.chars().take(KEY_PREFIX_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::InMemoryStore;
    use axum::{
        Extension, Router,
        body::Body,
        http::{HeaderValue, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
    };
    use tower::ServiceExt;

    fn request_with(value: &[u8]) -> Request {
        Request::builder()
            .uri("/")
            .header(AUTHORIZATION, HeaderValue::from_bytes(value).unwrap())
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn extracts_bearer_and_bare_tokens() {
        assert_eq!(
            extract_credential(&request_with(b"Bearer sk_abc")),
            Credential::Present("sk_abc".to_string())
        );
        assert_eq!(
            extract_credential(&request_with(b"sk_abc")),
            Credential::Present("sk_abc".to_string())
        );
    }

    #[test]
    fn blank_or_absent_header_is_missing() {
        let bare = Request::builder().uri("/").body(Body::empty()).unwrap();

        assert_eq!(extract_credential(&bare), Credential::Missing);
        assert_eq!(extract_credential(&request_with(b"Bearer ")), Credential::Missing);
        assert_eq!(extract_credential(&request_with(b"")), Credential::Missing);
    }

    #[test]
    fn non_ascii_header_is_unreadable() {
        assert_eq!(
            extract_credential(&request_with(b"Bearer \xff\xfe")),
            Credential::Unreadable
        );
    }

    async fn whoami(Extension(ctx): Extension<TenantContext>) -> String {
        ctx.tenant_name
    }

    async fn open() -> &'static str {
        "open"
    }

    struct Harness {
        app: Router,
        store: Arc<InMemoryStore>,
        manager: ApiKeyManager,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryStore::default());
        let manager = ApiKeyManager::new(store.clone(), 4);
        let gate = GateState {
            api_keys: manager.clone(),
            access: Arc::new(
                AccessPolicy::default()
                    .group("/open", Access::Public)
                    .operation(axum::http::Method::GET, "/open/locked", Access::Private),
            ),
        };
        let app = Router::new()
            .route("/whoami", get(whoami))
            .route("/open", get(open))
            .route("/open/locked", get(whoami))
            .layer(from_fn_with_state(gate, auth_middleware));

        Harness {
            app,
            store,
            manager,
        }
    }

    fn get_request(uri: &str, authorization: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn public_operation_needs_no_credential() {
        let h = harness();

        let response = h.app.oneshot(get_request("/open", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn operation_override_makes_route_private() {
        let h = harness();

        let response = h
            .app
            .oneshot(get_request("/open/locked", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn private_operation_without_key_is_rejected() {
        let h = harness();

        let response = h.app.oneshot(get_request("/whoami", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "authentication_required");
    }

    #[tokio::test]
    async fn unknown_key_is_rejected_as_invalid() {
        let h = harness();

        let response = h
            .app
            .oneshot(get_request("/whoami", Some("Bearer sk_00000000_nope")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "invalid_api_key");
    }

    #[tokio::test]
    async fn valid_key_attaches_tenant_context() {
        let h = harness();
        let tenant = h.store.add_tenant("Acme", true);
        let issued = h.manager.generate(tenant, "ci-key").await.unwrap();

        for header in [format!("Bearer {}", issued.key), issued.key.clone()] {
            let response = h
                .app
                .clone()
                .oneshot(get_request("/whoami", Some(&header)))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert_eq!(&body[..], b"Acme");
        }
    }

    #[tokio::test]
    async fn deactivated_tenant_is_rejected() {
        let h = harness();
        let tenant = h.store.add_tenant("Acme", true);
        let issued = h.manager.generate(tenant, "ci-key").await.unwrap();
        h.store.set_tenant_active(tenant, false);

        let response = h
            .app
            .oneshot(get_request("/whoami", Some(&format!("Bearer {}", issued.key))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn revoked_key_is_rejected() {
        let h = harness();
        let tenant = h.store.add_tenant("Acme", true);
        let issued = h.manager.generate(tenant, "ci-key").await.unwrap();
        assert!(h.manager.revoke(issued.id, tenant).await.unwrap());

        let response = h
            .app
            .oneshot(get_request("/whoami", Some(&issued.key)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
