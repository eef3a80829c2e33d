//! Retention classification table.

use axum::{
    Json,
    http::{
        HeaderMap, StatusCode,
        header::{ETAG, IF_NONE_MATCH},
    },
    response::{IntoResponse, Response},
};

use crate::{
    models::classification::{Classification, RetentionPolicy},
    services::secret_protection::SecretProtection,
};

/// List every classification with its retention window.
///
/// # Endpoint
///
/// `GET /api/v1/classifications` (public)
///
/// # Caching
///
/// The response carries an `ETag`. A request whose `If-None-Match` equals it
/// gets `304 Not Modified` with no body.
///
/// # Response (200 OK)
///
/// ```json
/// [
///   { "classification": "PUBLIC", "retention_days": 365 },
///   { "classification": "CONFIDENTIAL", "retention_days": 180 },
///   { "classification": "SECRET", "retention_days": 90 },
///   { "classification": "TOP_SECRET", "retention_days": 0 }
/// ]
/// ```
pub async fn list_classifications(headers: HeaderMap) -> Response {
    let table: Vec<RetentionPolicy> = Classification::ALL
        .into_iter()
        .map(RetentionPolicy::from)
        .collect();
    let etag = table_etag(&table);

    let unchanged = headers
        .get(IF_NONE_MATCH)
        .is_some_and(|value| value.as_bytes() == etag.as_bytes());
    if unchanged {
        return (StatusCode::NOT_MODIFIED, [(ETAG, etag)]).into_response();
    }

    ([(ETAG, etag)], Json(table)).into_response()
}

fn table_etag(table: &[RetentionPolicy]) -> String {
    let canonical: String = table
        .iter()
        .map(|p| format!("{:?}={};", p.classification, p.retention_days))
        .collect();
    format!("\"{}\"", SecretProtection::fingerprint(&canonical))
}
