use discovery_models::{ContentType, FilterSet, Item, Page};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::decode::decode_page_bytes;
use crate::error::{ApiErrorKind, ApiResult};

/// Error body the catalog attaches to failed requests
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub success: Option<bool>,
    pub status_code: u16,
    #[serde(default)]
    pub status_message: Option<String>,
}

pub fn discover_path(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Movies => "/discover/movie",
        ContentType::Shows => "/discover/tv",
    }
}

fn join_ids<'a, I: IntoIterator<Item = &'a u32>>(ids: I) -> String {
    ids.into_iter().map(|id| id.to_string()).collect::<Vec<_>>().join("|")
}

/// Translate a filter set into discover query parameters.
///
/// Genres and providers are OR-ed (`|`), empty and unset filters are omitted.
pub fn build_discover_query(
    filters: &FilterSet,
    page: u32,
    language: &str,
    watch_region: &str,
) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("page", page.to_string()),
        ("language", language.to_string()),
        ("sort_by", filters.sort_key.clone()),
    ];

    if !filters.genre_ids.is_empty() {
        query.push(("with_genres", join_ids(&filters.genre_ids)));
    }
    if !filters.provider_ids.is_empty() {
        query.push(("with_watch_providers", join_ids(&filters.provider_ids)));
        query.push(("watch_region", watch_region.to_string()));
    }

    let (date_from_key, date_to_key) = match filters.content_type {
        ContentType::Movies => ("primary_release_date.gte", "primary_release_date.lte"),
        ContentType::Shows => ("first_air_date.gte", "first_air_date.lte"),
    };
    if let Some(year) = filters.year_from {
        query.push((date_from_key, format!("{:04}-01-01", year)));
    }
    if let Some(year) = filters.year_to {
        query.push((date_to_key, format!("{:04}-12-31", year)));
    }
    if let Some(score) = filters.score_min {
        query.push(("vote_average.gte", score.to_string()));
    }
    if let Some(minutes) = filters.duration_max {
        query.push(("with_runtime.lte", minutes.to_string()));
    }

    query
}

/// Classify a non-success response.
///
/// A parseable error body with a known backend code wins over the HTTP status;
/// otherwise the status table decides, and `Unknown` is the last resort.
pub fn classify_error_response(status: u16, body: &str) -> ApiErrorKind {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let kind = ApiErrorKind::from_backend_code(envelope.status_code);
            if kind != ApiErrorKind::Unknown {
                return kind;
            }
            debug!(
                "Unmapped backend code {} ({}), falling back to HTTP {}",
                envelope.status_code,
                envelope.status_message.as_deref().unwrap_or(""),
                status
            );
            ApiErrorKind::from_http_status(status)
        }
        Err(_) => ApiErrorKind::from_http_status(status),
    }
}

/// Fetch one discover page
pub async fn discover(
    client: &Client,
    base_url: &str,
    access_token: &str,
    content_type: ContentType,
    query: &[(&'static str, String)],
) -> ApiResult<Page<Item>> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), discover_path(content_type));

    let response = match client
        .get(&url)
        .bearer_auth(access_token)
        .header("Accept", "application/json")
        .query(query)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            warn!("Request to {} failed: {}", url, e);
            return Err(ApiErrorKind::Unknown);
        }
    };

    let status = response.status();
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => {
            warn!("Failed to read response body from {}: {}", url, e);
            return Err(ApiErrorKind::Unknown);
        }
    };

    if !status.is_success() {
        let kind = classify_error_response(status.as_u16(), &String::from_utf8_lossy(&body));
        warn!("Discover request failed: {} - {:?}", status, kind);
        return Err(kind);
    }

    decode_page_bytes(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value<'a>(query: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        query.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn test_movie_query() {
        let filters = FilterSet::movies()
            .with_genres([35, 18])
            .with_providers([8])
            .with_years(Some(1990), Some(1999))
            .with_score_min(6.5)
            .with_duration_max(120);
        let query = build_discover_query(&filters, 3, "en-US", "GB");

        assert_eq!(value(&query, "page"), Some("3"));
        assert_eq!(value(&query, "language"), Some("en-US"));
        assert_eq!(value(&query, "sort_by"), Some("popularity.desc"));
        assert_eq!(value(&query, "with_genres"), Some("18|35"));
        assert_eq!(value(&query, "with_watch_providers"), Some("8"));
        assert_eq!(value(&query, "watch_region"), Some("GB"));
        assert_eq!(value(&query, "primary_release_date.gte"), Some("1990-01-01"));
        assert_eq!(value(&query, "primary_release_date.lte"), Some("1999-12-31"));
        assert_eq!(value(&query, "vote_average.gte"), Some("6.5"));
        assert_eq!(value(&query, "with_runtime.lte"), Some("120"));
    }

    #[test]
    fn test_show_query_omits_unset_filters() {
        let filters = FilterSet::shows().with_years(Some(2010), None);
        let query = build_discover_query(&filters, 1, "en-US", "US");

        assert_eq!(value(&query, "first_air_date.gte"), Some("2010-01-01"));
        assert_eq!(value(&query, "first_air_date.lte"), None);
        assert_eq!(value(&query, "with_genres"), None);
        assert_eq!(value(&query, "watch_region"), None);
        assert_eq!(value(&query, "vote_average.gte"), None);
        assert_eq!(discover_path(filters.content_type), "/discover/tv");
    }

    #[test]
    fn test_backend_code_wins_over_http_status() {
        let body = r#"{"success":false,"status_code":22,"status_message":"Invalid page"}"#;
        assert_eq!(classify_error_response(400, body), ApiErrorKind::InvalidPage);
    }

    #[test]
    fn test_unparseable_body_uses_http_status() {
        assert_eq!(classify_error_response(400, "Bad Request"), ApiErrorKind::ValidationFailed);
        assert_eq!(classify_error_response(503, ""), ApiErrorKind::ServiceOffline);
    }

    #[test]
    fn test_unmapped_backend_code_uses_http_status() {
        let body = r#"{"success":false,"status_code":999,"status_message":"?"}"#;
        assert_eq!(classify_error_response(429, body), ApiErrorKind::RequestLimitExceeded);
    }

    #[test]
    fn test_nothing_usable_is_unknown() {
        assert_eq!(classify_error_response(418, ""), ApiErrorKind::Unknown);
    }
}
