use axum::Json;
use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use platforms_parser::enrichment::search_limit;
use platforms_parser::extractor::ProviderSelection;
use platforms_parser::gateway::{GatewayError, parse_method, parse_urls};
use platforms_parser::media::{EpisodeId, QualityLabel};
use serde::Deserialize;
use serde_json::json;
use strev_cache::{CacheCategory, CacheFill, CacheRequest, CacheStatus, CachedValue};
use tracing::info;

use super::AppState;
use super::error::ApiError;

const JSON_CONTENT_TYPE: &str = "application/json";
const X_CACHE_STATUS: HeaderName = HeaderName::from_static("x-cache-status");
const X_BATCH_COUNT: HeaderName = HeaderName::from_static("x-batch-count");
const X_BATCH_SUCCESS: HeaderName = HeaderName::from_static("x-batch-success");

fn apply_cache_headers(headers: &mut HeaderMap, status: CacheStatus, max_age: u64) {
    headers.insert(
        X_CACHE_STATUS,
        HeaderValue::from_static(status.as_header_value()),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={max_age}")) {
        headers.insert(CACHE_CONTROL, value);
    }
}

fn cached_response(value: CachedValue) -> Response {
    let content_type = value
        .content_type
        .unwrap_or_else(|| JSON_CONTENT_TYPE.to_string());
    let mut response = ([(CONTENT_TYPE, content_type)], value.data).into_response();
    apply_cache_headers(response.headers_mut(), value.status, value.max_age);
    response
}

fn json_fill(value: &impl serde::Serialize) -> Result<CacheFill, ApiError> {
    Ok(CacheFill::store(serde_json::to_vec(value)?).with_content_type(JSON_CONTENT_TYPE))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::not_found(format!("no route for {}", uri.path()))
}

pub async fn manifest(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let request = CacheRequest::new(CacheCategory::from_path(uri.path()))
        .with_edge_key(uri.to_string());

    let cached = state
        .cache
        .get_or_fetch(&request, || async {
            let providers: Vec<_> = state
                .resolver
                .aggregator()
                .factory()
                .providers()
                .iter()
                .map(|p| json!({ "code": p.code, "name": p.name, "kind": p.kind }))
                .collect();
            json_fill(&json!({
                "name": "strev",
                "version": env!("CARGO_PKG_VERSION"),
                "providers": providers,
                "routes": [
                    "/api/streams/{provider}/{episode_id}",
                    "/api/fetch",
                    "/api/search",
                    "/api/titles/{id}",
                ],
            }))
        })
        .await?;

    Ok(cached_response(cached))
}

#[derive(Debug, Deserialize)]
pub struct StreamsQuery {
    min_quality: Option<String>,
}

pub async fn streams(
    State(state): State<AppState>,
    Path((provider, episode_id)): Path<(String, String)>,
    Query(query): Query<StreamsQuery>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let episode = EpisodeId::parse(&episode_id)?;
    let min_quality = query
        .min_quality
        .as_deref()
        .filter(|q| !q.trim().is_empty())
        .map(str::parse::<QualityLabel>)
        .transpose()
        .map_err(ApiError::bad_request)?;
    let selection = ProviderSelection::parse(&provider);

    let resolved = state
        .resolver
        .resolve(&episode, &selection, Some(&uri.to_string()))
        .await?;
    info!(
        episode = %episode,
        provider = %provider,
        streams = resolved.streams.streams.len(),
        cache = resolved.cache_status.as_header_value(),
        "Streams resolved"
    );

    let streams = match min_quality {
        Some(min) => resolved.streams.with_min_quality(min),
        None => resolved.streams,
    };

    let mut response = Json(streams).into_response();
    apply_cache_headers(
        response.headers_mut(),
        resolved.cache_status,
        resolved.max_age,
    );
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct FetchQuery {
    url: Option<String>,
    urls: Option<String>,
    method: Option<String>,
    body: Option<String>,
}

pub async fn fetch(
    State(state): State<AppState>,
    Query(query): Query<FetchQuery>,
) -> Result<Response, ApiError> {
    let method = parse_method(query.method.as_deref())?;
    let body = query.body.as_deref();

    match (query.url, query.urls) {
        (Some(url), None) => {
            let raw = state.gateway.fetch_raw(&url, &method, body).await?;
            let status = StatusCode::from_u16(raw.status).unwrap_or(StatusCode::BAD_GATEWAY);
            let mut response = (status, raw.body).into_response();
            if let Some(value) = raw
                .content_type
                .and_then(|ct| HeaderValue::from_str(&ct).ok())
            {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
            Ok(response)
        }
        (None, Some(urls)) => {
            let urls = parse_urls(&urls);
            if urls.is_empty() {
                return Err(GatewayError::NoUrls.into());
            }

            let results = state.gateway.fetch_all(&urls, &method, body).await;
            let success = results.iter().filter(|r| r.success).count();
            let count = results.len();

            let mut response = Json(results).into_response();
            let headers = response.headers_mut();
            headers.insert(X_BATCH_COUNT, HeaderValue::from(count));
            headers.insert(X_BATCH_SUCCESS, HeaderValue::from(success));
            Ok(response)
        }
        _ => Err(ApiError::bad_request(
            "exactly one of 'url' or 'urls' is required",
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
    limit: Option<usize>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let q = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing query parameter 'q'"))?;

    let limit = search_limit(query.limit);
    let request = CacheRequest::new(CacheCategory::from_path(uri.path()))
        .with_store_key(format!("search:{q}:{limit}"))
        .with_edge_key(uri.to_string());

    let cached = state
        .cache
        .get_or_fetch(&request, || async {
            let results = state.enrichment.search(q, Some(limit)).await?;
            json_fill(&results)
        })
        .await?;

    Ok(cached_response(cached))
}

pub async fn title(
    State(state): State<AppState>,
    Path(id): Path<String>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, ApiError> {
    let id: u64 = id
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid title id '{id}'")))?;

    let request = CacheRequest::new(CacheCategory::from_path(uri.path()))
        .with_store_key(format!("title:{id}"))
        .with_edge_key(uri.to_string());

    let cached = state
        .cache
        .get_or_fetch(&request, || async {
            let details = state.enrichment.details(id).await?;
            json_fill(&details)
        })
        .await?;

    Ok(cached_response(cached))
}
