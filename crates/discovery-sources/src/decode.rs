//! Field-sniffing decoder for catalog list payloads.
//!
//! Items carry no type tag. A payload with an `original_title` key is a movie,
//! one with an `original_name` key is a show; anything else is rejected rather
//! than defaulted, since callers dispatch on the concrete variant.

use discovery_models::{Item, MovieItem, Page, ShowItem};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ApiErrorKind, ApiResult};

const MOVIE_MARKER: &str = "original_title";
const SHOW_MARKER: &str = "original_name";

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    page: u32,
    results: Vec<Value>,
    total_results: u32,
    total_pages: u32,
}

/// Decode one raw list element into a movie or a show
pub fn decode_item(raw: &Value) -> ApiResult<Item> {
    let object = raw.as_object().ok_or_else(|| {
        debug!("Item payload is not an object: {}", raw);
        ApiErrorKind::InvalidResponse
    })?;

    match (object.contains_key(MOVIE_MARKER), object.contains_key(SHOW_MARKER)) {
        (true, false) => MovieItem::deserialize(raw).map(Item::Movie).map_err(|e| {
            debug!("Movie payload failed to decode: {}", e);
            ApiErrorKind::InvalidResponse
        }),
        (false, true) => ShowItem::deserialize(raw).map(Item::Show).map_err(|e| {
            debug!("Show payload failed to decode: {}", e);
            ApiErrorKind::InvalidResponse
        }),
        (true, true) => {
            debug!(
                "Item {:?} carries both {} and {}, refusing to guess",
                object.get("id"),
                MOVIE_MARKER,
                SHOW_MARKER
            );
            Err(ApiErrorKind::InvalidResponse)
        }
        (false, false) => {
            debug!("Item {:?} carries neither {} nor {}", object.get("id"), MOVIE_MARKER, SHOW_MARKER);
            Err(ApiErrorKind::InvalidResponse)
        }
    }
}

/// Decode a list envelope (`page`, `results`, `total_results`, `total_pages`).
///
/// One undecodable element fails the whole page.
pub fn decode_page(raw: &Value) -> ApiResult<Page<Item>> {
    let envelope = RawEnvelope::deserialize(raw).map_err(|e| {
        debug!("List envelope failed to decode: {}", e);
        ApiErrorKind::InvalidResponse
    })?;

    if envelope.page == 0 {
        debug!("List envelope reports page 0");
        return Err(ApiErrorKind::InvalidResponse);
    }

    let items = envelope
        .results
        .iter()
        .map(decode_item)
        .collect::<ApiResult<Vec<Item>>>()?;

    Ok(Page {
        items,
        page_number: envelope.page,
        total_items: envelope.total_results,
        total_pages: envelope.total_pages,
    })
}

/// Decode a list envelope straight from a response body
pub fn decode_page_bytes(body: &[u8]) -> ApiResult<Page<Item>> {
    let raw: Value = serde_json::from_slice(body).map_err(|e| {
        debug!("Response body is not JSON: {}", e);
        ApiErrorKind::InvalidResponse
    })?;
    decode_page(&raw)
}
