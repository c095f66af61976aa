use discovery_models::{FilterSet, Fingerprint};
use sha2::{Digest, Sha256};

const FIELD_SEPARATOR: &str = "|";
const VALUE_SEPARATOR: &str = ",";
const UNSET: &str = "-";

fn join_sorted<'a, I: IntoIterator<Item = &'a u32>>(ids: I) -> String {
    let mut ids: Vec<u32> = ids.into_iter().copied().collect();
    ids.sort_unstable();
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(VALUE_SEPARATOR)
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| UNSET.to_string())
}

/// Scores compare by value: `-0.0` prints as `0`, non-finite scores count as unset
fn score(value: Option<f32>) -> String {
    match value {
        Some(v) if v.is_finite() => opt(Some(v + 0.0)),
        _ => UNSET.to_string(),
    }
}

/// Canonical text form of a filter set, in fixed field order
pub fn canonical_form(filters: &FilterSet) -> String {
    [
        filters.content_type.as_str().to_string(),
        join_sorted(&filters.genre_ids),
        join_sorted(&filters.provider_ids),
        opt(filters.duration_max),
        score(filters.score_min),
        opt(filters.year_from),
        opt(filters.year_to),
        filters.sort_key.clone(),
    ]
    .join(FIELD_SEPARATOR)
}

/// SHA-256 of the canonical form, hex encoded
pub fn fingerprint(filters: &FilterSet) -> Fingerprint {
    let digest = Sha256::digest(canonical_form(filters).as_bytes());
    Fingerprint::new(hex::encode(digest))
}
