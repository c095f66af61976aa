use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_SORT_KEY: &str = "popularity.desc";

/// Which half of the catalog a discovery session browses
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Movies,
    Shows,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Movies => "movies",
            ContentType::Shows => "shows",
        }
    }
}

/// User-selected discovery filters.
///
/// Multi-valued fields are kept in ordered sets, so two filter sets built from
/// the same ids in a different insertion order compare equal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterSet {
    pub content_type: ContentType,
    #[serde(default)]
    pub genre_ids: BTreeSet<u32>,
    #[serde(default)]
    pub provider_ids: BTreeSet<u32>,
    /// Maximum runtime in minutes
    #[serde(default)]
    pub duration_max: Option<u32>,
    /// Minimum vote average (0-10)
    #[serde(default)]
    pub score_min: Option<f32>,
    #[serde(default)]
    pub year_from: Option<i32>,
    #[serde(default)]
    pub year_to: Option<i32>,
    #[serde(default = "default_sort_key")]
    pub sort_key: String,
}

fn default_sort_key() -> String {
    DEFAULT_SORT_KEY.to_string()
}

impl FilterSet {
    pub fn new(content_type: ContentType) -> Self {
        Self {
            content_type,
            genre_ids: BTreeSet::new(),
            provider_ids: BTreeSet::new(),
            duration_max: None,
            score_min: None,
            year_from: None,
            year_to: None,
            sort_key: default_sort_key(),
        }
    }

    pub fn movies() -> Self {
        Self::new(ContentType::Movies)
    }

    pub fn shows() -> Self {
        Self::new(ContentType::Shows)
    }

    pub fn with_genres<I: IntoIterator<Item = u32>>(mut self, genre_ids: I) -> Self {
        self.genre_ids.extend(genre_ids);
        self
    }

    pub fn with_providers<I: IntoIterator<Item = u32>>(mut self, provider_ids: I) -> Self {
        self.provider_ids.extend(provider_ids);
        self
    }

    pub fn with_duration_max(mut self, minutes: u32) -> Self {
        self.duration_max = Some(minutes);
        self
    }

    /// Non-finite scores clear the filter; `-0.0` is stored as `0.0`
    pub fn with_score_min(mut self, score: f32) -> Self {
        self.score_min = score.is_finite().then_some(score + 0.0);
        self
    }

    /// Restrict releases to `[from, to]` (either bound optional)
    pub fn with_years(mut self, from: Option<i32>, to: Option<i32>) -> Self {
        self.year_from = from;
        self.year_to = to;
        self
    }

    pub fn with_sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = sort_key.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_does_not_matter() {
        let a = FilterSet::movies().with_genres([28, 12, 16]).with_providers([8, 337]);
        let b = FilterSet::movies().with_genres([16, 28, 12]).with_providers([337, 8]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_defaults() {
        let filters = FilterSet::shows();
        assert_eq!(filters.content_type, ContentType::Shows);
        assert_eq!(filters.sort_key, "popularity.desc");
        assert!(filters.genre_ids.is_empty());
    }

    #[test]
    fn test_score_min_is_normalised() {
        let zero = FilterSet::movies().with_score_min(-0.0);
        assert!(zero.score_min.unwrap().is_sign_positive());
        assert_eq!(FilterSet::movies().with_score_min(f32::INFINITY).score_min, None);
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let filters: FilterSet = serde_json::from_str(r#"{"content_type":"movies","genre_ids":[35,18]}"#).unwrap();
        assert_eq!(filters, FilterSet::movies().with_genres([18, 35]));
    }
}
