use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Concrete shape of a catalog entry, also half of the visited-ledger key
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ItemType {
    Movie,
    Show,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Movie => "movie",
            ItemType::Show => "show",
        }
    }
}

/// Fields shared by every catalog entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemBase {
    pub id: u64,
    pub adult: Option<bool>,
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
    pub original_language: Option<String>,
    pub poster_path: Option<String>,
    pub overview: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<u32>,
    pub popularity: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieItem {
    #[serde(flatten)]
    pub base: ItemBase,
    pub original_title: Option<String>,
    pub title: Option<String>,
    pub release_date: Option<String>,
    #[serde(rename = "video")]
    pub is_video: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShowItem {
    #[serde(flatten)]
    pub base: ItemBase,
    pub original_name: Option<String>,
    pub name: Option<String>,
    pub first_air_date: Option<String>,
    #[serde(rename = "origin_country", default)]
    pub origin_countries: Vec<String>,
}

/// A decoded catalog entry.
///
/// Only `Serialize` is derived: payloads carry no type tag, so decoding goes
/// through the field-sniffing decoder in `discovery-sources` instead of serde.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Item {
    Movie(MovieItem),
    Show(ShowItem),
}

impl Item {
    pub fn base(&self) -> &ItemBase {
        match self {
            Item::Movie(movie) => &movie.base,
            Item::Show(show) => &show.base,
        }
    }

    pub fn id(&self) -> u64 {
        self.base().id
    }

    pub fn item_type(&self) -> ItemType {
        match self {
            Item::Movie(_) => ItemType::Movie,
            Item::Show(_) => ItemType::Show,
        }
    }

    /// Localized title, falling back to the original one
    pub fn display_title(&self) -> Option<&str> {
        match self {
            Item::Movie(movie) => movie.title.as_deref().or(movie.original_title.as_deref()),
            Item::Show(show) => show.name.as_deref().or(show.original_name.as_deref()),
        }
    }

    pub fn display_original_title(&self) -> Option<&str> {
        match self {
            Item::Movie(movie) => movie.original_title.as_deref(),
            Item::Show(show) => show.original_name.as_deref(),
        }
    }

    /// Raw `YYYY-MM-DD` release (movies) or first air date (shows); empty strings are `None`
    pub fn display_release_date(&self) -> Option<&str> {
        let date = match self {
            Item::Movie(movie) => movie.release_date.as_deref(),
            Item::Show(show) => show.first_air_date.as_deref(),
        };
        date.filter(|d| !d.trim().is_empty())
    }

    pub fn release_date(&self) -> Option<NaiveDate> {
        self.display_release_date()
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
    }

    pub fn release_year(&self) -> Option<i32> {
        self.release_date().map(|d| d.year())
    }

    pub fn genre_ids(&self) -> &[u32] {
        &self.base().genre_ids
    }

    pub fn poster_path(&self) -> Option<&str> {
        self.base().poster_path.as_deref()
    }

    pub fn vote_average(&self) -> Option<f64> {
        self.base().vote_average
    }
}
