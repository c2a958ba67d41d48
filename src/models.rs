use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    #[serde(alias = "cine")]
    Cinema,
    #[serde(alias = "teatro")]
    Theater,
    #[serde(alias = "música", alias = "musica")]
    Music,
}

impl ListingKind {
    pub const ALL: [ListingKind; 3] = [ListingKind::Cinema, ListingKind::Theater, ListingKind::Music];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListingKind::Cinema => "cinema",
            ListingKind::Theater => "theater",
            ListingKind::Music => "music",
        }
    }

    pub fn valid_values() -> Vec<&'static str> {
        Self::ALL.iter().map(|kind| kind.as_str()).collect()
    }
}

impl fmt::Display for ListingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown listing kind: {}", self.0)
    }
}

impl std::error::Error for UnknownKind {}

impl FromStr for ListingKind {
    type Err = UnknownKind;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "cinema" | "cine" => Ok(ListingKind::Cinema),
            "theater" | "theatre" | "teatro" => Ok(ListingKind::Theater),
            "music" | "música" | "musica" => Ok(ListingKind::Music),
            _ => Err(UnknownKind(input.to_string())),
        }
    }
}

/// One concrete showing. `date` drives temporal filtering; a slot without a
/// parseable date is always treated as current.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlot {
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "fecha")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "hora")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "nombreDia")]
    pub day_name: Option<String>,
    #[serde(default, skip_serializing_if = "is_false", alias = "oculta")]
    pub hidden: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    #[serde(default, alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "direccion")]
    pub address: String,
    #[serde(default, alias = "funciones")]
    pub functions: Vec<ScheduleSlot>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String, // stable hash: kind|name|venue_name
    #[serde(alias = "tipo")]
    pub kind: ListingKind,
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(default, alias = "lugar")]
    pub venue_name: String,
    #[serde(default, alias = "ubicacion")]
    pub address: String,
    #[serde(default, alias = "descripcion")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "fecha")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "hora")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", alias = "cines")]
    pub venues: Vec<Venue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", alias = "funciones")]
    pub functions: Vec<ScheduleSlot>,
}

impl ListingEntry {
    pub fn is_cinema(&self) -> bool {
        self.kind == ListingKind::Cinema
    }

    pub fn slot_count(&self) -> usize {
        self.functions.len()
            + self
                .venues
                .iter()
                .map(|venue| venue.functions.len())
                .sum::<usize>()
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct KindCounts {
    pub cinema: usize,
    pub theater: usize,
    pub music: usize,
}

impl KindCounts {
    pub fn tally(entries: &[ListingEntry]) -> Self {
        let mut counts = Self::default();
        for entry in entries {
            match entry.kind {
                ListingKind::Cinema => counts.cinema += 1,
                ListingKind::Theater => counts.theater += 1,
                ListingKind::Music => counts.music += 1,
            }
        }
        counts
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub refreshed_at: DateTime<Utc>,
    pub total: usize,
    pub counts: KindCounts,
    #[serde(default)]
    pub used_fallback: bool,
    #[serde(default)]
    pub failed_sources: Vec<String>,
}

/// Restaurant review export row. Sources disagree on shape, so everything
/// beyond `name` is optional and unknown fields are kept in `extra`.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Restaurant {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<RestaurantLocation>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RestaurantLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Restaurant {
    pub fn full_address(&self) -> Option<String> {
        let location = self.location.as_ref();
        let parts: Vec<String> = [
            location
                .and_then(|loc| loc.address1.clone())
                .or_else(|| self.address.clone()),
            location.and_then(|loc| loc.city.clone()),
            location.and_then(|loc| loc.zip_code.clone()),
            location.and_then(|loc| loc.country.clone()),
        ]
        .into_iter()
        .flatten()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Null(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) if value.trim().is_empty() => Vec::new(),
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
        OneOrMany::Null(()) => Vec::new(),
    })
}
