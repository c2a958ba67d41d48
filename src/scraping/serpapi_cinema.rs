use anyhow::{anyhow, bail, Result};
use serde::Deserialize;
use tracing::{info, warn};

use super::base;
use super::SourceAdapter;
use crate::models::ListingKind;
use crate::normalize::{RawPayload, ShowtimeDay, ShowtimeTheater, ShowtimesPayload};

const URL: &str = "https://serpapi.com/search.json";
const SOURCE_ID: &str = "serpapi_cinema";
const SOURCE_NAME: &str = "Google showtimes (SerpApi)";

pub const DEFAULT_TITLES: [&str; 3] = ["Thunderbolts*", "La carga más preciada", "Until Dawn"];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    knowledge_graph: Option<KnowledgeGraph>,
    #[serde(default)]
    local_results: Vec<LocalResult>,
    showtimes: Option<Vec<DayDoc>>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeGraph {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LocalResult {
    title: Option<String>,
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DayDoc {
    day: Option<String>,
    #[serde(default)]
    theaters: Vec<TheaterDoc>,
}

#[derive(Debug, Deserialize)]
struct TheaterDoc {
    name: Option<String>,
    address: Option<String>,
    #[serde(default)]
    showing: Vec<ShowingDoc>,
}

#[derive(Debug, Deserialize)]
struct ShowingDoc {
    #[serde(default)]
    time: Vec<String>,
}

/// Searches showtimes for a fixed list of titles, one request per title.
pub struct SerpApiCinema {
    api_key: Option<String>,
    titles: Vec<String>,
}

impl SerpApiCinema {
    pub fn new(api_key: Option<String>, titles: Vec<String>) -> Self {
        let titles = if titles.is_empty() {
            DEFAULT_TITLES.iter().map(|t| t.to_string()).collect()
        } else {
            titles
        };
        Self { api_key, titles }
    }

    fn search(&self, api_key: &str, title: &str) -> Result<Option<ShowtimesPayload>> {
        let query = format!("película {title} horarios cines Buenos Aires");
        let url = reqwest::Url::parse_with_params(
            URL,
            [
                ("api_key", api_key),
                ("q", query.as_str()),
                ("hl", "es"),
                ("gl", "ar"),
            ],
        )?;
        let response: SearchResponse = base::fetch_json(url)?;
        Ok(to_payload(title, response))
    }

    pub(crate) fn parse_response(&self, title: &str, body: &str) -> Result<Option<ShowtimesPayload>> {
        let response: SearchResponse = serde_json::from_str(body)?;
        Ok(to_payload(title, response))
    }
}

impl SourceAdapter for SerpApiCinema {
    fn source_id(&self) -> &'static str {
        SOURCE_ID
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    fn source_url(&self) -> &'static str {
        URL
    }

    fn kind(&self) -> ListingKind {
        ListingKind::Cinema
    }

    fn fetch(&self) -> Result<Vec<RawPayload>> {
        let api_key = match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => key,
            _ => bail!("SERPAPI_KEY is not configured"),
        };

        let mut payloads = Vec::new();
        let mut failures = 0usize;
        for title in &self.titles {
            match self.search(api_key, title) {
                Ok(Some(payload)) => payloads.push(RawPayload::Showtimes(payload)),
                Ok(None) => info!(title = %title, "no showtimes found, skipping title"),
                Err(err) => {
                    failures += 1;
                    warn!(title = %title, "showtime search failed: {err:#}");
                }
            }
        }

        if payloads.is_empty() && failures == self.titles.len() && failures > 0 {
            return Err(anyhow!("all {failures} showtime searches failed"));
        }
        Ok(payloads)
    }
}

fn to_payload(title: &str, response: SearchResponse) -> Option<ShowtimesPayload> {
    let days = response.showtimes?;
    let fallback_theater = response.local_results.into_iter().next();

    let days: Vec<ShowtimeDay> = days
        .into_iter()
        .filter_map(|day| {
            let label = day.day?;
            let theaters = day
                .theaters
                .into_iter()
                .map(|theater| ShowtimeTheater {
                    name: theater.name,
                    address: theater.address,
                    times: theater
                        .showing
                        .into_iter()
                        .flat_map(|showing| showing.time)
                        .collect(),
                })
                .collect();
            Some(ShowtimeDay { label, theaters })
        })
        .collect();

    if days.is_empty() {
        return None;
    }

    // theaters without a name borrow the top local result before falling back
    // to the placeholder
    let days = match fallback_theater {
        Some(LocalResult { title: Some(name), address }) => days
            .into_iter()
            .map(|mut day| {
                for theater in day.theaters.iter_mut() {
                    if theater.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
                        theater.name = Some(name.clone());
                        if theater.address.is_none() {
                            theater.address = address.clone();
                        }
                    }
                }
                day
            })
            .collect(),
        _ => days,
    };

    Some(ShowtimesPayload {
        title: title.to_string(),
        synopsis: response.knowledge_graph.and_then(|kg| kg.description),
        days,
    })
}
