pub mod alternativa_html;
pub mod base;
pub mod plateanet_html;
pub mod serpapi_cinema;
pub mod songkick_html;

use std::sync::Arc;

use chrono_tz::Tz;

use crate::config::AppConfig;
use crate::models::ListingKind;
use crate::normalize::RawPayload;

/// A listings source. `fetch` is blocking and is run off the async runtime;
/// any error it returns is contained by the aggregator.
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &'static str;
    fn source_name(&self) -> &'static str;
    fn source_url(&self) -> &'static str;
    fn kind(&self) -> ListingKind;
    fn fetch(&self) -> anyhow::Result<Vec<RawPayload>>;
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct SourceInfo {
    pub id: String,
    pub name: String,
    pub url: String,
    pub kind: ListingKind,
}

/// Registration order is output order.
pub fn active_adapters(config: &AppConfig) -> Vec<Arc<dyn SourceAdapter>> {
    let tz: Tz = config.tz();
    vec![
        Arc::new(serpapi_cinema::SerpApiCinema::new(
            config.serpapi_key.clone(),
            config.cinema_titles.clone(),
        )),
        Arc::new(plateanet_html::Plateanet),
        Arc::new(alternativa_html::AlternativaTeatral),
        Arc::new(songkick_html::Songkick::new(tz)),
    ]
}

pub fn describe(adapters: &[Arc<dyn SourceAdapter>]) -> Vec<SourceInfo> {
    adapters
        .iter()
        .map(|adapter| SourceInfo {
            id: adapter.source_id().to_string(),
            name: adapter.source_name().to_string(),
            url: adapter.source_url().to_string(),
            kind: adapter.kind(),
        })
        .collect()
}
