use anyhow::Result;
use chrono::NaiveDate;
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use super::base;
use super::SourceAdapter;
use crate::models::ListingKind;
use crate::normalize::{RawPayload, SinglePayload, ADDRESS_PLACEHOLDER};
use crate::schedule;

const URL: &str = "https://www.songkick.com/metro-areas/1521-argentina-buenos-aires";
const SOURCE_ID: &str = "songkick";
const SOURCE_NAME: &str = "Songkick Buenos Aires";
const DEFAULT_TIME: &str = "21:00";

static CARD_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".event-listing").expect("songkick card selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".summary a.summary-title").expect("songkick title"));
static VENUE_LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".venue-name a").expect("songkick venue link"));
static VENUE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".venue-name").expect("songkick venue"));
static DATE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".date-time .date").expect("songkick date"));
static DATETIME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("time[datetime]").expect("songkick datetime"));
static ARTISTS_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".artists").expect("songkick artists"));
static DAY_MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2})\s+([A-Za-z]+)(?:\s+(\d{4}))?").expect("valid day/month regex")
});

pub struct Songkick {
    tz: Tz,
}

impl Songkick {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub(crate) fn parse_document(&self, html: &str, today: NaiveDate) -> Result<Vec<RawPayload>> {
        let document = Html::parse_document(html);
        let mut concerts = Vec::new();

        for card in document.select(&CARD_SELECTOR) {
            let title = match base::first_text(&card, &TITLE_SELECTOR) {
                Some(text) => text,
                None => continue,
            };

            let venue = base::first_text(&card, &VENUE_LINK_SELECTOR);
            let address = match base::first_text(&card, &VENUE_SELECTOR) {
                Some(label) => format!("{label}, Buenos Aires"),
                None => ADDRESS_PLACEHOLDER.to_string(),
            };

            let machine_date = base::first_attr(&card, &DATETIME_SELECTOR, "datetime")
                .and_then(|value| schedule::parse_slot_date(&value));
            let date = machine_date
                .or_else(|| {
                    base::first_text(&card, &DATE_SELECTOR)
                        .and_then(|text| parse_listing_date(&text, today))
                })
                .unwrap_or(today);

            let description = match base::first_text(&card, &ARTISTS_SELECTOR) {
                Some(artists) => format!("Concierto de {artists}"),
                None => "Evento musical en vivo".to_string(),
            };

            concerts.push(RawPayload::Single(SinglePayload {
                kind: ListingKind::Music,
                title,
                venue,
                address: Some(address),
                description: Some(description),
                date: Some(date.format("%Y-%m-%d").to_string()),
                time: Some(DEFAULT_TIME.to_string()),
            }));
        }

        Ok(concerts)
    }
}

impl SourceAdapter for Songkick {
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
        ListingKind::Music
    }

    fn fetch(&self) -> Result<Vec<RawPayload>> {
        let html = base::fetch_html(URL)?;
        self.parse_document(&html, schedule::today_in(self.tz))
    }
}

/// `Saturday 17 May 2025` or `17 May`. A missing year means the next
/// occurrence from `today`.
fn parse_listing_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let caps = DAY_MONTH_RE.captures(text)?;
    let day: u32 = caps[1].parse().ok()?;
    let month = base::english_month(&caps[2])?;
    match caps.get(3).and_then(|year| year.as_str().parse::<i32>().ok()) {
        Some(year) => NaiveDate::from_ymd_opt(year, month, day),
        None => base::date_without_year(day, month, today),
    }
}
