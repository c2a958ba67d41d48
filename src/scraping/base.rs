use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use scraper::{ElementRef, Selector};
use serde::de::DeserializeOwned;

static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(20))
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) Cartelera/0.1")
        .build()
        .expect("http client")
});

static WEEKDAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(domingo|lunes|martes|mi[ée]rcoles|jueves|viernes|s[áa]bado)s?\b")
        .expect("valid weekday regex")
});

pub fn clean_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

pub fn first_text(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|node| {
            let cleaned = inner_text(node);
            if cleaned.is_empty() {
                None
            } else {
                Some(cleaned)
            }
        })
        .flatten()
}

/// First non-empty text among several selectors, in order.
pub fn first_text_of(element: &ElementRef<'_>, selectors: &[&Selector]) -> Option<String> {
    selectors
        .iter()
        .find_map(|selector| first_text(element, selector))
}

pub fn inner_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn first_attr(element: &ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    element
        .select(selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::to_string)
}

pub fn fetch_html(url: &str) -> Result<String> {
    let response = CLIENT
        .get(url)
        .send()
        .with_context(|| format!("request failed for {url}"))?;
    let response = response
        .error_for_status()
        .with_context(|| format!("non-success status for {url}"))?;
    response
        .text()
        .with_context(|| format!("unable to read response body for {url}"))
}

pub fn fetch_json<T: DeserializeOwned>(url: reqwest::Url) -> Result<T> {
    let display = url.as_str().split('?').next().unwrap_or_default().to_string();
    let response = CLIENT
        .get(url)
        .send()
        .with_context(|| format!("request failed for {display}"))?;
    let response = response
        .error_for_status()
        .with_context(|| format!("non-success status for {display}"))?;
    response
        .json::<T>()
        .with_context(|| format!("unable to decode json from {display}"))
}

pub fn looks_like_captcha(html: &str) -> bool {
    let lower = html.to_lowercase();
    lower.contains("soy humano") || lower.contains("captcha")
}

pub fn parse_weekday(text: &str) -> Option<Weekday> {
    let lower = text.trim().to_lowercase();
    let weekday = if lower.starts_with("dom") {
        Weekday::Sun
    } else if lower.starts_with("lun") {
        Weekday::Mon
    } else if lower.starts_with("mar") {
        Weekday::Tue
    } else if lower.starts_with("mié") || lower.starts_with("mie") {
        Weekday::Wed
    } else if lower.starts_with("jue") {
        Weekday::Thu
    } else if lower.starts_with("vie") {
        Weekday::Fri
    } else if lower.starts_with("sáb") || lower.starts_with("sab") {
        Weekday::Sat
    } else {
        return None;
    };
    Some(weekday)
}

/// Every weekday mentioned in `text`, in order of first appearance.
pub fn weekdays_in(text: &str) -> Vec<Weekday> {
    let mut found = Vec::new();
    for caps in WEEKDAY_RE.captures_iter(text) {
        if let Some(day) = caps.get(1).and_then(|m| parse_weekday(m.as_str())) {
            if !found.contains(&day) {
                found.push(day);
            }
        }
    }
    found
}

/// Builds a date from a day and month without a year, assuming the nearest
/// upcoming occurrence.
pub fn date_without_year(day: u32, month: u32, today: NaiveDate) -> Option<NaiveDate> {
    let year = if month < today.month() {
        today.year() + 1
    } else {
        today.year()
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn english_month(text: &str) -> Option<u32> {
    let lower = text.trim().to_lowercase();
    let prefix: String = lower.chars().take(3).collect();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
