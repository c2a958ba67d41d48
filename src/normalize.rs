//! Turns adapter payloads into canonical [`ListingEntry`] values.
//!
//! Adapters hand over one of three loose shapes and never build entries
//! themselves, so the placeholder, dedup and day-name rules live in one place.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::models::{ListingEntry, ListingKind, ScheduleSlot, Venue};
use crate::schedule;
use crate::scraping::base::{clean_text, date_without_year};

/// Shown when a source cannot say where something plays; the UI turns it into
/// "ask the venue" messaging.
pub const VENUE_PLACEHOLDER: &str = "Sala no especificada";
pub const ADDRESS_PLACEHOLDER: &str = "Buenos Aires, Argentina";

/// How far ahead recurring weekday schedules are expanded.
pub const WEEKLY_HORIZON_DAYS: i64 = 14;

static DAY_LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d{1,2})\s*([a-záéíóú]{3})").expect("valid day label regex"));
static TWELVE_HOUR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d{1,2})(?:[:.](\d{2}))?\s*([ap])\.?\s*m\.?$").expect("valid 12h regex")
});
static TWENTY_FOUR_HOUR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[:.](\d{2})(?:\s*hs\.?)?$").expect("valid 24h regex"));

#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Showtimes(ShowtimesPayload),
    Weekly(WeeklyPayload),
    Single(SinglePayload),
}

/// A title with showtimes grouped by day, then by theater.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShowtimesPayload {
    pub title: String,
    pub synopsis: Option<String>,
    pub days: Vec<ShowtimeDay>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShowtimeDay {
    /// Source label such as `dom 11 may`, `hoy` or `mañana`.
    pub label: String,
    pub theaters: Vec<ShowtimeTheater>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShowtimeTheater {
    pub name: Option<String>,
    pub address: Option<String>,
    pub times: Vec<String>,
}

/// A title that repeats on given weekdays at a single venue.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyPayload {
    pub kind: ListingKind,
    pub title: String,
    pub venue: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub showings: Vec<WeeklyShowing>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyShowing {
    pub weekday: Weekday,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SinglePayload {
    pub kind: ListingKind,
    pub title: String,
    pub venue: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

pub fn normalize_all(payloads: Vec<RawPayload>, today: NaiveDate) -> Vec<ListingEntry> {
    payloads
        .into_iter()
        .filter_map(|payload| normalize(payload, today))
        .collect()
}

pub fn normalize(payload: RawPayload, today: NaiveDate) -> Option<ListingEntry> {
    match payload {
        RawPayload::Showtimes(payload) => from_showtimes(payload, today),
        RawPayload::Weekly(payload) => from_weekly(payload, today),
        RawPayload::Single(payload) => from_single(payload),
    }
}

fn from_showtimes(payload: ShowtimesPayload, today: NaiveDate) -> Option<ListingEntry> {
    let name = clean_field(Some(payload.title))?;
    let mut venues: Vec<Venue> = Vec::new();

    for day in payload.days {
        let date = resolve_day_label(&day.label, today);
        for theater in day.theaters {
            let venue_name =
                clean_field(theater.name).unwrap_or_else(|| VENUE_PLACEHOLDER.to_string());
            let address = clean_field(theater.address);
            let index = match venues.iter().position(|venue| venue.name == venue_name) {
                Some(index) => index,
                None => {
                    venues.push(Venue {
                        name: venue_name,
                        address: String::new(),
                        functions: Vec::new(),
                    });
                    venues.len() - 1
                }
            };
            let venue = &mut venues[index];
            // later days sometimes carry the address the first one lacked
            if venue.address.is_empty() {
                if let Some(address) = address {
                    venue.address = address;
                }
            }
            for time in theater.times {
                push_unique(
                    &mut venue.functions,
                    build_slot(date, Some(time.as_str()), Some(day.label.as_str())),
                );
            }
        }
    }

    venues.retain(|venue| !venue.functions.is_empty());
    if venues.is_empty() {
        return None;
    }

    let (venue_name, address) = venues
        .first()
        .map(|venue| (venue.name.clone(), venue.address.clone()))
        .unwrap_or_else(|| (VENUE_PLACEHOLDER.to_string(), String::new()));

    Some(finish(ListingEntry {
        id: String::new(),
        kind: ListingKind::Cinema,
        name,
        venue_name,
        address: if address.is_empty() {
            ADDRESS_PLACEHOLDER.to_string()
        } else {
            address
        },
        description: clean_field(payload.synopsis).unwrap_or_default(),
        date: None,
        time: None,
        venues,
        functions: Vec::new(),
    }))
}

fn from_weekly(payload: WeeklyPayload, today: NaiveDate) -> Option<ListingEntry> {
    let name = clean_field(Some(payload.title))?;
    let venue_name = clean_field(payload.venue).unwrap_or_else(|| VENUE_PLACEHOLDER.to_string());
    let address = clean_field(payload.address).unwrap_or_else(|| ADDRESS_PLACEHOLDER.to_string());

    let mut functions = Vec::new();
    for offset in 0..WEEKLY_HORIZON_DAYS {
        let date = today + Duration::days(offset);
        for showing in payload
            .showings
            .iter()
            .filter(|showing| showing.weekday == date.weekday())
        {
            push_unique(&mut functions, build_slot(Some(date), Some(showing.time.as_str()), None));
        }
    }

    let mut entry = ListingEntry {
        id: String::new(),
        kind: payload.kind,
        name,
        venue_name: venue_name.clone(),
        address: address.clone(),
        description: clean_field(payload.description).unwrap_or_default(),
        date: None,
        time: None,
        venues: Vec::new(),
        functions: Vec::new(),
    };

    if payload.kind == ListingKind::Cinema {
        if functions.is_empty() {
            return None;
        }
        entry.venues.push(Venue {
            name: venue_name,
            address,
            functions,
        });
    } else {
        entry.functions = functions;
    }

    Some(finish(entry))
}

fn from_single(payload: SinglePayload) -> Option<ListingEntry> {
    let name = clean_field(Some(payload.title))?;
    let venue_name = clean_field(payload.venue).unwrap_or_else(|| VENUE_PLACEHOLDER.to_string());
    let address = clean_field(payload.address).unwrap_or_else(|| ADDRESS_PLACEHOLDER.to_string());
    let date = clean_field(payload.date);
    let time = clean_field(payload.time).map(|time| normalize_time(&time));

    let mut entry = ListingEntry {
        id: String::new(),
        kind: payload.kind,
        name,
        venue_name: venue_name.clone(),
        address: address.clone(),
        description: clean_field(payload.description).unwrap_or_default(),
        date: date.clone(),
        time: time.clone(),
        venues: Vec::new(),
        functions: Vec::new(),
    };

    if payload.kind == ListingKind::Cinema {
        if date.is_none() && time.is_none() {
            return None;
        }
        let mut slot = ScheduleSlot {
            date,
            time,
            day_name: None,
            hidden: false,
        };
        schedule::refresh_day_name(&mut slot);
        entry.venues.push(Venue {
            name: venue_name,
            address,
            functions: vec![slot],
        });
        entry.date = None;
        entry.time = None;
    }

    Some(finish(entry))
}

fn finish(mut entry: ListingEntry) -> ListingEntry {
    entry.id = listing_id(entry.kind, &entry.name, &entry.venue_name);
    entry
}

pub fn listing_id(kind: ListingKind, name: &str, venue_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(name.as_bytes());
    hasher.update(b"|");
    hasher.update(venue_name.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

fn build_slot(date: Option<NaiveDate>, time: Option<&str>, label: Option<&str>) -> ScheduleSlot {
    let mut slot = ScheduleSlot {
        date: date.map(|d| d.format("%Y-%m-%d").to_string()),
        time: time.map(normalize_time).filter(|t| !t.is_empty()),
        day_name: label.map(clean_text).filter(|l| !l.is_empty()),
        hidden: false,
    };
    schedule::refresh_day_name(&mut slot);
    slot
}

fn push_unique(functions: &mut Vec<ScheduleSlot>, slot: ScheduleSlot) {
    let duplicate = functions
        .iter()
        .any(|existing| existing.date == slot.date && existing.time == slot.time);
    if !duplicate {
        functions.push(slot);
    }
}

/// Resolves labels like `dom11 may`, `hoy` or `mañana` to a calendar date.
/// Months earlier than the current one roll into next year.
pub fn resolve_day_label(label: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lowered = label.to_lowercase();
    if let Some(caps) = DAY_LABEL_RE.captures(&lowered) {
        let day: u32 = caps.get(1)?.as_str().parse().ok()?;
        if let Some(month) = month_number(caps.get(2)?.as_str()) {
            return date_without_year(day, month, today);
        }
    }
    if lowered.contains("hoy") || lowered.contains("today") {
        return Some(today);
    }
    if lowered.contains("mañana") || lowered.contains("tomorrow") {
        return Some(today + Duration::days(1));
    }
    None
}

fn month_number(abbrev: &str) -> Option<u32> {
    let month = match abbrev {
        "ene" | "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "abr" | "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "ago" | "aug" => 8,
        "sep" | "set" => 9,
        "oct" => 10,
        "nov" => 11,
        "dic" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// `3:50p. m.` → `15:50`, `11 a. m.` → `11:00`, `9:05` → `09:05`. Anything
/// else is returned trimmed but otherwise untouched.
pub fn normalize_time(input: &str) -> String {
    let cleaned = clean_text(input);
    let compact = cleaned.replace(". ", ".").replace(' ', "");

    if let Some(caps) = TWELVE_HOUR_RE.captures(&compact) {
        let hour: u32 = caps[1].parse().unwrap_or(0);
        let minute: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        let is_pm = caps[3].eq_ignore_ascii_case("p");
        let hour = match (is_pm, hour) {
            (true, h) if h < 12 => h + 12,
            (false, 12) => 0,
            (_, h) => h,
        };
        if hour < 24 && minute < 60 {
            return format!("{hour:02}:{minute:02}");
        }
    }

    if let Some(caps) = TWENTY_FOUR_HOUR_RE.captures(&cleaned) {
        let hour: u32 = caps[1].parse().unwrap_or(99);
        let minute: u32 = caps[2].parse().unwrap_or(99);
        if hour < 24 && minute < 60 {
            return format!("{hour:02}:{minute:02}");
        }
    }

    cleaned
}

fn clean_field(value: Option<String>) -> Option<String> {
    value.map(|v| clean_text(&v)).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 15).expect("valid date")
    }

    fn theater(name: &str, address: Option<&str>, times: &[&str]) -> ShowtimeTheater {
        ShowtimeTheater {
            name: Some(name.to_string()),
            address: address.map(str::to_string),
            times: times.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn groups_showtimes_per_venue_and_dedupes() {
        let payload = ShowtimesPayload {
            title: "Thunderbolts*".into(),
            synopsis: Some("Antihéroes de Marvel.".into()),
            days: vec![
                ShowtimeDay {
                    label: "jue15 may".into(),
                    theaters: vec![
                        theater("Hoyts Abasto", Some("Av. Corrientes 3247"), &["3:50p. m.", "3:50pm"]),
                        theater("Cinemark Palermo", None, &["9:10p. m."]),
                    ],
                },
                ShowtimeDay {
                    label: "vie 16 may".into(),
                    theaters: vec![theater("Hoyts Abasto", None, &["11:00a. m."])],
                },
            ],
        };

        let entry = normalize(RawPayload::Showtimes(payload), today()).expect("entry");
        assert_eq!(entry.kind, ListingKind::Cinema);
        assert_eq!(entry.venue_name, "Hoyts Abasto");
        assert_eq!(entry.address, "Av. Corrientes 3247");
        assert_eq!(entry.venues.len(), 2);

        let abasto = &entry.venues[0];
        assert_eq!(abasto.functions.len(), 2);
        assert_eq!(abasto.functions[0].date.as_deref(), Some("2025-05-15"));
        assert_eq!(abasto.functions[0].time.as_deref(), Some("15:50"));
        assert_eq!(abasto.functions[0].day_name.as_deref(), Some("Jueves"));
        assert_eq!(abasto.functions[1].time.as_deref(), Some("11:00"));
        assert_eq!(abasto.functions[1].day_name.as_deref(), Some("Viernes"));
        assert_eq!(entry.venues[1].functions[0].time.as_deref(), Some("21:10"));
        assert_eq!(entry.id.len(), 16);
    }

    #[test]
    fn omits_cinema_without_showtimes() {
        let payload = ShowtimesPayload {
            title: "La carga más preciada".into(),
            synopsis: None,
            days: vec![ShowtimeDay {
                label: "hoy".into(),
                theaters: vec![theater("Gaumont", None, &[])],
            }],
        };
        assert!(normalize(RawPayload::Showtimes(payload), today()).is_none());
    }

    #[test]
    fn unnamed_theater_gets_placeholder() {
        let payload = ShowtimesPayload {
            title: "Until Dawn".into(),
            synopsis: None,
            days: vec![ShowtimeDay {
                label: "mañana".into(),
                theaters: vec![ShowtimeTheater {
                    name: Some("   ".into()),
                    address: None,
                    times: vec!["20:00".into()],
                }],
            }],
        };
        let entry = normalize(RawPayload::Showtimes(payload), today()).expect("entry");
        assert_eq!(entry.venue_name, VENUE_PLACEHOLDER);
        assert_eq!(entry.address, ADDRESS_PLACEHOLDER);
        assert_eq!(entry.venues[0].functions[0].date.as_deref(), Some("2025-05-16"));
    }

    #[test]
    fn never_emits_blank_names() {
        let payload = SinglePayload {
            kind: ListingKind::Music,
            title: " \n ".into(),
            venue: Some("Luna Park".into()),
            address: None,
            description: None,
            date: Some("2025-05-20".into()),
            time: Some("21:00".into()),
        };
        assert!(normalize(RawPayload::Single(payload), today()).is_none());
    }

    #[test]
    fn expands_weekly_schedule_over_two_weeks() {
        let payload = WeeklyPayload {
            kind: ListingKind::Theater,
            title: "Bodas de Sangre".into(),
            venue: Some("Teatro San Martín".into()),
            address: Some("Corrientes 1530".into()),
            description: None,
            showings: vec![
                WeeklyShowing {
                    weekday: Weekday::Sat,
                    time: "20:30".into(),
                },
                WeeklyShowing {
                    weekday: Weekday::Sat,
                    time: "20.30 hs".into(),
                },
            ],
        };
        let entry = normalize(RawPayload::Weekly(payload), today()).expect("entry");
        let dates: Vec<_> = entry
            .functions
            .iter()
            .map(|slot| slot.date.clone().unwrap_or_default())
            .collect();
        assert_eq!(dates, vec!["2025-05-17".to_string(), "2025-05-24".to_string()]);
        assert!(entry
            .functions
            .iter()
            .all(|slot| slot.day_name.as_deref() == Some("Sábado")));
        assert!(entry.venues.is_empty());
    }

    #[test]
    fn weekly_theater_without_days_is_schedule_less() {
        let payload = WeeklyPayload {
            kind: ListingKind::Theater,
            title: "Obra sin horarios".into(),
            venue: None,
            address: None,
            description: Some("Obra de teatro alternativo".into()),
            showings: Vec::new(),
        };
        let entry = normalize(RawPayload::Weekly(payload), today()).expect("entry");
        assert!(entry.functions.is_empty());
        assert_eq!(entry.venue_name, VENUE_PLACEHOLDER);
    }

    #[test]
    fn single_cinema_becomes_one_venue() {
        let payload = SinglePayload {
            kind: ListingKind::Cinema,
            title: "Duna: Parte 2".into(),
            venue: Some("Cinemark Palermo".into()),
            address: Some("Beruti 3399, CABA".into()),
            description: None,
            date: Some("2025-05-18".into()),
            time: Some("7:30 pm".into()),
        };
        let entry = normalize(RawPayload::Single(payload), today()).expect("entry");
        assert!(entry.date.is_none());
        assert_eq!(entry.venues.len(), 1);
        let slot = &entry.venues[0].functions[0];
        assert_eq!(slot.time.as_deref(), Some("19:30"));
        assert_eq!(slot.day_name.as_deref(), Some("Domingo"));
    }

    #[test]
    fn resolves_day_labels() {
        assert_eq!(
            resolve_day_label("dom11 may", today()),
            NaiveDate::from_ymd_opt(2025, 5, 11)
        );
        assert_eq!(
            resolve_day_label("lun 3 feb", today()),
            NaiveDate::from_ymd_opt(2026, 2, 3)
        );
        assert_eq!(resolve_day_label("Hoy", today()), Some(today()));
        assert_eq!(resolve_day_label("próximamente", today()), None);
    }

    #[test]
    fn normalizes_time_strings() {
        assert_eq!(normalize_time("3:50p. m."), "15:50");
        assert_eq!(normalize_time("3:50pm"), "15:50");
        assert_eq!(normalize_time("12:15 a. m."), "00:15");
        assert_eq!(normalize_time("12:15 p. m."), "12:15");
        assert_eq!(normalize_time("11 am"), "11:00");
        assert_eq!(normalize_time("9:05"), "09:05");
        assert_eq!(normalize_time("21.00 hs"), "21:00");
        assert_eq!(normalize_time("a confirmar"), "a confirmar");
    }
}
