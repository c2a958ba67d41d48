//! Showtime sanitizer.
//!
//! Two passes share the same past/current classification:
//! `MarkOnly` flags past slots as hidden in place and never removes anything,
//! `HardFilter` builds a view without hidden or past slots and drops the
//! venues and cinema entries that end up empty.
//!
//! Comparison is by calendar date only. A slot whose date is missing or
//! unparseable is always current.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc, Weekday};
use chrono_tz::Tz;

use crate::models::{ListingEntry, ScheduleSlot, Venue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeMode {
    MarkOnly,
    HardFilter,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitizeStats {
    pub slots_marked: usize,
    pub days_relabelled: usize,
    pub slots_removed: usize,
    pub venues_removed: usize,
    pub entries_removed: usize,
}

#[derive(Debug, Clone)]
pub struct Sanitized {
    pub entries: Vec<ListingEntry>,
    pub changed: bool,
    pub stats: SanitizeStats,
}

pub fn sanitize(entries: Vec<ListingEntry>, mode: SanitizeMode, today: NaiveDate) -> Sanitized {
    match mode {
        SanitizeMode::MarkOnly => {
            let mut entries = entries;
            let stats = mark_past(&mut entries, today);
            Sanitized {
                entries,
                changed: stats.slots_marked > 0,
                stats,
            }
        }
        SanitizeMode::HardFilter => {
            let (entries, stats) = hard_filter(entries, today);
            let changed =
                stats.slots_removed + stats.venues_removed + stats.entries_removed > 0;
            Sanitized {
                entries,
                changed,
                stats,
            }
        }
    }
}

/// Flags every past, still-visible cinema slot as hidden. Already hidden slots
/// are left alone, so the pass is monotonic.
///
/// When something was flagged, day labels of dated cinema slots are recomputed
/// too, so documents with stale source labels get corrected on the same write.
/// Relabelling alone never counts as a change.
pub fn mark_past(entries: &mut [ListingEntry], today: NaiveDate) -> SanitizeStats {
    let mut stats = SanitizeStats::default();
    for slot in cinema_slots(entries) {
        if !slot.hidden && is_past(slot, today) {
            slot.hidden = true;
            stats.slots_marked += 1;
        }
    }
    if stats.slots_marked > 0 {
        stats.days_relabelled = cinema_slots(entries)
            .map(refresh_day_name)
            .filter(|relabelled| *relabelled)
            .count();
    }
    stats
}

fn cinema_slots(entries: &mut [ListingEntry]) -> impl Iterator<Item = &mut ScheduleSlot> {
    entries
        .iter_mut()
        .filter(|entry| entry.is_cinema())
        .flat_map(|entry| entry.venues.iter_mut())
        .flat_map(|venue| venue.functions.iter_mut())
}

pub fn hard_filter(entries: Vec<ListingEntry>, today: NaiveDate) -> (Vec<ListingEntry>, SanitizeStats) {
    let mut stats = SanitizeStats::default();
    let mut kept = Vec::with_capacity(entries.len());

    for mut entry in entries {
        if !entry.is_cinema() {
            kept.push(entry);
            continue;
        }

        let venues = std::mem::take(&mut entry.venues);
        entry.venues = venues
            .into_iter()
            .filter_map(|venue| filter_venue(venue, today, &mut stats))
            .collect();

        let primary = match entry.venues.first() {
            Some(venue) => venue,
            None => {
                stats.entries_removed += 1;
                continue;
            }
        };
        // the entry-level venue mirrors the first venue still showing
        if primary.name != entry.venue_name {
            entry.venue_name = primary.name.clone();
            if !primary.address.is_empty() {
                entry.address = primary.address.clone();
            }
        }
        kept.push(entry);
    }

    (kept, stats)
}

fn filter_venue(mut venue: Venue, today: NaiveDate, stats: &mut SanitizeStats) -> Option<Venue> {
    let before = venue.functions.len();
    venue
        .functions
        .retain(|slot| !slot.hidden && !is_past(slot, today));
    stats.slots_removed += before - venue.functions.len();

    if venue.functions.is_empty() {
        stats.venues_removed += 1;
        None
    } else {
        Some(venue)
    }
}

pub fn is_past(slot: &ScheduleSlot, today: NaiveDate) -> bool {
    slot.date
        .as_deref()
        .and_then(parse_slot_date)
        .map(|date| date < today)
        .unwrap_or(false)
}

/// Accepts `YYYY-MM-DD`, ISO datetimes with or without offset, and
/// `DD/MM/YYYY`.
pub fn parse_slot_date(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.date_naive());
    }
    NaiveDate::parse_from_str(trimmed, "%d/%m/%Y").ok()
}

pub fn day_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Sun => "Domingo",
        Weekday::Mon => "Lunes",
        Weekday::Tue => "Martes",
        Weekday::Wed => "Miércoles",
        Weekday::Thu => "Jueves",
        Weekday::Fri => "Viernes",
        Weekday::Sat => "Sábado",
    }
}

/// Replaces the source day label with the one derived from `date` when the
/// date parses. Returns true if the label changed.
pub fn refresh_day_name(slot: &mut ScheduleSlot) -> bool {
    let derived = match slot.date.as_deref().and_then(parse_slot_date) {
        Some(date) => day_name(date),
        None => return false,
    };
    if slot.day_name.as_deref() == Some(derived) {
        return false;
    }
    slot.day_name = Some(derived.to_string());
    true
}

pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListingKind;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 15).expect("valid date")
    }

    fn slot(date: Option<&str>, time: &str) -> ScheduleSlot {
        ScheduleSlot {
            date: date.map(str::to_string),
            time: Some(time.to_string()),
            day_name: None,
            hidden: false,
        }
    }

    fn cinema(name: &str, venues: Vec<Venue>) -> ListingEntry {
        ListingEntry {
            id: String::new(),
            kind: ListingKind::Cinema,
            name: name.to_string(),
            venue_name: "Cinemark Palermo".to_string(),
            address: "Beruti 3399".to_string(),
            description: String::new(),
            date: None,
            time: None,
            venues,
            functions: Vec::new(),
        }
    }

    fn venue(name: &str, functions: Vec<ScheduleSlot>) -> Venue {
        Venue {
            name: name.to_string(),
            address: format!("{name} 100"),
            functions,
        }
    }

    fn theater_single(date: &str) -> ListingEntry {
        ListingEntry {
            id: String::new(),
            kind: ListingKind::Theater,
            name: "Toc Toc".to_string(),
            venue_name: "Multiteatro".to_string(),
            address: "Av. Corrientes 1283".to_string(),
            description: String::new(),
            date: Some(date.to_string()),
            time: Some("20:30".to_string()),
            venues: Vec::new(),
            functions: Vec::new(),
        }
    }

    #[test]
    fn hard_filter_keeps_only_upcoming_slot() {
        let input = vec![cinema(
            "Thunderbolts*",
            vec![venue(
                "Hoyts Abasto",
                vec![slot(Some("2025-05-14"), "19:00"), slot(Some("2025-05-16"), "21:10")],
            )],
        )];

        let result = sanitize(input, SanitizeMode::HardFilter, today());
        assert!(result.changed);
        assert_eq!(result.entries.len(), 1);
        let functions = &result.entries[0].venues[0].functions;
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].date.as_deref(), Some("2025-05-16"));
        assert_eq!(result.stats.slots_removed, 1);
    }

    #[test]
    fn mark_only_hides_past_slot_without_removing() {
        let input = vec![cinema(
            "Thunderbolts*",
            vec![venue(
                "Hoyts Abasto",
                vec![slot(Some("2025-05-14"), "19:00"), slot(Some("2025-05-16"), "21:10")],
            )],
        )];

        let result = sanitize(input, SanitizeMode::MarkOnly, today());
        assert!(result.changed);
        assert_eq!(result.stats.slots_marked, 1);
        let functions = &result.entries[0].venues[0].functions;
        assert_eq!(functions.len(), 2);
        assert!(functions[0].hidden);
        assert!(!functions[1].hidden);
    }

    #[test]
    fn entry_with_only_past_slots_disappears() {
        let input = vec![cinema(
            "Until Dawn",
            vec![venue(
                "Cinépolis Recoleta",
                vec![slot(Some("2025-05-14"), "18:00"), slot(Some("2025-05-14"), "22:00")],
            )],
        )];

        let result = sanitize(input, SanitizeMode::HardFilter, today());
        assert!(result.entries.is_empty());
        assert_eq!(result.stats.slots_removed, 2);
        assert_eq!(result.stats.venues_removed, 1);
        assert_eq!(result.stats.entries_removed, 1);
    }

    #[test]
    fn empty_venue_dropped_but_entry_kept() {
        let input = vec![cinema(
            "Misericordia",
            vec![
                venue("Gaumont", vec![slot(Some("2025-05-01"), "17:00")]),
                venue("Lorca", vec![slot(Some("2025-05-20"), "20:00")]),
            ],
        )];

        let result = sanitize(input, SanitizeMode::HardFilter, today());
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].venues.len(), 1);
        assert_eq!(result.entries[0].venues[0].name, "Lorca");
    }

    #[test]
    fn non_cinema_entries_bypass_both_modes() {
        let input = vec![theater_single("2020-01-01")];

        let marked = sanitize(input.clone(), SanitizeMode::MarkOnly, today());
        assert!(!marked.changed);
        assert_eq!(marked.entries, input);

        let filtered = sanitize(input.clone(), SanitizeMode::HardFilter, today());
        assert!(!filtered.changed);
        assert_eq!(filtered.entries, input);
    }

    #[test]
    fn today_is_current_regardless_of_time() {
        let input = vec![cinema(
            "Mazel Tov",
            vec![venue(
                "Atlas",
                vec![slot(Some("2025-05-15"), "00:05"), slot(Some("2025-05-15T23:59:00"), "23:59")],
            )],
        )];

        let marked = sanitize(input.clone(), SanitizeMode::MarkOnly, today());
        assert!(!marked.changed);
        assert!(marked.entries[0].venues[0].functions.iter().all(|s| !s.hidden));

        let filtered = sanitize(input, SanitizeMode::HardFilter, today());
        assert_eq!(filtered.entries[0].venues[0].functions.len(), 2);
    }

    #[test]
    fn missing_or_garbled_date_is_current() {
        let input = vec![cinema(
            "El casero",
            vec![venue(
                "Cosmos",
                vec![slot(None, "20:00"), slot(Some("próximamente"), "22:00")],
            )],
        )];

        let marked = sanitize(input.clone(), SanitizeMode::MarkOnly, today());
        assert!(!marked.changed);

        let filtered = sanitize(input, SanitizeMode::HardFilter, today());
        assert_eq!(filtered.entries[0].venues[0].functions.len(), 2);
    }

    #[test]
    fn hard_filter_drops_hidden_slots_even_if_future() {
        let mut hidden_future = slot(Some("2025-06-01"), "20:00");
        hidden_future.hidden = true;
        let input = vec![cinema(
            "Sneaks",
            vec![venue("Village", vec![hidden_future, slot(Some("2025-06-02"), "20:00")])],
        )];

        let filtered = sanitize(input, SanitizeMode::HardFilter, today());
        let functions = &filtered.entries[0].venues[0].functions;
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].date.as_deref(), Some("2025-06-02"));
    }

    #[test]
    fn hard_filter_is_idempotent() {
        let input = vec![
            cinema(
                "A",
                vec![
                    venue("V1", vec![slot(Some("2025-05-10"), "10:00"), slot(None, "12:00")]),
                    venue("V2", vec![slot(Some("2025-05-10"), "10:00")]),
                ],
            ),
            cinema("B", vec![venue("V3", vec![slot(Some("2025-05-30"), "18:00")])]),
            theater_single("2024-12-31"),
        ];

        let once = sanitize(input, SanitizeMode::HardFilter, today());
        let twice = sanitize(once.entries.clone(), SanitizeMode::HardFilter, today());
        assert_eq!(once.entries, twice.entries);
        assert!(!twice.changed);
    }

    #[test]
    fn mark_only_is_monotonic_and_non_destructive() {
        let input = vec![cinema(
            "A",
            vec![
                venue("V1", vec![slot(Some("2025-05-10"), "10:00")]),
                venue("V2", vec![slot(Some("2025-05-20"), "10:00")]),
            ],
        )];
        let venue_count = input[0].venues.len();

        let first = sanitize(input, SanitizeMode::MarkOnly, today());
        assert!(first.changed);
        assert_eq!(first.entries.len(), 1);
        assert_eq!(first.entries[0].venues.len(), venue_count);

        // a later "today" never un-hides, and an earlier one never un-hides either
        let earlier = NaiveDate::from_ymd_opt(2025, 5, 1).expect("valid date");
        let second = sanitize(first.entries.clone(), SanitizeMode::MarkOnly, earlier);
        assert!(!second.changed);
        assert!(second.entries[0].venues[0].functions[0].hidden);
    }

    #[test]
    fn input_order_is_preserved() {
        let input = vec![
            cinema("First", vec![venue("V", vec![slot(Some("2025-05-20"), "10:00")])]),
            theater_single("2025-05-20"),
            cinema("Third", vec![venue("V", vec![slot(Some("2025-05-21"), "10:00")])]),
        ];
        let filtered = sanitize(input, SanitizeMode::HardFilter, today());
        let names: Vec<_> = filtered.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Toc Toc", "Third"]);
    }

    #[test]
    fn entry_venue_follows_first_surviving_venue() {
        let mut entry = cinema(
            "Misericordia",
            vec![
                venue("Gaumont", vec![slot(Some("2025-05-01"), "17:00")]),
                venue("Lorca", vec![slot(Some("2025-05-20"), "20:00")]),
            ],
        );
        entry.venue_name = "Gaumont".to_string();
        entry.address = "Gaumont 100".to_string();

        let filtered = sanitize(vec![entry], SanitizeMode::HardFilter, today());
        assert_eq!(filtered.entries[0].venue_name, "Lorca");
        assert_eq!(filtered.entries[0].address, "Lorca 100");

        let again = sanitize(filtered.entries.clone(), SanitizeMode::HardFilter, today());
        assert_eq!(again.entries, filtered.entries);
    }

    #[test]
    fn marking_pass_corrects_stale_day_labels() {
        let mut upcoming = slot(Some("2025-05-16"), "21:00");
        upcoming.day_name = Some("Lunes".into());
        let input = vec![cinema(
            "Thunderbolts*",
            vec![venue("Hoyts Abasto", vec![slot(Some("2025-05-14"), "19:00"), upcoming])],
        )];

        let marked = sanitize(input, SanitizeMode::MarkOnly, today());
        assert!(marked.changed);
        assert_eq!(marked.stats.days_relabelled, 2);
        let functions = &marked.entries[0].venues[0].functions;
        assert_eq!(functions[0].day_name.as_deref(), Some("Miércoles"));
        assert_eq!(functions[1].day_name.as_deref(), Some("Viernes"));
    }

    #[test]
    fn stale_day_label_alone_is_not_a_change() {
        let mut upcoming = slot(Some("2025-05-16"), "21:00");
        upcoming.day_name = Some("Lunes".into());
        let input = vec![cinema("Thunderbolts*", vec![venue("Hoyts Abasto", vec![upcoming])])];

        let marked = sanitize(input.clone(), SanitizeMode::MarkOnly, today());
        assert!(!marked.changed);
        assert_eq!(marked.entries, input);
    }

    #[test]
    fn parses_supported_date_shapes() {
        let expected = NaiveDate::from_ymd_opt(2025, 5, 11);
        assert_eq!(parse_slot_date("2025-05-11"), expected);
        assert_eq!(parse_slot_date("2025-05-11T12:00:00"), expected);
        assert_eq!(parse_slot_date("2025-05-11T20:30:00-03:00"), expected);
        assert_eq!(parse_slot_date("11/05/2025"), expected);
        assert_eq!(parse_slot_date("dom 11 may"), None);
        assert_eq!(parse_slot_date(""), None);
    }

    #[test]
    fn derives_day_name_instead_of_trusting_source() {
        let mut mislabelled = ScheduleSlot {
            date: Some("2025-05-11".into()),
            time: Some("19:30".into()),
            day_name: Some("Lunes".into()),
            hidden: false,
        };
        assert!(refresh_day_name(&mut mislabelled));
        assert_eq!(mislabelled.day_name.as_deref(), Some("Domingo"));
        assert!(!refresh_day_name(&mut mislabelled));

        let mut undated = ScheduleSlot {
            day_name: Some("Sábado".into()),
            ..ScheduleSlot::default()
        };
        assert!(!refresh_day_name(&mut undated));
        assert_eq!(undated.day_name.as_deref(), Some("Sábado"));
    }
}
