use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use super::base;
use super::SourceAdapter;
use crate::models::ListingKind;
use crate::normalize::{RawPayload, WeeklyPayload, WeeklyShowing};

const URL: &str = "https://www.alternativateatral.com/cartelera.asp";
const SOURCE_ID: &str = "alternativa_teatral";
const SOURCE_NAME: &str = "Alternativa Teatral";

static CARD_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#cartelera .espectaculo").expect("alternativa card selector"));
static TITLE_LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".titulo a").expect("alternativa title link"));
static H2_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").expect("alternativa h2"));
static H3_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h3").expect("alternativa h3"));
static SALA_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".sala").expect("alternativa sala"));
static LUGAR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".lugar").expect("alternativa lugar"));
static ADDRESS_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".direccion").expect("alternativa direccion"));
static FUNCTIONS_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".funciones").expect("alternativa funciones"));
static EXTRA_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".adicional").expect("alternativa adicional"));
static SYNOPSIS_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".sinopsis").expect("alternativa sinopsis"));

static DAY_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(domingo|lunes|martes|mi[ée]rcoles|jueves|viernes|s[áa]bado)s?\s+(?:a\s+las\s+)?(\d{1,2})[:.](\d{2})",
    )
    .expect("valid day/time regex")
});
static ANY_TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})[:.](\d{2})").expect("valid time regex"));
static UPPERCASE_VENUE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-ZÁÉÍÓÚÜÑ0-9\s.&-]+)([A-ZÁÉÍÓÚÜÑ][a-záéíóúüñ])").expect("valid venue regex")
});

pub struct AlternativaTeatral;

impl SourceAdapter for AlternativaTeatral {
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
        ListingKind::Theater
    }

    fn fetch(&self) -> Result<Vec<RawPayload>> {
        let html = base::fetch_html(URL)?;
        self.parse_document(&html)
    }
}

impl AlternativaTeatral {
    pub(crate) fn parse_document(&self, html: &str) -> Result<Vec<RawPayload>> {
        let document = Html::parse_document(html);
        let mut plays = Vec::new();

        for card in document.select(&CARD_SELECTOR) {
            let title = match base::first_text_of(
                &card,
                &[&TITLE_LINK_SELECTOR, &H2_SELECTOR, &H3_SELECTOR],
            ) {
                Some(text) => text,
                None => continue,
            };

            let venue_text = base::first_text_of(&card, &[&SALA_SELECTOR, &LUGAR_SELECTOR]);
            let (venue, split_address) = match venue_text.as_deref() {
                Some(text) => split_venue_address(text),
                None => (String::new(), String::new()),
            };
            let address = base::first_text(&card, &ADDRESS_SELECTOR)
                .or_else(|| Some(split_address).filter(|a| !a.is_empty()));

            let schedule_text = base::first_text_of(&card, &[&FUNCTIONS_SELECTOR, &EXTRA_SELECTOR])
                .unwrap_or_default();
            let mut showings = parse_showings(&schedule_text);
            if showings.is_empty() {
                showings = parse_showings(&base::inner_text(card));
            }

            plays.push(RawPayload::Weekly(WeeklyPayload {
                kind: ListingKind::Theater,
                title,
                venue: Some(venue).filter(|v| !v.is_empty()),
                address,
                description: base::first_text(&card, &SYNOPSIS_SELECTOR),
                showings,
            }));
        }

        Ok(plays)
    }
}

/// Reads recurring showings from free text. Explicit `day time` pairs win;
/// otherwise every mentioned day gets the first time found in the text.
pub fn parse_showings(text: &str) -> Vec<WeeklyShowing> {
    let mut showings: Vec<WeeklyShowing> = Vec::new();

    let mut paired = false;
    for caps in DAY_TIME_RE.captures_iter(text) {
        let weekday = match base::parse_weekday(&caps[1]) {
            Some(day) => day,
            None => continue,
        };
        if let Some(time) = format_time(&caps[2], &caps[3]) {
            paired = true;
            push_unique(&mut showings, WeeklyShowing { weekday, time });
        }
    }
    if paired {
        return showings;
    }

    let time = ANY_TIME_RE
        .captures(text)
        .and_then(|caps| format_time(&caps[1], &caps[2]));
    if let Some(time) = time {
        for weekday in base::weekdays_in(text) {
            push_unique(
                &mut showings,
                WeeklyShowing {
                    weekday,
                    time: time.clone(),
                },
            );
        }
    }
    showings
}

fn push_unique(showings: &mut Vec<WeeklyShowing>, showing: WeeklyShowing) {
    if !showings.contains(&showing) {
        showings.push(showing);
    }
}

fn format_time(hour: &str, minute: &str) -> Option<String> {
    let hour: u32 = hour.parse().ok()?;
    let minute: u32 = minute.parse().ok()?;
    if hour < 24 && minute < 60 {
        Some(format!("{hour:02}:{minute:02}"))
    } else {
        None
    }
}

/// Splits strings like `TEATRO SANCOR Av. Corrientes 1234` into venue and
/// address. Lossy by nature: tries an upper-case venue block, then the first
/// digit, then a ` - ` separator, and otherwise keeps everything as venue.
pub fn split_venue_address(raw: &str) -> (String, String) {
    let text = base::clean_text(raw);

    if let Some(caps) = UPPERCASE_VENUE_RE.captures(&text) {
        if let Some(block) = caps.get(1) {
            let venue = block.as_str().trim();
            if venue.chars().any(|c| c.is_alphabetic()) {
                let address = text[block.end()..].trim();
                return (venue.to_string(), address.to_string());
            }
        }
    }

    if let Some(index) = text.find(|c: char| c.is_ascii_digit()) {
        if index > 0 {
            let venue = text[..index].trim().trim_end_matches('-').trim();
            return (venue.to_string(), text[index..].trim().to_string());
        }
    }

    if let Some((venue, rest)) = text.split_once(" - ") {
        return (venue.trim().to_string(), rest.trim().to_string());
    }

    (text, String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    const SAMPLE_HTML: &str = r#"
    <div id="cartelera">
        <div class="espectaculo">
            <div class="titulo"><a href="/obra1">Bodas de Sangre</a></div>
            <div class="sala">TEATRO SANCOR Av. Corrientes 1234</div>
            <div class="funciones">Funciones: Sábados 20:30 hs, Domingos a las 19.00</div>
            <div class="sinopsis">Clásico de Lorca.</div>
        </div>
        <div class="espectaculo">
            <h2>La Noche de la Iguana</h2>
            <div class="lugar">DUMONT 4040Santos Dumont 4040 - Capital Federal - Buenos Aires</div>
            <div class="direccion">Santos Dumont 4040, CABA</div>
            <div class="adicional">Viernes y sábados, 21:00</div>
        </div>
        <div class="espectaculo">
            <h3>Streaming</h3>
            <div class="sala">ON DEMAND</div>
        </div>
        <div class="espectaculo"><div class="sala">Sala sin obra</div></div>
    </div>
    "#;

    #[test]
    fn parses_alternativa_cards() {
        let plays = AlternativaTeatral.parse_document(SAMPLE_HTML).expect("parse html");
        assert_eq!(plays.len(), 3);

        let first = match &plays[0] {
            RawPayload::Weekly(play) => play,
            other => panic!("unexpected payload {other:?}"),
        };
        assert_eq!(first.title, "Bodas de Sangre");
        assert_eq!(first.venue.as_deref(), Some("TEATRO SANCOR"));
        assert_eq!(first.address.as_deref(), Some("Av. Corrientes 1234"));
        assert_eq!(
            first.showings,
            vec![
                WeeklyShowing {
                    weekday: Weekday::Sat,
                    time: "20:30".into()
                },
                WeeklyShowing {
                    weekday: Weekday::Sun,
                    time: "19:00".into()
                },
            ]
        );

        let second = match &plays[1] {
            RawPayload::Weekly(play) => play,
            other => panic!("unexpected payload {other:?}"),
        };
        assert_eq!(second.venue.as_deref(), Some("DUMONT 4040"));
        assert_eq!(second.address.as_deref(), Some("Santos Dumont 4040, CABA"));
        assert_eq!(second.showings.len(), 2);
        assert!(second.showings.iter().all(|s| s.time == "21:00"));

        let third = match &plays[2] {
            RawPayload::Weekly(play) => play,
            other => panic!("unexpected payload {other:?}"),
        };
        assert!(third.showings.is_empty());
        assert_eq!(third.venue.as_deref(), Some("ON DEMAND"));
    }

    #[test]
    fn splits_venue_and_address() {
        assert_eq!(
            split_venue_address("TEATRO SANCOR Av. Corrientes 1234"),
            ("TEATRO SANCOR".to_string(), "Av. Corrientes 1234".to_string())
        );
        assert_eq!(
            split_venue_address("GORRITI ART CENTER Av. Juan B. Justo 1617 - Capital Federal"),
            (
                "GORRITI ART CENTER".to_string(),
                "Av. Juan B. Justo 1617 - Capital Federal".to_string()
            )
        );
        assert_eq!(
            split_venue_address("DUMONT 4040Santos Dumont 4040 - Capital Federal - Buenos Aires"),
            (
                "DUMONT 4040".to_string(),
                "Santos Dumont 4040 - Capital Federal - Buenos Aires".to_string()
            )
        );
        assert_eq!(
            split_venue_address("El Método - Palermo"),
            ("El Método".to_string(), "Palermo".to_string())
        );
        assert_eq!(
            split_venue_address("Teatro del Pueblo"),
            ("Teatro del Pueblo".to_string(), String::new())
        );
    }

    #[test]
    fn pairs_every_day_with_shared_time() {
        let showings = parse_showings("Jueves, viernes y sábados a las 20 y 30, 20:30");
        assert_eq!(showings.len(), 3);
        assert_eq!(showings[0].weekday, Weekday::Thu);
        assert!(showings.iter().all(|s| s.time == "20:30"));
    }
}
