use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use super::base;
use super::SourceAdapter;
use crate::models::ListingKind;
use crate::normalize::{RawPayload, SinglePayload};

const URL: &str = "https://www.plateanet.com/Obras/teatro";
const SOURCE_ID: &str = "plateanet";
const SOURCE_NAME: &str = "Plateanet";
const AREA: &str = "CABA, Buenos Aires";

static CARD_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div[class^="itemObra"]"#).expect("plateanet card selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".tituloObra").expect("plateanet title"));
static VENUE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".lugarObra").expect("plateanet venue"));
static DESCRIPTION_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".descripcionObra").expect("plateanet description"));

pub struct Plateanet;

impl SourceAdapter for Plateanet {
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

impl Plateanet {
    /// The listing page carries no showtimes, so plays come out schedule-less.
    pub(crate) fn parse_document(&self, html: &str) -> Result<Vec<RawPayload>> {
        if base::looks_like_captcha(html) {
            bail!("plateanet answered with a captcha page");
        }

        let document = Html::parse_document(html);
        let mut plays = Vec::new();

        for card in document.select(&CARD_SELECTOR) {
            let title = match base::first_text(&card, &TITLE_SELECTOR) {
                Some(text) => text,
                None => continue,
            };

            plays.push(RawPayload::Single(SinglePayload {
                kind: ListingKind::Theater,
                title,
                venue: base::first_text(&card, &VENUE_SELECTOR),
                address: Some(AREA.to_string()),
                description: base::first_text(&card, &DESCRIPTION_SELECTOR),
                date: None,
                time: None,
            }));
        }

        Ok(plays)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = r#"
    <div class="itemObra destacada">
        <h3 class="tituloObra">Toc Toc</h3>
        <span class="lugarObra">Multiteatro Comafi</span>
        <p class="descripcionObra">Comedia sobre pacientes con TOC.</p>
    </div>
    <div class="itemObra">
        <h3 class="tituloObra">   </h3>
        <span class="lugarObra">Teatro sin título</span>
    </div>
    <div class="itemObraChica">
        <h3 class="tituloObra">Casados sin hijos</h3>
    </div>
    <div class="otroBloque"><h3 class="tituloObra">No es una obra</h3></div>
    "#;

    #[test]
    fn parses_plateanet_cards() {
        let plays = Plateanet.parse_document(SAMPLE_HTML).expect("parse html");
        assert_eq!(plays.len(), 2);

        match &plays[0] {
            RawPayload::Single(play) => {
                assert_eq!(play.title, "Toc Toc");
                assert_eq!(play.venue.as_deref(), Some("Multiteatro Comafi"));
                assert_eq!(play.description.as_deref(), Some("Comedia sobre pacientes con TOC."));
                assert!(play.date.is_none());
            }
            other => panic!("unexpected payload {other:?}"),
        }

        match &plays[1] {
            RawPayload::Single(play) => {
                assert_eq!(play.title, "Casados sin hijos");
                assert!(play.venue.is_none());
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn captcha_page_is_an_error() {
        let html = "<html><body><form>Soy humano</form></body></html>";
        assert!(Plateanet.parse_document(html).is_err());
    }
}
