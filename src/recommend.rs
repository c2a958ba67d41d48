use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::models::{ListingEntry, Restaurant};
use crate::rationale::{parse_reply, RationaleGenerator};

pub const MAX_PROMPT_EVENTS: usize = 40;
pub const MAX_PROMPT_RESTAURANTS: usize = 70;

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub answer: String,
    pub event: Option<ListingEntry>,
    pub restaurant: Option<Restaurant>,
    /// False when the answer is the built-in template.
    pub generated: bool,
}

#[derive(Clone)]
pub struct Recommender {
    generator: Arc<dyn RationaleGenerator>,
}

impl Recommender {
    pub fn new(generator: Arc<dyn RationaleGenerator>) -> Self {
        Self { generator }
    }

    /// Never fails: an unreachable or confused generator yields the template.
    pub async fn recommend(
        &self,
        message: &str,
        events: &[ListingEntry],
        restaurants: &[Restaurant],
    ) -> Recommendation {
        let prompt = build_prompt(message, events, restaurants);
        let rationale = match self.generator.generate(&prompt).await {
            Ok(reply) => parse_reply(&reply),
            Err(err) => Err(err),
        };

        let rationale = match rationale {
            Ok(rationale) => rationale,
            Err(err) => {
                warn!("rationale generation failed, using template: {err}");
                return template_recommendation(events, restaurants);
            }
        };

        let event = rationale
            .event_name
            .as_deref()
            .and_then(|name| find_event(events, name))
            .or_else(|| mentioned_event(&rationale.answer, events))
            .or_else(|| events.first())
            .cloned();
        let restaurant = rationale
            .restaurant_name
            .as_deref()
            .and_then(|name| find_restaurant(restaurants, name))
            .or_else(|| mentioned_restaurant(&rationale.answer, restaurants))
            .or_else(|| restaurants.first())
            .cloned();

        info!(
            event = event.as_ref().map(|e| e.name.as_str()).unwrap_or("-"),
            restaurant = restaurant.as_ref().map(|r| r.name.as_str()).unwrap_or("-"),
            "recommendation generated"
        );

        Recommendation {
            answer: rationale.answer,
            event,
            restaurant,
            generated: true,
        }
    }
}

pub fn build_prompt(message: &str, events: &[ListingEntry], restaurants: &[Restaurant]) -> String {
    let events_text = events
        .iter()
        .take(MAX_PROMPT_EVENTS)
        .map(describe_event)
        .collect::<Vec<_>>()
        .join("\n\n");
    let restaurants_text = restaurants
        .iter()
        .take(MAX_PROMPT_RESTAURANTS)
        .map(describe_restaurant)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Recomendá una salida en Buenos Aires combinando un evento (cine, teatro o música) con un restaurante.\n\n\
         EVENTOS:\n{events_text}\n\n\
         RESTAURANTES:\n{restaurants_text}\n\n\
         MENSAJE DEL USUARIO: \"{message}\"\n\n\
         Reglas:\n\
         - Usá exactamente los nombres que aparecen en los datos; no inventes lugares.\n\
         - Si recomendás una película, elegí el cine más cercano al restaurante y explicá la cercanía.\n\
         - La respuesta tiene que ser conversacional.\n\n\
         Respondé solo con este JSON:\n\
         {{\"respuesta\": \"...\", \"evento_nombre\": \"...\", \"restaurante_nombre\": \"...\"}}\n",
        message = message.trim(),
    )
}

fn describe_event(event: &ListingEntry) -> String {
    let mut line = format!(
        "EVENTO: {} | TIPO: {} | LUGAR: {} | DIRECCIÓN: {}",
        event.name, event.kind, event.venue_name, event.address
    );
    if event.is_cinema() && !event.venues.is_empty() {
        line.push_str("\n  CINES:");
        for venue in &event.venues {
            line.push_str(&format!("\n    - {} | {}", venue.name, venue.address));
        }
    }
    line
}

fn describe_restaurant(restaurant: &Restaurant) -> String {
    format!(
        "RESTAURANTE: {} | CATEGORÍAS: {} | RATING: {} | DIRECCIÓN: {}",
        restaurant.name,
        restaurant.categories.join(", "),
        restaurant
            .rating
            .map(|rating| rating.to_string())
            .unwrap_or_default(),
        restaurant
            .full_address()
            .unwrap_or_else(|| "Sin dirección disponible".to_string()),
    )
}

/// Exact match on the title or venue first, then substring.
pub fn find_event<'a>(events: &'a [ListingEntry], name: &str) -> Option<&'a ListingEntry> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    events
        .iter()
        .find(|event| {
            event.name.to_lowercase() == needle || event.venue_name.to_lowercase() == needle
        })
        .or_else(|| {
            events.iter().find(|event| {
                event.name.to_lowercase().contains(&needle)
                    || event.venue_name.to_lowercase().contains(&needle)
            })
        })
}

pub fn find_restaurant<'a>(restaurants: &'a [Restaurant], name: &str) -> Option<&'a Restaurant> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    restaurants
        .iter()
        .find(|restaurant| restaurant.name.to_lowercase() == needle)
        .or_else(|| {
            restaurants
                .iter()
                .find(|restaurant| restaurant.name.to_lowercase().contains(&needle))
        })
}

fn mentioned_event<'a>(answer: &str, events: &'a [ListingEntry]) -> Option<&'a ListingEntry> {
    let answer = answer.to_lowercase();
    events.iter().find(|event| {
        let name = event.name.to_lowercase();
        !name.is_empty() && answer.contains(&name)
    })
}

fn mentioned_restaurant<'a>(answer: &str, restaurants: &'a [Restaurant]) -> Option<&'a Restaurant> {
    let answer = answer.to_lowercase();
    restaurants.iter().find(|restaurant| {
        let name = restaurant.name.to_lowercase();
        !name.is_empty() && answer.contains(&name)
    })
}

/// Pairs the first listing with the best-rated restaurant.
pub fn template_recommendation(
    events: &[ListingEntry],
    restaurants: &[Restaurant],
) -> Recommendation {
    let event = events.first();
    let mut restaurant: Option<&Restaurant> = None;
    for candidate in restaurants {
        let better = match restaurant {
            None => true,
            Some(best) => candidate.rating.unwrap_or(0.0) > best.rating.unwrap_or(0.0),
        };
        if better {
            restaurant = Some(candidate);
        }
    }

    let answer = match (event, restaurant) {
        (Some(event), Some(restaurant)) => format!(
            "Te sugerimos {} en {} y después comer en {}{}.",
            event.name,
            event.venue_name,
            restaurant.name,
            restaurant
                .full_address()
                .map(|address| format!(" ({address})"))
                .unwrap_or_default(),
        ),
        (Some(event), None) => format!("Te sugerimos {} en {}.", event.name, event.venue_name),
        (None, Some(restaurant)) => format!(
            "No hay eventos en cartelera por ahora, pero podés comer en {}.",
            restaurant.name
        ),
        (None, None) => "No hay eventos ni restaurantes disponibles por ahora.".to_string(),
    };

    Recommendation {
        answer,
        event: event.cloned(),
        restaurant: restaurant.cloned(),
        generated: false,
    }
}
