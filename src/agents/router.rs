//! Keyword routing.

use tracing::debug;

use crate::core::{EndpointId, MessageRouter};

/// Routes a message to the first endpoint whose keyword list matches.
///
/// Matching is a case-insensitive substring test. Endpoints are tried in
/// insertion order; no match routes to the fallback endpoint.
#[derive(Debug, Clone)]
pub struct KeywordRouter {
    routes: Vec<(EndpointId, Vec<String>)>,
    fallback: EndpointId,
}

impl KeywordRouter {
    /// Empty router that sends everything to `fallback`.
    pub fn new(fallback: impl Into<EndpointId>) -> Self {
        Self {
            routes: Vec::new(),
            fallback: fallback.into(),
        }
    }

    /// Add a keyword list for `endpoint`. Keywords are lowercased.
    pub fn route<I, S>(mut self, endpoint: impl Into<EndpointId>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().to_lowercase())
            .collect();
        self.routes.push((endpoint.into(), keywords));
        self
    }

    /// The endpoint used when nothing matches.
    pub fn fallback(&self) -> &EndpointId {
        &self.fallback
    }

    /// Endpoint for `message`.
    pub fn resolve(&self, message: &str) -> EndpointId {
        let lowered = message.to_lowercase();
        let matched = self.routes.iter().find(|(_, keywords)| {
            keywords.iter().any(|keyword| lowered.contains(keyword.as_str()))
        });
        match matched {
            Some((endpoint, _)) => {
                debug!(endpoint = %endpoint, "message routed by keyword");
                endpoint.clone()
            }
            None => {
                debug!(endpoint = %self.fallback, "message routed to fallback");
                self.fallback.clone()
            }
        }
    }
}

impl Default for KeywordRouter {
    /// Food, travel, and real-estate keyword lists, falling back to food.
    fn default() -> Self {
        Self::new("food")
            .route(
                "food",
                [
                    "food", "restaurant", "eat", "hungry", "pizza", "burger", "meal", "cook",
                    "recipe", "dinner", "lunch", "breakfast", "delivery", "takeout",
                ],
            )
            .route(
                "travel",
                [
                    "travel", "vacation", "hotel", "flight", "trip", "beach", "tour",
                    "destination", "holiday", "sightseeing", "airport", "booking",
                ],
            )
            .route(
                "realestate",
                [
                    "house", "property", "real estate", "rent", "buy", "sell", "apartment",
                    "home", "mortgage", "price", "lease", "broker",
                ],
            )
    }
}

impl MessageRouter for KeywordRouter {
    fn route(&self, message: &str) -> EndpointId {
        self.resolve(message)
    }
}
