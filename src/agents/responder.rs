//! Canned replies.
//!
//! An offline [`ResponseGenerator`]: every endpoint has a list of keyword
//! topics with a fixed reply each, and a handful of generic replies picked at
//! random when no topic matches. Every exchange is appended to the
//! participant's conversation.

use std::collections::HashMap;
use std::future::Future;

use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::core::{EndpointId, GeneratorError, ParticipantId, ResponseGenerator};

/// Reply for an endpoint with no canned replies at all.
pub const UNKNOWN_ENDPOINT_REPLY: &str =
    "Happy to help with that. Could you tell me a little more about what you are looking for?";

/// Who said a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The participant.
    User,
    /// The endpoint.
    Assistant,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    /// Speaker.
    pub role: Role,
    /// Endpoint the turn belongs to.
    pub endpoint: EndpointId,
    /// Text.
    pub content: String,
}

#[derive(Debug, Clone, Default)]
struct Script {
    topics: Vec<(Vec<&'static str>, &'static str)>,
    generic: Vec<&'static str>,
}

/// Keyword-driven reply generator with conversation memory.
#[derive(Debug, Default)]
pub struct CannedResponder {
    scripts: HashMap<EndpointId, Script>,
    conversations: Mutex<HashMap<ParticipantId, Vec<Turn>>>,
}

impl CannedResponder {
    /// Responder with no scripts.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a topic: any of `keywords` in the message selects `reply`.
    pub fn topic(
        mut self,
        endpoint: impl Into<EndpointId>,
        keywords: &[&'static str],
        reply: &'static str,
    ) -> Self {
        self.scripts
            .entry(endpoint.into())
            .or_default()
            .topics
            .push((keywords.to_vec(), reply));
        self
    }

    /// Add a generic reply for `endpoint`.
    pub fn generic(mut self, endpoint: impl Into<EndpointId>, reply: &'static str) -> Self {
        self.scripts
            .entry(endpoint.into())
            .or_default()
            .generic
            .push(reply);
        self
    }

    /// Reply without touching the conversation.
    pub fn compose(&self, endpoint: &EndpointId, message: &str) -> String {
        let Some(script) = self.scripts.get(endpoint) else {
            return UNKNOWN_ENDPOINT_REPLY.to_string();
        };
        let lowered = message.to_lowercase();
        let topic = script
            .topics
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)));
        if let Some((_, reply)) = topic {
            return (*reply).to_string();
        }
        script
            .generic
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(UNKNOWN_ENDPOINT_REPLY)
            .to_string()
    }

    /// The participant's conversation so far.
    pub async fn conversation(&self, participant: &ParticipantId) -> Vec<Turn> {
        self.conversations
            .lock()
            .await
            .get(participant)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop the participant's conversation.
    pub async fn forget(&self, participant: &ParticipantId) {
        self.conversations.lock().await.remove(participant);
    }

    async fn exchange(
        &self,
        endpoint: &EndpointId,
        message: &str,
        participant: &ParticipantId,
    ) -> String {
        let reply = self.compose(endpoint, message);
        let mut conversations = self.conversations.lock().await;
        let turns = conversations.entry(participant.clone()).or_default();
        turns.push(Turn {
            role: Role::User,
            endpoint: endpoint.clone(),
            content: message.to_string(),
        });
        turns.push(Turn {
            role: Role::Assistant,
            endpoint: endpoint.clone(),
            content: reply.clone(),
        });
        debug!(participant = %participant, endpoint = %endpoint, turns = turns.len(), "canned reply");
        reply
    }
}

impl ResponseGenerator for CannedResponder {
    fn answer(
        &self,
        endpoint: &EndpointId,
        message: &str,
        participant: &ParticipantId,
    ) -> impl Future<Output = Result<String, GeneratorError>> + Send {
        async move { Ok(self.exchange(endpoint, message, participant).await) }
    }
}

impl CannedResponder {
    /// Scripts for the food, travel, and real-estate endpoints.
    pub fn with_default_scripts() -> Self {
        Self::empty()
            // food
            .topic(
                "food",
                &["pizza", "italian"],
                "Try the wood-fired place downtown. Their margherita is simple and excellent.",
            )
            .topic(
                "food",
                &["burger", "fast food"],
                "The new burger bar near the centre does a great smash burger with caramelised onions.",
            )
            .topic(
                "food",
                &["healthy", "salad", "diet"],
                "For something light, the cafe on Main Street has good grain bowls and fresh salads.",
            )
            .topic(
                "food",
                &["chinese", "asian"],
                "There is a dim sum spot on the east side that locals swear by. Go early on weekends.",
            )
            .topic(
                "food",
                &["breakfast", "morning"],
                "For breakfast, the corner bakery does great pancakes and roasts its own coffee.",
            )
            .generic(
                "food",
                "The Italian restaurant downtown is a safe bet. Good pasta and a decent wine list.",
            )
            .generic(
                "food",
                "The seafood place by the harbour always has a fresh catch of the day.",
            )
            .generic(
                "food",
                "For comfort food, the bistro on Oak Street is cosy and the service is friendly.",
            )
            // travel
            .topic(
                "travel",
                &["beach", "sea", "ocean"],
                "For beaches, Bali is great value and the Maldives if you want luxury. Bring snorkelling gear.",
            )
            .topic(
                "travel",
                &["mountain", "hiking", "trek"],
                "The Alps are stunning for hiking. Late spring gives you open trails and mild weather.",
            )
            .topic(
                "travel",
                &["europe", "paris", "london"],
                "A rail pass makes hopping between European cities easy. Book museum tickets ahead.",
            )
            .topic(
                "travel",
                &["asia", "thailand", "japan"],
                "Japan is wonderful for food and culture; Thailand for beaches and temples.",
            )
            .topic(
                "travel",
                &["budget", "cheap", "affordable"],
                "Southeast Asia and Eastern Europe stretch a budget well. Hostels and street food help.",
            )
            .generic(
                "travel",
                "Book flights two to three months out for the best fares and availability.",
            )
            .generic(
                "travel",
                "Check visa rules and get travel insurance before you book anything international.",
            )
            .generic(
                "travel",
                "Shoulder season usually means better prices and fewer crowds.",
            )
            // realestate
            .topic(
                "realestate",
                &["buy", "purchase", "first home"],
                "Get pre-approved before you make offers. It makes your bid much stronger.",
            )
            .topic(
                "realestate",
                &["sell", "selling", "market"],
                "Spring is usually the best time to list. Small repairs and good photos pay off.",
            )
            .topic(
                "realestate",
                &["rent", "apartment", "lease"],
                "Rentals move fast. Have ID, proof of income, and references ready before viewings.",
            )
            .topic(
                "realestate",
                &["investment", "property", "rental"],
                "Look for areas with job growth. Work out cap rate and cash-on-cash return first.",
            )
            .topic(
                "realestate",
                &["price", "value", "worth"],
                "A professional appraisal and recent comparable sales give the most reliable value.",
            )
            .generic(
                "realestate",
                "The market is fairly balanced right now, so there are openings for buyers and sellers.",
            )
            .generic(
                "realestate",
                "A local agent who knows the neighbourhood is worth a lot in a search.",
            )
            .generic(
                "realestate",
                "Good schools and transit nearby help a property hold its value.",
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> ParticipantId {
        ParticipantId::from("alice")
    }

    #[test]
    fn test_topic_reply() {
        let responder = CannedResponder::with_default_scripts();
        let reply = responder.compose(&"travel".into(), "Any BEACH ideas?");
        assert!(reply.contains("Bali"));
    }

    #[test]
    fn test_generic_reply_is_from_list() {
        let responder = CannedResponder::empty()
            .generic("help", "one")
            .generic("help", "two");
        for _ in 0..20 {
            let reply = responder.compose(&"help".into(), "anything");
            assert!(reply == "one" || reply == "two");
        }
    }

    #[test]
    fn test_unknown_endpoint() {
        let responder = CannedResponder::with_default_scripts();
        assert_eq!(
            responder.compose(&"weather".into(), "rain?"),
            UNKNOWN_ENDPOINT_REPLY
        );
        let topics_only = CannedResponder::empty().topic("help", &["x"], "y");
        assert_eq!(
            topics_only.compose(&"help".into(), "no match"),
            UNKNOWN_ENDPOINT_REPLY
        );
    }

    #[tokio::test]
    async fn test_answer_records_conversation() {
        let responder = CannedResponder::with_default_scripts();
        let reply = responder
            .answer(&"food".into(), "pizza tonight?", &alice())
            .await
            .unwrap();
        assert!(reply.contains("margherita"));

        responder
            .answer(&"travel".into(), "hiking trip", &alice())
            .await
            .unwrap();

        let turns = responder.conversation(&alice()).await;
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "pizza tonight?");
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].content, reply);
        assert_eq!(turns[3].endpoint, EndpointId::from("travel"));

        assert!(responder.conversation(&"bob".into()).await.is_empty());
        responder.forget(&alice()).await;
        assert!(responder.conversation(&alice()).await.is_empty());
    }
}
