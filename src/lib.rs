//! # Rust Trip Planner
//!
//! A trip-planning library built around a four-stage itinerary wizard:
//! flights, accommodations, activities and a final review that asks a
//! chat-completion model for a day-by-day itinerary.
//!
//! Every external system (flight offers, the lodging/activity catalog, the
//! identity provider and the narrative generator) sits behind a trait so the
//! wizard can be driven against real services or in-memory fakes.

pub mod advisor;
pub mod catalog;
pub mod cities;
pub mod config;
pub mod filters;
pub mod flights;
pub mod identity;
pub mod itinerary;
pub mod likes;
pub mod logging;
pub mod narrative;
pub mod proxy;
pub mod selection;
pub mod store;
pub mod wizard;

#[cfg(feature = "sled-store")]
pub mod sled_store;

use thiserror::Error;

// Re-export main types for convenience
pub use advisor::TripAdvisorChat;
pub use catalog::{Activity, Catalog, CatalogWriter, Lodging};
pub use cities::{airline_name, airport_city, closest_city, levenshtein, normalize_city};
pub use config::Config;
pub use filters::{ActivitySort, BrowseFilter, BrowseSort, LodgingSort};
pub use flights::{AmadeusClient, FlightLookup, FlightOffer, OfferQuery};
pub use identity::{IdentityProvider, StaticIdentity};
pub use itinerary::{ItineraryRecord, ItineraryStore};
pub use likes::{LikedActivity, LikedActivityStore};
pub use narrative::{ChatMessage, ChatRole, NarrativeGenerator, OpenAiNarrator};
pub use proxy::SearchProxyClient;
pub use selection::{Keyed, Selection};
pub use store::{open_default_store, DefaultStore, MemoryCatalog};
pub use wizard::{LocationCandidates, Services, Stage, TripDetails, WizardState};

/// Error types for the trip planner
#[derive(Error, Debug)]
pub enum TripError {
    #[error("{0}")]
    Validation(String),

    #[error("User is not authenticated")]
    Unauthenticated,

    #[error("Invalid stage transition: {0}")]
    InvalidTransition(String),

    #[error("Unknown candidate: {0}")]
    UnknownCandidate(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "sled-store")]
    #[error("Catalog store error: {0}")]
    StoreError(#[from] sled::Error),

    #[error("Flight offer API error: {0}")]
    FlightApiError(String),

    #[error("Narrative generation failed: {0}")]
    NarrativeError(String),

    #[error("Catalog error: {0}")]
    CatalogError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// How a failure is presented to the user and how it is recovered from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; fixed by correcting the form
    Validation,
    /// A collaborator failed; fixed by retrying the action
    Collaborator,
    /// No identity; catalog operations stay blocked until sign-in
    Unauthenticated,
}

impl TripError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TripError::Validation(_)
            | TripError::InvalidTransition(_)
            | TripError::UnknownCandidate(_) => ErrorKind::Validation,
            TripError::Unauthenticated => ErrorKind::Unauthenticated,
            _ => ErrorKind::Collaborator,
        }
    }

    /// Message shown inline next to the action that failed
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Validation => self.to_string(),
            ErrorKind::Unauthenticated => "You must be logged in to continue.".to_string(),
            ErrorKind::Collaborator => {
                "Something went wrong while contacting a travel service. Please try again."
                    .to_string()
            }
        }
    }
}
