//! The submitted itinerary record and where it is saved

use crate::catalog::{Activity, Lodging};
use crate::flights::FlightOffer;
use crate::TripError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final artifact of a planning session. Built once at submission and never
/// changed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryRecord {
    pub user_id: String,
    pub itinerary_name: String,
    pub flights: Vec<FlightOffer>,
    pub accommodations: Vec<Lodging>,
    pub activities: Vec<Activity>,
    pub generated_itinerary: String,
    pub created_at: DateTime<Utc>,
}

impl ItineraryRecord {
    /// Document id, `{user}_{creation millis}`
    pub fn document_id(&self) -> String {
        format!("{}_{}", self.user_id, self.created_at.timestamp_millis())
    }

    /// Id to try on the given save attempt. Attempt 0 is the plain document
    /// id; later attempts add a `_{attempt}` suffix so records created in the
    /// same millisecond do not replace each other.
    pub fn document_id_attempt(&self, attempt: u32) -> String {
        match attempt {
            0 => self.document_id(),
            n => format!("{}_{}", self.document_id(), n),
        }
    }
}

#[async_trait]
pub trait ItineraryStore: Send + Sync {
    /// Save a submitted itinerary as a new document, returning its id.
    /// Never overwrites an earlier record.
    async fn save_itinerary(&self, record: &ItineraryRecord) -> Result<String, TripError>;

    async fn itineraries_for(&self, user_id: &str) -> Result<Vec<ItineraryRecord>, TripError>;
}
