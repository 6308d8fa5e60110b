//! The itinerary wizard
//!
//! A planning session moves through four stages in order:
//!
//! ```text
//! Flights -> Accommodations -> Activities -> Review
//! ```
//!
//! [`WizardState`] is a plain value. Every transition borrows the current
//! state and returns a new one, so a failed transition leaves the caller
//! holding the state it started from and the action can simply be retried.
//!
//! Advancing out of Flights and out of Accommodations fetches the next
//! stage's candidates from the catalog, one lookup per arrival airport,
//! issued concurrently. Retreating never re-fetches or discards anything.

use crate::catalog::{dedupe_by_key, Activity, Catalog, Lodging};
use crate::cities::{airport_city, catalog_key_for_airport};
use crate::config::Config;
use crate::filters::{sort_activities, sort_lodging, ActivitySort, LodgingSort};
use crate::flights::{AmadeusClient, FlightLookup, FlightOffer, OfferQuery};
use crate::identity::{require_user, IdentityProvider, StaticIdentity};
use crate::itinerary::{ItineraryRecord, ItineraryStore};
use crate::narrative::{itinerary_messages, NarrativeGenerator, OpenAiNarrator, NARRATIVE_MAX_TOKENS};
use crate::selection::{Keyed, Selection};
use crate::TripError;
use chrono::Utc;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Prepended to return offer ids. Each offer search numbers its results
/// from "1", so outbound and return ids would otherwise overlap.
pub const RETURN_OFFER_PREFIX: &str = "return-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Flights,
    Accommodations,
    Activities,
    Review,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Flights,
        Stage::Accommodations,
        Stage::Activities,
        Stage::Review,
    ];

    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Flights => Some(Stage::Accommodations),
            Stage::Accommodations => Some(Stage::Activities),
            Stage::Activities => Some(Stage::Review),
            Stage::Review => None,
        }
    }

    pub fn previous(self) -> Option<Stage> {
        match self {
            Stage::Flights => None,
            Stage::Accommodations => Some(Stage::Flights),
            Stage::Activities => Some(Stage::Accommodations),
            Stage::Review => Some(Stage::Activities),
        }
    }

    /// Zero-based position, for step indicators
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Flights => "Flights",
            Stage::Accommodations => "Accommodations",
            Stage::Activities => "Activities",
            Stage::Review => "Review",
        };
        f.write_str(label)
    }
}

/// What the user fills in on the flight form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripDetails {
    pub name: String,
    pub origin: String,
    pub destination: String,
    pub departure_date: String,
    #[serde(default)]
    pub round_trip: bool,
    #[serde(default)]
    pub return_date: Option<String>,
}

impl TripDetails {
    /// Origin, destination and departure date must be filled in and the
    /// origin must differ from the destination
    pub fn validate(&self) -> Result<(), TripError> {
        if self.origin.trim().is_empty()
            || self.destination.trim().is_empty()
            || self.departure_date.trim().is_empty()
        {
            return Err(TripError::Validation(
                "Origin, destination and departure date are required.".to_string(),
            ));
        }
        if self
            .origin
            .trim()
            .eq_ignore_ascii_case(self.destination.trim())
        {
            return Err(TripError::Validation(
                "Origin and destination cannot be the same.".to_string(),
            ));
        }
        Ok(())
    }

    fn return_leg_date(&self) -> Option<&str> {
        if !self.round_trip {
            return None;
        }
        self.return_date.as_deref().filter(|d| !d.trim().is_empty())
    }
}

/// Candidates fetched for one arrival airport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCandidates<T> {
    /// Arrival airport code
    pub code: String,
    /// City the catalog was queried for
    pub city: String,
    pub items: Vec<T>,
}

/// The collaborators a wizard needs
#[derive(Clone)]
pub struct Services {
    pub flights: Arc<dyn FlightLookup>,
    pub catalog: Arc<dyn Catalog>,
    pub narrator: Arc<dyn NarrativeGenerator>,
    pub identity: Arc<dyn IdentityProvider>,
    /// Where submitted itineraries are saved; submission works without one
    pub itineraries: Option<Arc<dyn ItineraryStore>>,
}

impl Services {
    /// Production services from configuration, backed by `store`
    pub fn from_config<S>(config: &Config, store: Arc<S>) -> Result<Self, TripError>
    where
        S: Catalog + ItineraryStore + 'static,
    {
        Ok(Self {
            flights: Arc::new(AmadeusClient::from_config(config)?),
            catalog: store.clone(),
            narrator: Arc::new(OpenAiNarrator::from_config(config)?),
            identity: Arc::new(StaticIdentity::from_option(config.user_id.clone())),
            itineraries: Some(store as Arc<dyn ItineraryStore>),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WizardState {
    stage: Stage,
    trip: TripDetails,
    flights: Vec<FlightOffer>,
    return_flights: Vec<FlightOffer>,
    arrival_places: Vec<String>,
    lodging: Vec<LocationCandidates<Lodging>>,
    activities: Vec<LocationCandidates<Activity>>,
    selected_flights: Selection<FlightOffer>,
    selected_lodging: Selection<Lodging>,
    selected_activities: Selection<Activity>,
    lodging_sort: HashMap<String, LodgingSort>,
    activity_sort: HashMap<String, ActivitySort>,
}

impl WizardState {
    pub fn new(trip: TripDetails) -> Self {
        Self {
            stage: Stage::Flights,
            trip,
            flights: Vec::new(),
            return_flights: Vec::new(),
            arrival_places: Vec::new(),
            lodging: Vec::new(),
            activities: Vec::new(),
            selected_flights: Selection::new(),
            selected_lodging: Selection::new(),
            selected_activities: Selection::new(),
            lodging_sort: HashMap::new(),
            activity_sort: HashMap::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn trip(&self) -> &TripDetails {
        &self.trip
    }

    pub fn flights(&self) -> &[FlightOffer] {
        &self.flights
    }

    pub fn return_flights(&self) -> &[FlightOffer] {
        &self.return_flights
    }

    pub fn arrival_places(&self) -> &[String] {
        &self.arrival_places
    }

    pub fn lodging(&self) -> &[LocationCandidates<Lodging>] {
        &self.lodging
    }

    pub fn activities(&self) -> &[LocationCandidates<Activity>] {
        &self.activities
    }

    pub fn selected_flights(&self) -> &Selection<FlightOffer> {
        &self.selected_flights
    }

    pub fn selected_lodging(&self) -> &Selection<Lodging> {
        &self.selected_lodging
    }

    pub fn selected_activities(&self) -> &Selection<Activity> {
        &self.selected_activities
    }

    fn expect_stage(&self, stage: Stage, action: &str) -> Result<(), TripError> {
        if self.stage != stage {
            return Err(TripError::InvalidTransition(format!(
                "{} is only available in the {} stage (currently {})",
                action, stage, self.stage
            )));
        }
        Ok(())
    }

    /// Replace the trip form. Only allowed while still choosing flights.
    pub fn with_trip(&self, trip: TripDetails) -> Result<Self, TripError> {
        self.expect_stage(Stage::Flights, "Editing the trip")?;
        Ok(Self {
            trip,
            ..self.clone()
        })
    }

    /// Search outbound offers, plus return offers for a round trip with a
    /// return date. Previous results are replaced; selections are kept.
    #[instrument(level = "info", skip(self, services), fields(origin = %self.trip.origin, destination = %self.trip.destination))]
    pub async fn search_flights(&self, services: &Services) -> Result<Self, TripError> {
        self.expect_stage(Stage::Flights, "Flight search")?;
        self.trip.validate()?;

        let outbound = OfferQuery::new(&self.trip.origin, &self.trip.destination, &self.trip.departure_date);
        let flights = services.flights.flight_offers(&outbound).await.map_err(|e| {
            error!(error = %e, "Error fetching flight offers");
            e
        })?;

        let return_flights = match self.trip.return_leg_date() {
            Some(return_date) => {
                let inbound = OfferQuery::new(&self.trip.destination, &self.trip.origin, return_date);
                let offers = services.flights.flight_offers(&inbound).await.map_err(|e| {
                    error!(error = %e, "Error fetching return flight offers");
                    e
                })?;
                offers
                    .into_iter()
                    .map(|mut offer| {
                        offer.id = format!("{}{}", RETURN_OFFER_PREFIX, offer.id);
                        offer
                    })
                    .collect()
            }
            None => Vec::new(),
        };

        info!(
            outbound = flights.len(),
            inbound = return_flights.len(),
            "Flight search completed"
        );

        Ok(Self {
            flights,
            return_flights,
            ..self.clone()
        })
    }

    /// Toggle a flight offer by id. The offer must be among the fetched
    /// candidates unless it is being deselected.
    pub fn toggle_flight(&self, offer_id: &str) -> Result<Self, TripError> {
        let mut next = self.clone();
        if next.selected_flights.remove(offer_id).is_some() {
            return Ok(next);
        }

        let offer = self
            .flights
            .iter()
            .chain(self.return_flights.iter())
            .find(|f| f.key() == offer_id)
            .cloned()
            .ok_or_else(|| TripError::UnknownCandidate(format!("flight offer {}", offer_id)))?;
        next.selected_flights.toggle(offer);
        Ok(next)
    }

    /// Toggle a lodging candidate by name
    pub fn toggle_lodging(&self, name: &str) -> Result<Self, TripError> {
        let mut next = self.clone();
        if next.selected_lodging.remove(name).is_some() {
            return Ok(next);
        }

        let stay = find_candidate(&self.lodging, name)
            .ok_or_else(|| TripError::UnknownCandidate(format!("accommodation {}", name)))?;
        next.selected_lodging.toggle(stay);
        Ok(next)
    }

    /// Toggle an activity candidate by name
    pub fn toggle_activity(&self, name: &str) -> Result<Self, TripError> {
        let mut next = self.clone();
        if next.selected_activities.remove(name).is_some() {
            return Ok(next);
        }

        let activity = find_candidate(&self.activities, name)
            .ok_or_else(|| TripError::UnknownCandidate(format!("activity {}", name)))?;
        next.selected_activities.toggle(activity);
        Ok(next)
    }

    /// Choose the lodging sort for one arrival airport
    pub fn sort_lodging(&self, location: &str, key: LodgingSort) -> Result<Self, TripError> {
        if !self.lodging.iter().any(|l| l.code == location) {
            return Err(TripError::UnknownCandidate(format!("location {}", location)));
        }
        let mut next = self.clone();
        next.lodging_sort.insert(location.to_string(), key);
        Ok(next)
    }

    /// Choose the activity sort for one arrival airport
    pub fn sort_activities(&self, location: &str, key: ActivitySort) -> Result<Self, TripError> {
        if !self.activities.iter().any(|l| l.code == location) {
            return Err(TripError::UnknownCandidate(format!("location {}", location)));
        }
        let mut next = self.clone();
        next.activity_sort.insert(location.to_string(), key);
        Ok(next)
    }

    /// Lodging for a location in display order. Sorting is applied to a
    /// copy; the fetched list keeps catalog order.
    pub fn lodging_view(&self, location: &str) -> Vec<Lodging> {
        let Some(candidates) = self.lodging.iter().find(|l| l.code == location) else {
            return Vec::new();
        };
        match self.lodging_sort.get(location) {
            Some(key) => sort_lodging(&candidates.items, *key),
            None => candidates.items.clone(),
        }
    }

    /// Activities for a location in display order
    pub fn activities_view(&self, location: &str) -> Vec<Activity> {
        let Some(candidates) = self.activities.iter().find(|l| l.code == location) else {
            return Vec::new();
        };
        match self.activity_sort.get(location) {
            Some(key) => sort_activities(&candidates.items, *key),
            None => candidates.items.clone(),
        }
    }

    /// Airports the later stages look up: the arrival of each selected
    /// flight in selection order, without repeats. With nothing selected
    /// the trip destination is used.
    fn derive_arrival_places(&self) -> Vec<String> {
        let mut places: Vec<String> = Vec::new();
        for code in self.selected_flights.iter().filter_map(FlightOffer::arrival_code) {
            if !places.iter().any(|p| p == code) {
                places.push(code.to_string());
            }
        }
        if places.is_empty() && !self.trip.destination.is_empty() {
            places.push(self.trip.destination.clone());
        }
        places
    }

    /// Move to the next stage, fetching its candidates
    #[instrument(level = "info", skip(self, services), fields(stage = %self.stage))]
    pub async fn advance(&self, services: &Services) -> Result<Self, TripError> {
        let Some(next_stage) = self.stage.next() else {
            return Err(TripError::InvalidTransition(
                "the Review stage is final; submit the itinerary instead".to_string(),
            ));
        };

        let mut next = self.clone();
        match self.stage {
            Stage::Flights => {
                self.trip.validate()?;
                require_user(services.identity.as_ref())?;
                let places = self.derive_arrival_places();
                next.lodging = fetch_lodging(services.catalog.as_ref(), &places).await?;
                next.arrival_places = places;
            }
            Stage::Accommodations => {
                require_user(services.identity.as_ref())?;
                next.activities =
                    fetch_activities(services.catalog.as_ref(), &self.arrival_places).await?;
            }
            Stage::Activities | Stage::Review => {}
        }

        info!(from = %self.stage, to = %next_stage, "Advanced wizard stage");
        next.stage = next_stage;
        Ok(next)
    }

    /// Step back one stage, keeping everything already fetched or selected
    pub fn retreat(&self) -> Result<Self, TripError> {
        let previous = self.stage.previous().ok_or_else(|| {
            TripError::InvalidTransition("already at the first stage".to_string())
        })?;
        Ok(Self {
            stage: previous,
            ..self.clone()
        })
    }

    /// Generate the narrative and build the itinerary record.
    ///
    /// Calling this twice produces two records; nothing guards against a
    /// double submission.
    #[instrument(level = "info", skip(self, services), fields(trip = %self.trip.name))]
    pub async fn submit(&self, services: &Services) -> Result<ItineraryRecord, TripError> {
        self.expect_stage(Stage::Review, "Submitting")?;
        let user_id = require_user(services.identity.as_ref())?;

        let flights = self.selected_flights.as_slice().to_vec();
        let accommodations = self.selected_lodging.as_slice().to_vec();
        let activities = self.selected_activities.as_slice().to_vec();

        let messages = itinerary_messages(&flights, &accommodations, &activities);
        let generated_itinerary = services
            .narrator
            .generate(&messages, NARRATIVE_MAX_TOKENS)
            .await
            .map_err(|e| {
                error!(error = %e, model = services.narrator.model_name(), "Error generating itinerary");
                e
            })?;

        let record = ItineraryRecord {
            user_id,
            itinerary_name: self.trip.name.clone(),
            flights,
            accommodations,
            activities,
            generated_itinerary,
            created_at: Utc::now(),
        };

        match &services.itineraries {
            Some(store) => {
                let id = store.save_itinerary(&record).await?;
                info!(id = %id, "Itinerary saved");
            }
            None => warn!("No itinerary store configured; record not saved"),
        }

        Ok(record)
    }
}

fn find_candidate<T: Keyed + Clone>(locations: &[LocationCandidates<T>], key: &str) -> Option<T> {
    locations
        .iter()
        .flat_map(|l| l.items.iter())
        .find(|item| item.key() == key)
        .cloned()
}

/// Lodging for every place, looked up concurrently; completes when all do
async fn fetch_lodging(
    catalog: &dyn Catalog,
    places: &[String],
) -> Result<Vec<LocationCandidates<Lodging>>, TripError> {
    let lookups = places.iter().map(|code| async move {
        let items = catalog
            .lodging_by_city(&catalog_key_for_airport(code))
            .await
            .map_err(|e| {
                error!(location = %code, error = %e, "Error fetching accommodations");
                e
            })?;
        Ok::<_, TripError>(LocationCandidates {
            code: code.clone(),
            city: airport_city(code).to_string(),
            items: dedupe_by_key(items),
        })
    });
    try_join_all(lookups).await
}

/// Activities for every place, looked up concurrently
async fn fetch_activities(
    catalog: &dyn Catalog,
    places: &[String],
) -> Result<Vec<LocationCandidates<Activity>>, TripError> {
    let lookups = places.iter().map(|code| async move {
        let items = catalog
            .activities_by_city(&catalog_key_for_airport(code))
            .await
            .map_err(|e| {
                error!(location = %code, error = %e, "Error fetching activities");
                e
            })?;
        Ok::<_, TripError>(LocationCandidates {
            code: code.clone(),
            city: airport_city(code).to_string(),
            items: dedupe_by_key(items),
        })
    });
    try_join_all(lookups).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flights::{FlightItinerary, FlightSegment, OfferPrice, SegmentEndpoint};
    use crate::narrative::ChatMessage;
    use crate::store::MemoryCatalog;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn offer(id: &str, from: &str, to: &str) -> FlightOffer {
        FlightOffer {
            id: id.to_string(),
            itineraries: vec![FlightItinerary {
                duration: Some("PT2H".into()),
                segments: vec![FlightSegment {
                    departure: SegmentEndpoint {
                        iata_code: from.to_string(),
                        at: None,
                    },
                    arrival: SegmentEndpoint {
                        iata_code: to.to_string(),
                        at: None,
                    },
                    carrier_code: "SA".into(),
                    number: "300".into(),
                    duration: None,
                }],
            }],
            price: OfferPrice {
                currency: "EUR".into(),
                total: "100.00".into(),
            },
            price_in_zar: "1921.00".into(),
        }
    }

    struct FakeFlights {
        queries: Mutex<Vec<OfferQuery>>,
    }

    #[async_trait]
    impl FlightLookup for FakeFlights {
        async fn flight_offers(&self, query: &OfferQuery) -> Result<Vec<FlightOffer>, TripError> {
            self.queries.lock().unwrap().push(query.clone());
            Ok(vec![
                offer(&format!("{}-{}-1", query.origin, query.destination), &query.origin, &query.destination),
                offer(&format!("{}-{}-2", query.origin, query.destination), &query.origin, &query.destination),
            ])
        }
    }

    struct FakeNarrator;

    #[async_trait]
    impl NarrativeGenerator for FakeNarrator {
        async fn generate(&self, messages: &[ChatMessage], _max_tokens: u32) -> Result<String, TripError> {
            Ok(format!("Day 1: {}", messages.len()))
        }

        fn model_name(&self) -> &str {
            "fake"
        }
    }

    fn services_with(identity: StaticIdentity) -> (Services, Arc<FakeFlights>) {
        let flights = Arc::new(FakeFlights {
            queries: Mutex::new(Vec::new()),
        });
        let catalog = Arc::new(MemoryCatalog::with_documents(
            vec![
                Lodging {
                    name: "Protea".into(),
                    city: "capetown".into(),
                    price: 900.0,
                    ..Default::default()
                },
                Lodging {
                    name: "Protea".into(),
                    city: "capetown".into(),
                    price: 1200.0,
                    ..Default::default()
                },
                Lodging {
                    name: "Budget Inn".into(),
                    city: "capetown".into(),
                    price: 300.0,
                    ..Default::default()
                },
                Lodging {
                    name: "Umhlanga Sands".into(),
                    city: "durban".into(),
                    price: 1500.0,
                    ..Default::default()
                },
            ],
            vec![Activity {
                name: "Table Mountain".into(),
                city: "capetown".into(),
                ..Default::default()
            }],
        ));
        let services = Services {
            flights: flights.clone(),
            catalog: catalog.clone(),
            narrator: Arc::new(FakeNarrator),
            identity: Arc::new(identity),
            itineraries: Some(catalog as Arc<dyn ItineraryStore>),
        };
        (services, flights)
    }

    fn trip() -> TripDetails {
        TripDetails {
            name: "Cape escape".into(),
            origin: "JNB".into(),
            destination: "CPT".into(),
            departure_date: "2025-03-01".into(),
            round_trip: false,
            return_date: None,
        }
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::Flights.next(), Some(Stage::Accommodations));
        assert_eq!(Stage::Review.next(), None);
        assert_eq!(Stage::Flights.previous(), None);
        assert_eq!(Stage::Review.previous(), Some(Stage::Activities));
        assert_eq!(Stage::Activities.index(), 2);
        assert_eq!(Stage::Accommodations.to_string(), "Accommodations");
    }

    #[test]
    fn test_same_origin_and_destination_rejected() {
        let mut details = trip();
        details.destination = "JNB".into();
        let err = details.validate().unwrap_err();
        assert_eq!(err.to_string(), "Origin and destination cannot be the same.");

        let mut details = trip();
        details.origin = "jnb".into();
        details.destination = " JNB ".into();
        assert!(matches!(details.validate(), Err(TripError::Validation(_))));

        let mut details = trip();
        details.departure_date = String::new();
        assert!(matches!(details.validate(), Err(TripError::Validation(_))));
    }

    #[tokio::test]
    async fn test_round_trip_search_fetches_both_legs() {
        let (services, flights) = services_with(StaticIdentity::new("u1"));
        let mut details = trip();
        details.round_trip = true;
        details.return_date = Some("2025-03-08".into());

        let state = WizardState::new(details).search_flights(&services).await.unwrap();
        assert_eq!(state.flights().len(), 2);
        assert_eq!(state.return_flights().len(), 2);

        let queries = flights.queries.lock().unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[1].origin, "CPT");
        assert_eq!(queries[1].destination, "JNB");
        assert_eq!(queries[1].departure_date, "2025-03-08");
        assert_eq!(queries[0].max_offers, 12);
        drop(queries);

        let both = state
            .toggle_flight("JNB-CPT-1")
            .unwrap()
            .toggle_flight("return-CPT-JNB-1")
            .unwrap();
        assert_eq!(both.selected_flights().len(), 2);
    }

    #[tokio::test]
    async fn test_one_way_ignores_return_date() {
        let (services, flights) = services_with(StaticIdentity::new("u1"));
        let mut details = trip();
        details.return_date = Some("2025-03-08".into());

        let state = WizardState::new(details).search_flights(&services).await.unwrap();
        assert!(state.return_flights().is_empty());
        assert_eq!(flights.queries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_flight_involution() {
        let (services, _) = services_with(StaticIdentity::new("u1"));
        let state = WizardState::new(trip()).search_flights(&services).await.unwrap();

        let once = state.toggle_flight("JNB-CPT-1").unwrap();
        assert!(once.selected_flights().contains("JNB-CPT-1"));
        let twice = once.toggle_flight("JNB-CPT-1").unwrap();
        assert_eq!(twice.selected_flights(), state.selected_flights());

        assert!(matches!(
            state.toggle_flight("nope"),
            Err(TripError::UnknownCandidate(_))
        ));
    }

    #[tokio::test]
    async fn test_advance_fetches_lodging_for_arrivals() {
        let (services, _) = services_with(StaticIdentity::new("u1"));
        let state = WizardState::new(trip())
            .search_flights(&services)
            .await
            .unwrap()
            .toggle_flight("JNB-CPT-1")
            .unwrap()
            .toggle_flight("JNB-CPT-2")
            .unwrap();

        let state = state.advance(&services).await.unwrap();
        assert_eq!(state.stage(), Stage::Accommodations);
        assert_eq!(state.arrival_places(), &["CPT".to_string()]);

        let lodging = &state.lodging()[0];
        assert_eq!(lodging.city, "Capetown");
        // duplicate "Protea" collapsed, first seen kept
        assert_eq!(lodging.items.len(), 2);
        assert_eq!(lodging.items[0].price, 900.0);
    }

    #[tokio::test]
    async fn test_advance_without_selection_uses_destination() {
        let (services, _) = services_with(StaticIdentity::new("u1"));
        let mut details = trip();
        details.destination = "DUR".into();

        let state = WizardState::new(details).advance(&services).await.unwrap();
        assert_eq!(state.arrival_places(), &["DUR".to_string()]);
        assert_eq!(state.lodging()[0].items[0].name, "Umhlanga Sands");
    }

    #[tokio::test]
    async fn test_advance_requires_identity() {
        let (services, _) = services_with(StaticIdentity::anonymous());
        let state = WizardState::new(trip());
        let err = state.advance(&services).await.unwrap_err();
        assert!(matches!(err, TripError::Unauthenticated));
        assert_eq!(state.stage(), Stage::Flights);
    }

    #[tokio::test]
    async fn test_sort_view_leaves_fetched_order() {
        let (services, _) = services_with(StaticIdentity::new("u1"));
        let state = WizardState::new(trip()).advance(&services).await.unwrap();

        let sorted = state.sort_lodging("CPT", LodgingSort::Price).unwrap();
        let view = sorted.lodging_view("CPT");
        assert_eq!(view[0].name, "Budget Inn");
        assert_eq!(sorted.lodging()[0].items[0].name, "Protea");

        assert!(state.sort_lodging("XYZ", LodgingSort::Price).is_err());
        assert!(state.lodging_view("XYZ").is_empty());
    }

    #[tokio::test]
    async fn test_retreat_keeps_fetched_data() {
        let (services, _) = services_with(StaticIdentity::new("u1"));
        let state = WizardState::new(trip())
            .advance(&services)
            .await
            .unwrap()
            .toggle_lodging("Protea")
            .unwrap();

        let back = state.retreat().unwrap();
        assert_eq!(back.stage(), Stage::Flights);
        assert_eq!(back.lodging(), state.lodging());
        assert_eq!(back.selected_lodging().len(), 1);

        assert!(matches!(back.retreat(), Err(TripError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_submit_only_from_review() {
        let (services, _) = services_with(StaticIdentity::new("u1"));
        let state = WizardState::new(trip());
        assert!(matches!(
            state.submit(&services).await,
            Err(TripError::InvalidTransition(_))
        ));

        let mut review = state;
        for _ in 0..3 {
            review = review.advance(&services).await.unwrap();
        }
        assert_eq!(review.stage(), Stage::Review);
        assert!(matches!(
            review.advance(&services).await,
            Err(TripError::InvalidTransition(_))
        ));

        let record = review.submit(&services).await.unwrap();
        assert_eq!(record.itinerary_name, "Cape escape");
        assert_eq!(record.generated_itinerary, "Day 1: 2");
    }

    #[tokio::test]
    async fn test_with_trip_only_in_flights_stage() {
        let (services, _) = services_with(StaticIdentity::new("u1"));
        let state = WizardState::new(trip());
        let edited = state.with_trip(TripDetails { name: "Renamed".into(), ..trip() }).unwrap();
        assert_eq!(edited.trip().name, "Renamed");

        let later = state.advance(&services).await.unwrap();
        assert!(later.with_trip(trip()).is_err());
    }
}
