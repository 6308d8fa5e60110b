//! Flight offer lookup against the Amadeus self-service API

use crate::cities::airline_name;
use crate::config::Config;
use crate::selection::Keyed;
use crate::TripError;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, error, info, instrument};

/// Fixed conversion rate applied to EUR prices for ZAR display
pub const EUR_TO_ZAR: f64 = 19.21;

pub const DEFAULT_ADULTS: u32 = 1;
pub const DEFAULT_MAX_OFFERS: u32 = 12;

/// A bookable flight offer as returned by the offer search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlightOffer {
    pub id: String,
    #[serde(default)]
    pub itineraries: Vec<FlightItinerary>,
    pub price: OfferPrice,
    /// Local-currency display price, "N/A" when no rate is known
    #[serde(default)]
    pub price_in_zar: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightItinerary {
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub segments: Vec<FlightSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlightSegment {
    pub departure: SegmentEndpoint,
    pub arrival: SegmentEndpoint,
    #[serde(default)]
    pub carrier_code: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SegmentEndpoint {
    pub iata_code: String,
    #[serde(default)]
    pub at: Option<String>,
}

/// Price as quoted by the provider; `total` is a decimal string
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfferPrice {
    pub currency: String,
    pub total: String,
}

impl FlightOffer {
    pub fn first_segment(&self) -> Option<&FlightSegment> {
        self.itineraries.first()?.segments.first()
    }

    pub fn departure_code(&self) -> Option<&str> {
        self.first_segment().map(|s| s.departure.iata_code.as_str())
    }

    /// Where this offer lands; the catalog lookups for later stages key off it
    pub fn arrival_code(&self) -> Option<&str> {
        self.first_segment().map(|s| s.arrival.iata_code.as_str())
    }

    /// "JNB to CPT" style route used in prompts and listings
    pub fn route_label(&self) -> String {
        format!(
            "{} to {}",
            self.departure_code().unwrap_or("?"),
            self.arrival_code().unwrap_or("?")
        )
    }

    pub fn airline(&self) -> Option<&str> {
        self.first_segment().map(|s| airline_name(&s.carrier_code))
    }

    /// Fill in the ZAR display price from the quoted total
    pub fn with_local_price(mut self) -> Self {
        self.price_in_zar = match self.price.total.trim().parse::<f64>() {
            Ok(total) => format_price_in_zar(total, &self.price.currency),
            Err(_) => "N/A".to_string(),
        };
        self
    }

    /// One-line summary for listings
    pub fn summary(&self) -> String {
        let duration = self
            .itineraries
            .first()
            .and_then(|i| i.duration.as_deref())
            .and_then(format_duration)
            .unwrap_or_else(|| "unknown duration".to_string());
        format!(
            "{} | {} | {} | R{}",
            self.route_label(),
            self.airline().unwrap_or("Unknown airline"),
            duration,
            self.price_in_zar
        )
    }
}

impl Keyed for FlightOffer {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Convert a price to ZAR; only EUR has a known rate
pub fn convert_price_to_zar(price: f64, from_currency: &str) -> Option<f64> {
    (from_currency == "EUR").then(|| price * EUR_TO_ZAR)
}

/// ZAR display string with two decimals, or "N/A"
pub fn format_price_in_zar(price: f64, from_currency: &str) -> String {
    convert_price_to_zar(price, from_currency)
        .map(|zar| format!("{:.2}", zar))
        .unwrap_or_else(|| "N/A".to_string())
}

/// Render an ISO-8601 duration such as `PT2H10M` as `2h 10m`
pub fn format_duration(iso: &str) -> Option<String> {
    static DURATION: OnceLock<Option<Regex>> = OnceLock::new();
    let re = DURATION
        .get_or_init(|| Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?$").ok())
        .as_ref()?;
    let captures = re.captures(iso)?;
    let hours = captures.get(1).map(|m| m.as_str());
    let minutes = captures.get(2).map(|m| m.as_str());

    match (hours, minutes) {
        (Some(h), Some(m)) => Some(format!("{}h {}m", h, m)),
        (Some(h), None) => Some(format!("{}h", h)),
        (None, Some(m)) => Some(format!("{}m", m)),
        (None, None) => None,
    }
}

/// Parameters for one offer search leg
#[derive(Debug, Clone, PartialEq)]
pub struct OfferQuery {
    pub origin: String,
    pub destination: String,
    pub departure_date: String,
    pub adults: u32,
    pub max_offers: u32,
}

impl OfferQuery {
    /// One adult, up to twelve offers
    pub fn new(origin: &str, destination: &str, departure_date: &str) -> Self {
        Self {
            origin: origin.to_string(),
            destination: destination.to_string(),
            departure_date: departure_date.to_string(),
            adults: DEFAULT_ADULTS,
            max_offers: DEFAULT_MAX_OFFERS,
        }
    }
}

/// Source of flight offers for the first wizard stage
#[async_trait]
pub trait FlightLookup: Send + Sync {
    async fn flight_offers(&self, query: &OfferQuery) -> Result<Vec<FlightOffer>, TripError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct OffersResponse {
    #[serde(default)]
    data: Vec<FlightOffer>,
}

/// Amadeus flight-offers client using the client-credentials grant
pub struct AmadeusClient {
    http_client: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl AmadeusClient {
    pub fn new(base_url: &str, client_id: &str, client_secret: &str) -> Result<Self, TripError> {
        debug!("Creating new Amadeus client");
        let http_client = Client::builder()
            .user_agent(concat!("rust-trip-planner/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, TripError> {
        let (client_id, client_secret) = config.amadeus_credentials()?;
        Self::new(&config.amadeus_base_url, client_id, client_secret)
    }

    /// A fresh token is requested for every search
    async fn access_token(&self) -> Result<String, TripError> {
        let url = format!("{}/v1/security/oauth2/token", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, "Amadeus token request failed");
            return Err(TripError::FlightApiError(format!(
                "token request failed with status {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    #[instrument(level = "info", skip(self), fields(origin = %query.origin, destination = %query.destination))]
    pub async fn search_offers(&self, query: &OfferQuery) -> Result<Vec<FlightOffer>, TripError> {
        let token = self.access_token().await?;
        debug!("Obtained Amadeus access token");

        let url = format!("{}/v2/shopping/flight-offers", self.base_url);
        let adults = query.adults.to_string();
        let max = query.max_offers.to_string();

        let start_time = std::time::Instant::now();
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("originLocationCode", query.origin.as_str()),
                ("destinationLocationCode", query.destination.as_str()),
                ("departureDate", query.departure_date.as_str()),
                ("adults", adults.as_str()),
                ("max", max.as_str()),
            ])
            .send()
            .await?;
        let status = response.status();

        info!(
            status = %status,
            duration_ms = start_time.elapsed().as_millis(),
            "Flight offer request completed"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, "Flight offer request failed");
            return Err(TripError::FlightApiError(format!(
                "offer search failed with status {}: {}",
                status, body
            )));
        }

        let offers: OffersResponse = response.json().await?;
        let offers: Vec<FlightOffer> = offers
            .data
            .into_iter()
            .map(FlightOffer::with_local_price)
            .collect();

        info!(offers_found = offers.len(), "Parsed flight offers");
        Ok(offers)
    }
}

#[async_trait]
impl FlightLookup for AmadeusClient {
    async fn flight_offers(&self, query: &OfferQuery) -> Result<Vec<FlightOffer>, TripError> {
        self.search_offers(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "data": [{
            "id": "1",
            "itineraries": [{
                "duration": "PT2H10M",
                "segments": [{
                    "departure": {"iataCode": "JNB", "at": "2025-03-01T06:00:00"},
                    "arrival": {"iataCode": "CPT", "at": "2025-03-01T08:10:00"},
                    "carrierCode": "FA",
                    "number": "101",
                    "duration": "PT2H10M"
                }]
            }],
            "price": {"currency": "EUR", "total": "100.00", "base": "80.00"}
        }]
    }"#;

    #[test]
    fn test_convert_price_to_zar() {
        assert_eq!(format_price_in_zar(100.0, "EUR"), "1921.00");
        assert_eq!(format_price_in_zar(100.0, "USD"), "N/A");
        assert_eq!(convert_price_to_zar(10.0, "ZAR"), None);
    }

    #[test]
    fn test_parse_offer_response() {
        let response: OffersResponse = serde_json::from_str(SAMPLE).unwrap();
        let offer = response.data.into_iter().next().unwrap().with_local_price();

        assert_eq!(offer.id, "1");
        assert_eq!(offer.departure_code(), Some("JNB"));
        assert_eq!(offer.arrival_code(), Some("CPT"));
        assert_eq!(offer.route_label(), "JNB to CPT");
        assert_eq!(offer.airline(), Some("FlySafair"));
        assert_eq!(offer.price_in_zar, "1921.00");
        assert!(offer.summary().contains("2h 10m"));
    }

    #[test]
    fn test_unparseable_total_is_not_available() {
        let offer = FlightOffer {
            id: "x".into(),
            itineraries: vec![],
            price: OfferPrice {
                currency: "EUR".into(),
                total: "n/a".into(),
            },
            price_in_zar: String::new(),
        }
        .with_local_price();
        assert_eq!(offer.price_in_zar, "N/A");
        assert_eq!(offer.route_label(), "? to ?");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration("PT2H10M").as_deref(), Some("2h 10m"));
        assert_eq!(format_duration("PT45M").as_deref(), Some("45m"));
        assert_eq!(format_duration("PT3H").as_deref(), Some("3h"));
        assert_eq!(format_duration("PT"), None);
        assert_eq!(format_duration("garbage"), None);

        // The pattern is compiled once and reused across calls
        for _ in 0..3 {
            assert_eq!(format_duration("PT1H5M").as_deref(), Some("1h 5m"));
        }
    }

    #[test]
    fn test_offer_query_defaults() {
        let query = OfferQuery::new("JNB", "CPT", "2025-03-01");
        assert_eq!(query.adults, 1);
        assert_eq!(query.max_offers, 12);
    }

    #[test]
    fn test_client_creation() {
        let client = AmadeusClient::new("https://test.api.amadeus.com/", "id", "secret");
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url, "https://test.api.amadeus.com");
    }
}
