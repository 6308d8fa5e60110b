//! Accommodation search proxy, used to fill the lodging catalog

use crate::catalog::{CatalogWriter, Lodging};
use crate::cities::normalize_city;
use crate::config::Config;
use crate::identity::{require_user, IdentityProvider};
use crate::TripError;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

/// One listing as returned by the proxy
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ProxyListing {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Deserialize)]
struct ProxyResponse {
    #[serde(default)]
    results: Vec<ProxyListing>,
}

pub struct SearchProxyClient {
    http_client: Client,
    base_url: String,
}

impl SearchProxyClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.search_proxy_url)
    }

    #[instrument(level = "info", skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<ProxyListing>, TripError> {
        let url = format!("{}/api/search", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .query(&[("query", query)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, "Search proxy request failed");
            return Err(TripError::CatalogError(format!(
                "search proxy returned status {}",
                status
            )));
        }

        let body: ProxyResponse = response.json().await?;
        info!(results = body.results.len(), "Search proxy returned listings");
        Ok(body.results)
    }
}

/// Catalog document id for a listing; listings without an id get one
/// derived from the city and their position
pub fn listing_document_id(listing: &ProxyListing, city: &str, index: usize) -> String {
    listing
        .id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("acc_{}_{}", city, index))
}

/// Write proxy listings into the lodging catalog under the normalized
/// query city. A failed write is logged and skipped; the count of stored
/// listings is returned.
pub async fn populate_lodging(
    writer: &dyn CatalogWriter,
    identity: &dyn IdentityProvider,
    query: &str,
    listings: &[ProxyListing],
) -> Result<usize, TripError> {
    require_user(identity)?;
    let city = normalize_city(query);
    let mut stored = 0;

    for (index, listing) in listings.iter().enumerate() {
        let id = listing_document_id(listing, &city, index);
        let lodging = Lodging {
            name: listing.name.clone(),
            description: listing.description.clone(),
            link: listing.link.clone(),
            price: listing.price,
            rating: listing.rating,
            image: listing.image.clone(),
            city: city.clone(),
        };

        match writer.put_lodging(&id, &lodging).await {
            Ok(()) => {
                debug!(id = %id, name = %lodging.name, "Stored accommodation");
                stored += 1;
            }
            Err(e) => error!(id = %id, name = %lodging.name, error = %e, "Failed to store accommodation"),
        }
    }

    info!(city = %city, stored, "Populated lodging catalog");
    Ok(stored)
}
