//! Lodging and activity catalog documents and the lookup interface

use crate::selection::Keyed;
use crate::TripError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An accommodation listing, keyed by name
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Lodging {
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
    #[serde(default)]
    pub city: String,
}

/// A bookable activity, keyed by name
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub sub_categories: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub address: String,
}

impl Activity {
    pub fn primary_sub_category(&self) -> &str {
        self.sub_categories.first().map(String::as_str).unwrap_or("")
    }
}

impl Keyed for Lodging {
    fn key(&self) -> &str {
        &self.name
    }
}

impl Keyed for Activity {
    fn key(&self) -> &str {
        &self.name
    }
}

/// Read side of the document store, queried by normalized city name
/// (see [`crate::cities::normalize_city`]).
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn lodging_by_city(&self, city: &str) -> Result<Vec<Lodging>, TripError>;

    async fn activities_by_city(&self, city: &str) -> Result<Vec<Activity>, TripError>;
}

/// Write side of the document store, used when populating the catalog
#[async_trait]
pub trait CatalogWriter: Send + Sync {
    async fn put_lodging(&self, id: &str, lodging: &Lodging) -> Result<(), TripError>;

    async fn put_activity(&self, id: &str, activity: &Activity) -> Result<(), TripError>;
}

/// Drop later entries whose key was already seen; first one wins
pub fn dedupe_by_key<T: Keyed>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.key().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_first_seen_wins() {
        let items = vec![
            Lodging {
                name: "Protea".into(),
                price: 900.0,
                ..Default::default()
            },
            Lodging {
                name: "Sun Inn".into(),
                price: 500.0,
                ..Default::default()
            },
            Lodging {
                name: "Protea".into(),
                price: 1100.0,
                ..Default::default()
            },
        ];

        let unique = dedupe_by_key(items);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].name, "Protea");
        assert_eq!(unique[0].price, 900.0);
        assert_eq!(unique[1].name, "Sun Inn");
    }

    #[test]
    fn test_documents_tolerate_missing_fields() {
        let lodging: Lodging = serde_json::from_str(r#"{"name":"Bare"}"#).unwrap();
        assert_eq!(lodging.price, 0.0);
        assert!(lodging.city.is_empty());

        let activity: Activity =
            serde_json::from_str(r#"{"name":"Hike","sub_categories":["Outdoors","Nature"]}"#)
                .unwrap();
        assert_eq!(activity.primary_sub_category(), "Outdoors");
        assert_eq!(Activity::default().primary_sub_category(), "");
    }
}
