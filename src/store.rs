//! In-memory document store, optionally persisted to a JSON file
//!
//! Holds the four collections the planner reads and writes: lodging,
//! activities, liked activities and submitted itineraries. Documents are
//! kept in id order, which is the order lookups return them in.

use crate::catalog::{Activity, Catalog, CatalogWriter, Lodging};
use crate::cities::normalize_city;
use crate::config::Config;
use crate::itinerary::{ItineraryRecord, ItineraryStore};
use crate::likes::{LikedActivity, LikedActivityStore};
use crate::TripError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Store used by the binaries for the enabled feature set
#[cfg(feature = "sled-store")]
pub type DefaultStore = crate::sled_store::SledCatalog;
#[cfg(not(feature = "sled-store"))]
pub type DefaultStore = MemoryCatalog;

/// Open the configured catalog store
pub async fn open_default_store(config: &Config) -> Result<Arc<DefaultStore>, TripError> {
    #[cfg(feature = "sled-store")]
    let store = crate::sled_store::SledCatalog::open(&config.catalog_path)?;
    #[cfg(not(feature = "sled-store"))]
    let store = MemoryCatalog::open(&config.catalog_path).await?;

    Ok(Arc::new(store))
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Collections {
    #[serde(default)]
    accommodation: BTreeMap<String, Lodging>,
    #[serde(default)]
    activities: BTreeMap<String, Activity>,
    #[serde(default)]
    liked_activities: BTreeMap<String, LikedActivity>,
    #[serde(default)]
    itineraries: BTreeMap<String, ItineraryRecord>,
}

pub struct MemoryCatalog {
    data: RwLock<Collections>,
    path: Option<PathBuf>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    /// Empty store that is never written to disk
    pub fn new() -> Self {
        Self {
            data: RwLock::new(Collections::default()),
            path: None,
        }
    }

    /// Load from `path` if it exists; every write is saved back there
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TripError> {
        let path = path.as_ref().to_path_buf();
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Catalog file not found, starting empty");
                Collections::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            data: RwLock::new(data),
            path: Some(path),
        })
    }

    /// Store seeded with documents, ids assigned by position
    pub fn with_documents(lodging: Vec<Lodging>, activities: Vec<Activity>) -> Self {
        let mut data = Collections::default();
        for (i, doc) in lodging.into_iter().enumerate() {
            data.accommodation.insert(format!("acc_{:04}", i), doc);
        }
        for (i, doc) in activities.into_iter().enumerate() {
            data.activities.insert(format!("act_{:04}", i), doc);
        }
        Self {
            data: RwLock::new(data),
            path: None,
        }
    }

    /// Apply `change` to a copy of the collections, save the copy, and only
    /// then make it visible. A failed save leaves the store as it was.
    async fn commit<R>(&self, change: impl FnOnce(&mut Collections) -> R) -> Result<R, TripError> {
        let mut data = self.data.write().await;
        let mut updated = data.clone();
        let result = change(&mut updated);
        self.persist(&updated).await?;
        *data = updated;
        Ok(result)
    }

    async fn persist(&self, data: &Collections) -> Result<(), TripError> {
        if let Some(path) = &self.path {
            let json = serde_json::to_vec_pretty(data)?;
            tokio::fs::write(path, json).await?;
            debug!(path = %path.display(), "Catalog saved");
        }
        Ok(())
    }
}

fn city_matches(doc_city: &str, key: &str) -> bool {
    normalize_city(doc_city) == normalize_city(key)
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn lodging_by_city(&self, city: &str) -> Result<Vec<Lodging>, TripError> {
        let data = self.data.read().await;
        Ok(data
            .accommodation
            .values()
            .filter(|doc| city_matches(&doc.city, city))
            .cloned()
            .collect())
    }

    async fn activities_by_city(&self, city: &str) -> Result<Vec<Activity>, TripError> {
        let data = self.data.read().await;
        Ok(data
            .activities
            .values()
            .filter(|doc| city_matches(&doc.city, city))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CatalogWriter for MemoryCatalog {
    async fn put_lodging(&self, id: &str, lodging: &Lodging) -> Result<(), TripError> {
        self.commit(|data| {
            data.accommodation.insert(id.to_string(), lodging.clone());
        })
        .await
    }

    async fn put_activity(&self, id: &str, activity: &Activity) -> Result<(), TripError> {
        self.commit(|data| {
            data.activities.insert(id.to_string(), activity.clone());
        })
        .await
    }
}

#[async_trait]
impl LikedActivityStore for MemoryCatalog {
    async fn toggle_like(&self, uid: &str, activity: &Activity) -> Result<bool, TripError> {
        let id = LikedActivity::document_id(uid, &activity.name);
        self.commit(|data| {
            if data.liked_activities.remove(&id).is_some() {
                false
            } else {
                data.liked_activities
                    .insert(id, LikedActivity::from_activity(uid, activity));
                true
            }
        })
        .await
    }

    async fn liked_names(&self, uid: &str) -> Result<HashSet<String>, TripError> {
        let data = self.data.read().await;
        Ok(data
            .liked_activities
            .values()
            .filter(|doc| doc.uid == uid)
            .map(|doc| doc.activity_name.to_lowercase())
            .collect())
    }
}

#[async_trait]
impl ItineraryStore for MemoryCatalog {
    async fn save_itinerary(&self, record: &ItineraryRecord) -> Result<String, TripError> {
        let id = self
            .commit(|data| {
                let id = (0..)
                    .map(|attempt| record.document_id_attempt(attempt))
                    .find(|id| !data.itineraries.contains_key(id))
                    .unwrap_or_else(|| record.document_id());
                data.itineraries.insert(id.clone(), record.clone());
                id
            })
            .await?;
        info!(id = %id, "Saved itinerary");
        Ok(id)
    }

    async fn itineraries_for(&self, user_id: &str) -> Result<Vec<ItineraryRecord>, TripError> {
        let data = self.data.read().await;
        Ok(data
            .itineraries
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn weekend(created_at: chrono::DateTime<Utc>) -> ItineraryRecord {
        ItineraryRecord {
            user_id: "u1".into(),
            itinerary_name: "Weekend".into(),
            flights: vec![],
            accommodations: vec![],
            activities: vec![],
            generated_itinerary: "Day 1".into(),
            created_at,
        }
    }

    fn stay(name: &str, city: &str) -> Lodging {
        Lodging {
            name: name.to_string(),
            city: city.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_lookup_by_normalized_city() {
        let store = MemoryCatalog::with_documents(
            vec![
                stay("Protea", "capetown"),
                stay("Sun Inn", "Cape Town"),
                stay("Beach House", "durban"),
            ],
            vec![],
        );

        let results = store.lodging_by_city("capetown").await.unwrap();
        let names: Vec<&str> = results.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Protea", "Sun Inn"]);

        assert!(store.lodging_by_city("pretoria").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_like_round_trip() {
        let store = MemoryCatalog::new();
        let activity = Activity {
            name: "Table Mountain".into(),
            city: "capetown".into(),
            ..Default::default()
        };

        assert!(store.toggle_like("u1", &activity).await.unwrap());
        assert!(store.liked_names("u1").await.unwrap().contains("table mountain"));
        assert!(store.liked_names("u2").await.unwrap().is_empty());

        assert!(!store.toggle_like("u1", &activity).await.unwrap());
        assert!(store.liked_names("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persists_to_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        {
            let store = MemoryCatalog::open(&path).await.unwrap();
            store.put_lodging("acc_1", &stay("Protea", "durban")).await.unwrap();
            store.save_itinerary(&weekend(Utc::now())).await.unwrap();
        }

        let reopened = MemoryCatalog::open(&path).await.unwrap();
        assert_eq!(reopened.lodging_by_city("durban").await.unwrap().len(), 1);
        let saved = reopened.itineraries_for("u1").await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].generated_itinerary, "Day 1");
    }

    #[tokio::test]
    async fn test_same_millisecond_itineraries_are_all_kept() {
        let store = MemoryCatalog::new();
        let record = weekend(Utc::now());

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(store.save_itinerary(&record).await.unwrap());
        }

        let base = record.document_id();
        assert_eq!(ids, vec![base.clone(), format!("{}_1", base), format!("{}_2", base)]);
        assert_eq!(store.itineraries_for("u1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_save_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("catalog.json");
        let store = MemoryCatalog::open(&path).await.unwrap();

        assert!(store.put_lodging("acc_1", &stay("Protea", "durban")).await.is_err());
        assert!(store.lodging_by_city("durban").await.unwrap().is_empty());

        let activity = Activity {
            name: "Table Mountain".into(),
            ..Default::default()
        };
        assert!(store.toggle_like("u1", &activity).await.is_err());
        assert!(store.liked_names("u1").await.unwrap().is_empty());

        assert!(store.save_itinerary(&weekend(Utc::now())).await.is_err());
        assert!(store.itineraries_for("u1").await.unwrap().is_empty());
    }
}
