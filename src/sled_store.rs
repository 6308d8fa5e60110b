//! sled-backed document store, one tree per collection

use crate::catalog::{Activity, Catalog, CatalogWriter, Lodging};
use crate::cities::normalize_city;
use crate::itinerary::{ItineraryRecord, ItineraryStore};
use crate::likes::{LikedActivity, LikedActivityStore};
use crate::TripError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

const ACCOMMODATION_TREE: &str = "accommodation";
const ACTIVITIES_TREE: &str = "activities";
const LIKED_TREE: &str = "liked_activities";
const ITINERARIES_TREE: &str = "itineraries";

pub struct SledCatalog {
    db: sled::Db,
    accommodation: sled::Tree,
    activities: sled::Tree,
    liked: sled::Tree,
    itineraries: sled::Tree,
}

impl SledCatalog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TripError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Store that is deleted when dropped
    pub fn temporary() -> Result<Self, TripError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, TripError> {
        Ok(Self {
            accommodation: db.open_tree(ACCOMMODATION_TREE)?,
            activities: db.open_tree(ACTIVITIES_TREE)?,
            liked: db.open_tree(LIKED_TREE)?,
            itineraries: db.open_tree(ITINERARIES_TREE)?,
            db,
        })
    }

    fn put<T: Serialize>(tree: &sled::Tree, id: &str, doc: &T) -> Result<(), TripError> {
        tree.insert(id.as_bytes(), serde_json::to_vec(doc)?)?;
        Ok(())
    }

    /// Every document in the tree that decodes and passes `keep`.
    /// Undecodable documents are skipped with a warning.
    fn scan<T, F>(tree: &sled::Tree, keep: F) -> Result<Vec<T>, TripError>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let mut docs = Vec::new();
        for entry in tree.iter() {
            let (key, value) = entry?;
            match serde_json::from_slice::<T>(&value) {
                Ok(doc) if keep(&doc) => docs.push(doc),
                Ok(_) => {}
                Err(e) => warn!(
                    id = %String::from_utf8_lossy(&key),
                    error = %e,
                    "Skipping undecodable document"
                ),
            }
        }
        Ok(docs)
    }
}

#[async_trait]
impl Catalog for SledCatalog {
    async fn lodging_by_city(&self, city: &str) -> Result<Vec<Lodging>, TripError> {
        let key = normalize_city(city);
        Self::scan(&self.accommodation, |doc: &Lodging| normalize_city(&doc.city) == key)
    }

    async fn activities_by_city(&self, city: &str) -> Result<Vec<Activity>, TripError> {
        let key = normalize_city(city);
        Self::scan(&self.activities, |doc: &Activity| normalize_city(&doc.city) == key)
    }
}

#[async_trait]
impl CatalogWriter for SledCatalog {
    async fn put_lodging(&self, id: &str, lodging: &Lodging) -> Result<(), TripError> {
        Self::put(&self.accommodation, id, lodging)
    }

    async fn put_activity(&self, id: &str, activity: &Activity) -> Result<(), TripError> {
        Self::put(&self.activities, id, activity)
    }
}

#[async_trait]
impl LikedActivityStore for SledCatalog {
    async fn toggle_like(&self, uid: &str, activity: &Activity) -> Result<bool, TripError> {
        let id = LikedActivity::document_id(uid, &activity.name);
        if self.liked.remove(id.as_bytes())?.is_some() {
            return Ok(false);
        }
        Self::put(&self.liked, &id, &LikedActivity::from_activity(uid, activity))?;
        Ok(true)
    }

    async fn liked_names(&self, uid: &str) -> Result<HashSet<String>, TripError> {
        let docs = Self::scan(&self.liked, |doc: &LikedActivity| doc.uid == uid)?;
        Ok(docs
            .into_iter()
            .map(|doc| doc.activity_name.to_lowercase())
            .collect())
    }
}

#[async_trait]
impl ItineraryStore for SledCatalog {
    async fn save_itinerary(&self, record: &ItineraryRecord) -> Result<String, TripError> {
        let doc = serde_json::to_vec(record)?;
        let mut attempt = 0;
        let id = loop {
            let id = record.document_id_attempt(attempt);
            let inserted = self
                .itineraries
                .compare_and_swap(id.as_bytes(), None as Option<&[u8]>, Some(doc.as_slice()))?;
            if inserted.is_ok() {
                break id;
            }
            attempt += 1;
        };
        self.db.flush_async().await?;
        info!(id = %id, "Saved itinerary");
        Ok(id)
    }

    async fn itineraries_for(&self, user_id: &str) -> Result<Vec<ItineraryRecord>, TripError> {
        Self::scan(&self.itineraries, |r: &ItineraryRecord| r.user_id == user_id)
    }
}
