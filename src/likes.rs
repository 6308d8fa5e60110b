//! Liked activities: a per-user toggle stored alongside the catalog

use crate::catalog::Activity;
use crate::identity::{require_user, IdentityProvider};
use crate::TripError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// Stored record of a user liking an activity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LikedActivity {
    pub uid: String,
    pub activity_name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub sub_category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub address: String,
}

impl LikedActivity {
    pub fn from_activity(uid: &str, activity: &Activity) -> Self {
        Self {
            uid: uid.to_string(),
            activity_name: activity.name.clone(),
            city: activity.city.clone(),
            price: activity.price,
            category: activity.category.clone(),
            sub_category: activity.primary_sub_category().to_string(),
            description: activity.description.clone(),
            address: activity.address.clone(),
        }
    }

    /// Document id, one per (user, activity) pair
    pub fn document_id(uid: &str, activity_name: &str) -> String {
        format!("{}_{}", uid, activity_name)
    }
}

#[async_trait]
pub trait LikedActivityStore: Send + Sync {
    /// Create the like if absent, delete it if present. Returns whether the
    /// activity is liked afterwards.
    async fn toggle_like(&self, uid: &str, activity: &Activity) -> Result<bool, TripError>;

    /// Lower-cased names of every activity the user has liked
    async fn liked_names(&self, uid: &str) -> Result<HashSet<String>, TripError>;
}

/// Toggle a like for the signed-in user
pub async fn like_activity(
    store: &dyn LikedActivityStore,
    identity: &dyn IdentityProvider,
    activity: &Activity,
) -> Result<bool, TripError> {
    let uid = require_user(identity)?;
    let liked = store.toggle_like(&uid, activity).await?;
    info!(activity = %activity.name, liked, "Updated liked activity");
    Ok(liked)
}

/// Liked flag for each activity, matched case-insensitively by name
pub fn mark_liked(activities: &[Activity], liked: &HashSet<String>) -> Vec<bool> {
    activities
        .iter()
        .map(|a| liked.contains(&a.name.to_lowercase()))
        .collect()
}
