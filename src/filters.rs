//! Sorting and filtering of fetched candidates
//!
//! All functions work on a copy; the fetched lists are never reordered in
//! place. Sorts are stable, so entries that compare equal keep the order the
//! catalog returned them in.

use crate::catalog::{Activity, Lodging};
use crate::TripError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Per-location sort key for lodging in the wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LodgingSort {
    /// Cheapest first
    Price,
    /// Best rated first
    Rating,
    Name,
}

/// Per-location sort key for activities in the wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySort {
    SubCategory,
    Category,
    Name,
}

impl FromStr for LodgingSort {
    type Err = TripError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "price" => Ok(LodgingSort::Price),
            "rating" => Ok(LodgingSort::Rating),
            "name" => Ok(LodgingSort::Name),
            _ => Err(TripError::Validation(format!("Invalid lodging sort: {}", s))),
        }
    }
}

impl FromStr for ActivitySort {
    type Err = TripError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sub_categories" | "sub-category" | "sub_category" | "subcategory" => {
                Ok(ActivitySort::SubCategory)
            }
            "category" => Ok(ActivitySort::Category),
            "name" => Ok(ActivitySort::Name),
            _ => Err(TripError::Validation(format!("Invalid activity sort: {}", s))),
        }
    }
}

fn by_number(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

pub fn sort_lodging(items: &[Lodging], key: LodgingSort) -> Vec<Lodging> {
    let mut sorted = items.to_vec();
    match key {
        LodgingSort::Price => sorted.sort_by(|a, b| by_number(a.price, b.price)),
        LodgingSort::Rating => sorted.sort_by(|a, b| by_number(b.rating, a.rating)),
        LodgingSort::Name => sorted.sort_by(|a, b| a.name.cmp(&b.name)),
    }
    sorted
}

pub fn sort_activities(items: &[Activity], key: ActivitySort) -> Vec<Activity> {
    let mut sorted = items.to_vec();
    match key {
        ActivitySort::SubCategory => {
            sorted.sort_by(|a, b| a.primary_sub_category().cmp(b.primary_sub_category()))
        }
        ActivitySort::Category => sorted.sort_by(|a, b| a.category.cmp(&b.category)),
        ActivitySort::Name => sorted.sort_by(|a, b| a.name.cmp(&b.name)),
    }
    sorted
}

/// Listings that carry a price and a rating for the browse filters
pub trait Priced {
    fn price(&self) -> f64;
    fn rating(&self) -> f64;
}

impl Priced for Lodging {
    fn price(&self) -> f64 {
        self.price
    }

    fn rating(&self) -> f64 {
        self.rating
    }
}

impl Priced for Activity {
    fn price(&self) -> f64 {
        self.price
    }

    fn rating(&self) -> f64 {
        self.rating
    }
}

/// Sort options on the standalone browse listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrowseSort {
    PriceAsc,
    PriceDesc,
    RatingDesc,
}

impl FromStr for BrowseSort {
    type Err = TripError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "priceAsc" | "price-asc" => Ok(BrowseSort::PriceAsc),
            "priceDesc" | "price-desc" => Ok(BrowseSort::PriceDesc),
            "ratingDesc" | "rating-desc" => Ok(BrowseSort::RatingDesc),
            _ => Err(TripError::Validation(format!("Invalid sort option: {}", s))),
        }
    }
}

/// Price range, minimum rating and sort for browse listings
#[derive(Debug, Clone, PartialEq)]
pub struct BrowseFilter {
    pub min_price: f64,
    pub max_price: f64,
    pub min_rating: Option<f64>,
    pub sort: Option<BrowseSort>,
}

impl BrowseFilter {
    /// Lodging prices are filtered to 0–1000 unless changed
    pub fn lodging() -> Self {
        Self {
            min_price: 0.0,
            max_price: 1000.0,
            min_rating: None,
            sort: None,
        }
    }

    /// Activity prices are filtered to 0–5000 unless changed
    pub fn activities() -> Self {
        Self {
            max_price: 5000.0,
            ..Self::lodging()
        }
    }

    pub fn matches<T: Priced>(&self, item: &T) -> bool {
        let price = item.price();
        let meets_price = price >= self.min_price && price <= self.max_price;
        let meets_rating = self.min_rating.map_or(true, |min| item.rating() >= min);
        meets_price && meets_rating
    }

    pub fn apply<T: Priced + Clone>(&self, items: &[T]) -> Vec<T> {
        let mut results: Vec<T> = items.iter().filter(|i| self.matches(*i)).cloned().collect();

        match self.sort {
            Some(BrowseSort::PriceAsc) => results.sort_by(|a, b| by_number(a.price(), b.price())),
            Some(BrowseSort::PriceDesc) => results.sort_by(|a, b| by_number(b.price(), a.price())),
            Some(BrowseSort::RatingDesc) => {
                results.sort_by(|a, b| by_number(b.rating(), a.rating()))
            }
            None => {}
        }

        results
    }
}

/// Only the entries whose liked flag is set
pub fn liked_only<T: Clone>(items: &[T], liked: &[bool]) -> Vec<T> {
    items
        .iter()
        .zip(liked.iter())
        .filter(|(_, liked)| **liked)
        .map(|(item, _)| item.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stay(name: &str, price: f64, rating: f64) -> Lodging {
        Lodging {
            name: name.to_string(),
            price,
            rating,
            ..Default::default()
        }
    }

    fn activity(name: &str, category: &str, sub: &str) -> Activity {
        Activity {
            name: name.to_string(),
            category: category.to_string(),
            sub_categories: vec![sub.to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_price_sort_is_non_decreasing_and_stable() {
        let items = vec![
            stay("a", 300.0, 4.0),
            stay("b", 100.0, 3.0),
            stay("c", 300.0, 5.0),
            stay("d", 100.0, 2.0),
            stay("e", 200.0, 1.0),
        ];

        let sorted = sort_lodging(&items, LodgingSort::Price);
        let prices: Vec<f64> = sorted.iter().map(|s| s.price).collect();
        assert!(prices.windows(2).all(|w| w[0] <= w[1]));

        let names: Vec<&str> = sorted.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b", "d", "e", "a", "c"]);

        // source order untouched
        assert_eq!(items[0].name, "a");
    }

    #[test]
    fn test_rating_sort_descending() {
        let items = vec![stay("a", 1.0, 3.5), stay("b", 1.0, 4.8), stay("c", 1.0, 3.5)];
        let sorted = sort_lodging(&items, LodgingSort::Rating);
        let names: Vec<&str> = sorted.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_name_sort() {
        let items = vec![stay("Zebra Lodge", 1.0, 1.0), stay("Aloe Inn", 1.0, 1.0)];
        let sorted = sort_lodging(&items, LodgingSort::Name);
        assert_eq!(sorted[0].name, "Aloe Inn");
    }

    #[test]
    fn test_activity_sorts() {
        let items = vec![
            activity("Wine tour", "Food", "Wine"),
            activity("Hike", "Outdoors", "Mountains"),
            activity("Aquarium", "Family", "Animals"),
        ];

        let by_sub = sort_activities(&items, ActivitySort::SubCategory);
        assert_eq!(by_sub[0].name, "Aquarium");
        assert_eq!(by_sub[2].name, "Wine tour");

        let by_category = sort_activities(&items, ActivitySort::Category);
        assert_eq!(by_category[0].category, "Family");

        let by_name = sort_activities(&items, ActivitySort::Name);
        assert_eq!(by_name[0].name, "Aquarium");
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!("price".parse::<LodgingSort>().unwrap(), LodgingSort::Price);
        assert_eq!("Rating".parse::<LodgingSort>().unwrap(), LodgingSort::Rating);
        assert!("stars".parse::<LodgingSort>().is_err());
        assert_eq!(
            "sub_categories".parse::<ActivitySort>().unwrap(),
            ActivitySort::SubCategory
        );
        assert_eq!("priceDesc".parse::<BrowseSort>().unwrap(), BrowseSort::PriceDesc);
    }

    #[test]
    fn test_browse_filter_price_and_rating() {
        let items = vec![
            stay("cheap", 200.0, 3.0),
            stay("pricey", 1500.0, 5.0),
            stay("good", 800.0, 4.5),
        ];

        let mut filter = BrowseFilter::lodging();
        filter.min_rating = Some(4.0);
        filter.sort = Some(BrowseSort::PriceAsc);
        let results = filter.apply(&items);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "good");

        let mut filter = BrowseFilter::activities();
        filter.sort = Some(BrowseSort::PriceDesc);
        let results = filter.apply(&items);
        let names: Vec<&str> = results.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["pricey", "good", "cheap"]);
    }

    #[test]
    fn test_liked_only() {
        let items = vec!["a", "b", "c"];
        assert_eq!(liked_only(&items, &[true, false, true]), vec!["a", "c"]);
    }
}
